//! Selector-driven page composer.
//!
//! `pagepress` takes an ordered list of content descriptors, CSS selectors
//! for on-screen regions or standalone image sources, and packs their
//! rasterized fragments onto a multi-page PDF: one vertical cursor, explicit
//! page breaks, and slicing for fragments taller than a page. The document
//! query surface, the rasterizer, and image fetching are collaborators
//! supplied through the [`Dom`], [`Rasterizer`], and [`ImageDecoder`]
//! traits; this crate owns layout and PDF authoring.
//!
//! ```no_run
//! use pagepress::{ContentItem, LocalDecoder, PagePress};
//! # fn demo(dom: &dyn pagepress::Dom, raster: &dyn pagepress::Rasterizer)
//! # -> Result<(), pagepress::PagePressError> {
//! let press = PagePress::builder()
//!     .file_name("report")
//!     .margin_all(10.0)
//!     .build()?;
//! let items = [
//!     ContentItem::element("#summary"),
//!     ContentItem::elements(".invoice-row"),
//!     ContentItem::image("/logo.png"),
//! ];
//! press.compose_to_file(&items, dom, raster, &LocalDecoder::new(), ".")?;
//! # Ok(())
//! # }
//! ```

mod canvas;
mod composer;
mod content;
mod debug;
mod decode;
mod dom;
mod error;
mod frame;
mod metrics;
mod pdf;
mod raster;
mod types;

pub use canvas::{Canvas, Command, Document, ImageResource, Page};
pub use content::{ContentItem, ContentKind, ImageEncoding, ImageOptions};
use debug::DebugLogger;
#[cfg(feature = "remote")]
pub use decode::HttpDecoder;
pub use decode::{ImageDecoder, LocalDecoder};
pub use dom::{BreakHint, Dom, ElementId, StyleSnapshot, WidthOverride};
pub use error::PagePressError;
pub use frame::Frame;
pub use metrics::{ComposeMetrics, PageMetrics};
pub use raster::{Bitmap, RasterOptions, Rasterizer};
pub use types::{MarginSpec, Margins, Mm, Orientation, PageFormat, Size};

use composer::PageGeometry;
use pdf::PdfOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_FILE_NAME: &str = "document.pdf";

/// A validated composition configuration. Built once through
/// [`PagePressBuilder`]; every run derives its page geometry from here and
/// never re-reads raw caller input.
pub struct PagePress {
    page_size: Size,
    margins: Margins,
    scale: f32,
    page_break: bool,
    fixed_width: Option<Mm>,
    image_quality: f32,
    compress_pdf: bool,
    background: [u8; 3],
    file_name: String,
    debug: Option<Arc<DebugLogger>>,
}

#[derive(Debug, Clone)]
pub struct PagePressBuilder {
    file_name: String,
    format: PageFormat,
    orientation: Orientation,
    margin: MarginSpec,
    scale: f32,
    page_break: bool,
    fixed_width: Option<f32>,
    image_quality: f32,
    compress_pdf: bool,
    background: [u8; 3],
    debug_path: Option<PathBuf>,
}

impl Default for PagePressBuilder {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            margin: MarginSpec::All(0.0),
            scale: 2.0,
            page_break: true,
            fixed_width: None,
            image_quality: 1.0,
            compress_pdf: true,
            background: [255, 255, 255],
            debug_path: None,
        }
    }
}

impl PagePressBuilder {
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn format(mut self, format: PageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn margin(mut self, margin: MarginSpec) -> Self {
        self.margin = margin;
        self
    }

    pub fn margin_all(self, value: f32) -> Self {
        self.margin(MarginSpec::All(value))
    }

    /// Rasterization pixel density multiplier.
    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn page_break(mut self, enabled: bool) -> Self {
        self.page_break = enabled;
        self
    }

    /// Rasterize content as if the viewport were this many millimeters
    /// wide, independent of the actual on-screen width.
    pub fn fixed_width(mut self, width_mm: f32) -> Self {
        self.fixed_width = Some(width_mm);
        self
    }

    /// Encoder quality in (0, 1] for raster-to-image conversion.
    pub fn image_quality(mut self, quality: f32) -> Self {
        self.image_quality = quality;
        self
    }

    pub fn compress_pdf(mut self, enabled: bool) -> Self {
        self.compress_pdf = enabled;
        self
    }

    pub fn background(mut self, rgb: [u8; 3]) -> Self {
        self.background = rgb;
        self
    }

    /// Enables diagnostic logging of skipped fragments and page breaks,
    /// written as JSONL to the given path.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PagePress, PagePressError> {
        let page_size = self.format.size().oriented(self.orientation);
        if !page_size.width.is_positive() || !page_size.height.is_positive() {
            return Err(PagePressError::InvalidConfiguration(
                "page dimensions must be positive".to_string(),
            ));
        }
        let margins = self.margin.resolve();
        if margins.left + margins.right >= page_size.width
            || margins.top + margins.bottom >= page_size.height
        {
            return Err(PagePressError::InvalidConfiguration(
                "margins leave no usable page area".to_string(),
            ));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PagePressError::InvalidConfiguration(
                "scale must be positive".to_string(),
            ));
        }
        if !self.image_quality.is_finite()
            || self.image_quality <= 0.0
            || self.image_quality > 1.0
        {
            return Err(PagePressError::InvalidConfiguration(
                "image_quality must be within (0, 1]".to_string(),
            ));
        }
        let fixed_width = match self.fixed_width {
            Some(width) if width <= 0.0 || !width.is_finite() => {
                return Err(PagePressError::InvalidConfiguration(
                    "fixed_width must be positive".to_string(),
                ));
            }
            Some(width) => Some(Mm::from_f32(width)),
            None => None,
        };
        let debug = match self.debug_path {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        Ok(PagePress {
            page_size,
            margins,
            scale: self.scale,
            page_break: self.page_break,
            fixed_width,
            image_quality: self.image_quality,
            compress_pdf: self.compress_pdf,
            background: self.background,
            file_name: self.file_name,
            debug,
        })
    }
}

impl PagePress {
    pub fn builder() -> PagePressBuilder {
        PagePressBuilder::default()
    }

    /// Runs the full placement pass and returns the composed document plus
    /// run metrics, without serializing anything.
    pub fn compose(
        &self,
        items: &[ContentItem],
        dom: &dyn Dom,
        rasterizer: &dyn Rasterizer,
        decoder: &dyn ImageDecoder,
    ) -> Result<(Document, ComposeMetrics), PagePressError> {
        composer::compose(
            &self.geometry(),
            items,
            dom,
            rasterizer,
            decoder,
            self.debug.as_deref(),
        )
    }

    /// Composes and serializes to PDF bytes.
    pub fn compose_to_bytes(
        &self,
        items: &[ContentItem],
        dom: &dyn Dom,
        rasterizer: &dyn Rasterizer,
        decoder: &dyn ImageDecoder,
    ) -> Result<(Vec<u8>, ComposeMetrics), PagePressError> {
        let (document, metrics) = self.compose(items, dom, rasterizer, decoder)?;
        let bytes = pdf::write_document(&document, &self.pdf_options())?;
        Ok((bytes, metrics))
    }

    /// Composes and saves the PDF under the configured file name inside
    /// `dir`. Nothing is written when composition or serialization fails.
    pub fn compose_to_file(
        &self,
        items: &[ContentItem],
        dom: &dyn Dom,
        rasterizer: &dyn Rasterizer,
        decoder: &dyn ImageDecoder,
        dir: impl AsRef<Path>,
    ) -> Result<(PathBuf, ComposeMetrics), PagePressError> {
        let (document, metrics) = self.compose(items, dom, rasterizer, decoder)?;
        let path = dir.as_ref().join(self.output_file_name());
        pdf::save_document(&document, &self.pdf_options(), &path)?;
        Ok((path, metrics))
    }

    /// The configured file name with a `.pdf` suffix appended if absent.
    pub fn output_file_name(&self) -> String {
        normalize_file_name(&self.file_name)
    }

    fn geometry(&self) -> PageGeometry {
        PageGeometry {
            page_size: self.page_size,
            margins: self.margins,
            scale: self.scale,
            page_break: self.page_break,
            fixed_width: self.fixed_width,
            image_quality: self.image_quality,
            background: self.background,
        }
    }

    fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            compress: self.compress_pdf,
            jpeg_quality: (self.image_quality * 100.0).round().clamp(1.0, 100.0) as u8,
        }
    }
}

fn normalize_file_name(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}
