use crate::dom::ElementId;
use image::GenericImageView;

/// CSS pixels per millimeter at the 96dpi reference used when forcing an
/// element's layout width.
pub(crate) const PX_PER_MM: f32 = 3.78;

/// Encoded bitmap plus its natural pixel dimensions. Produced by the
/// rasterizer or the image decoder, placed once, then discarded.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width_px: u32,
    pub height_px: u32,
    /// Encoded image bytes (PNG or JPEG).
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Sniffs the dimensions from encoded PNG/JPEG bytes. `None` when the
    /// bytes do not decode or describe an empty image.
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        let decoded = image::load_from_memory(&data).ok()?;
        let (width_px, height_px) = decoded.dimensions();
        if width_px == 0 || height_px == 0 {
            return None;
        }
        Some(Self {
            width_px,
            height_px,
            data,
        })
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width_px as f32 / self.height_px as f32
    }
}

#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Pixel density multiplier applied while rasterizing.
    pub scale: f32,
    /// Rasterize as if the viewport were this wide, in pixels.
    pub viewport_width_px: Option<f32>,
    /// Encoder quality in (0, 1] for the raster-to-image conversion.
    pub image_quality: f32,
    pub background: [u8; 3],
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            viewport_width_px: None,
            image_quality: 1.0,
            background: [255, 255, 255],
        }
    }
}

/// Converts an on-screen element into a bitmap. A failure here aborts the
/// whole composition run; implementations should bound how long a pending
/// remote resource may stall a capture.
pub trait Rasterizer {
    fn rasterize(&self, element: ElementId, options: &RasterOptions) -> Result<Bitmap, String>;
}
