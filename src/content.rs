/// One entry in the caller-supplied content list, processed in order.
#[derive(Debug, Clone)]
pub struct ContentItem {
    /// CSS selector for element entries, or an image source (URL, path,
    /// `data:` URI) for image entries.
    pub selector: String,
    pub kind: ContentKind,
    /// Resolve the selector against every match instead of only the first.
    /// Each match becomes its own fragment, in document order.
    pub expand_all: bool,
    pub image_options: Option<ImageOptions>,
}

impl ContentItem {
    pub fn element(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: ContentKind::Element,
            expand_all: false,
            image_options: None,
        }
    }

    pub fn elements(selector: impl Into<String>) -> Self {
        Self {
            expand_all: true,
            ..Self::element(selector)
        }
    }

    pub fn image(source: impl Into<String>) -> Self {
        Self {
            selector: source.into(),
            kind: ContentKind::Image,
            expand_all: false,
            image_options: None,
        }
    }

    pub fn with_image_options(mut self, options: ImageOptions) -> Self {
        self.image_options = Some(options);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Element,
    Image,
}

/// Placement overrides for image entries, all in page millimeters.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptions {
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Horizontal origin; defaults to the left margin.
    pub x: Option<f32>,
    pub encoding: ImageEncoding,
    pub preserve_aspect_ratio: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            x: None,
            encoding: ImageEncoding::Jpeg,
            preserve_aspect_ratio: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Jpeg,
    Png,
}
