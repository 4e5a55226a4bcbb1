use crate::content::ImageEncoding;
use crate::raster::Bitmap;
use crate::types::{Mm, Size};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Command {
    /// Place the pixel band `[src_y_px, src_y_px + src_height_px)` of an
    /// image resource into the page rect `(x, y, width, height)`, with `y`
    /// measured down from the page top. The full image covers the band when
    /// `src_height_px` equals the resource's pixel height.
    DrawImage {
        image: usize,
        x: Mm,
        y: Mm,
        width: Mm,
        height: Mm,
        src_y_px: u32,
        src_height_px: u32,
    },
}

/// A registered bitmap plus the encoding it should carry in the output
/// stream. A PNG-encoded raster requested as JPEG is transcoded at write
/// time, not during composition.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub bitmap: Bitmap,
    pub encoding: ImageEncoding,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

/// Write-once composition output: page geometry, the deduplicated image
/// resource table, and one command list per page.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub images: Vec<ImageResource>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

pub struct Canvas {
    page_size: Size,
    images: Vec<ImageResource>,
    image_index: HashMap<u64, usize>,
    pages: Vec<Page>,
    current: Vec<Command>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            images: Vec::new(),
            image_index: HashMap::new(),
            pages: Vec::new(),
            current: Vec::new(),
        }
    }

    /// Registers a bitmap resource, reusing an existing slot when the same
    /// bytes were registered before with the same target encoding.
    pub fn register_image(&mut self, bitmap: Bitmap, encoding: ImageEncoding) -> usize {
        let key = hash_bytes(&bitmap.data);
        if let Some(&index) = self.image_index.get(&key) {
            let existing = &self.images[index];
            if existing.bitmap.data == bitmap.data && existing.encoding == encoding {
                return index;
            }
        }
        let index = self.images.len();
        self.images.push(ImageResource { bitmap, encoding });
        self.image_index.insert(key, index);
        index
    }

    pub fn draw_image(
        &mut self,
        image: usize,
        x: Mm,
        y: Mm,
        width: Mm,
        height: Mm,
        src_y_px: u32,
        src_height_px: u32,
    ) {
        self.current.push(Command::DrawImage {
            image,
            x,
            y,
            width,
            height,
            src_y_px,
            src_height_px,
        });
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current_command_count(&self) -> usize {
        self.current.len()
    }

    /// Closes the current page and opens a fresh one.
    pub fn show_page(&mut self) {
        let commands = std::mem::take(&mut self.current);
        self.pages.push(Page { commands });
    }

    /// Finishes the document. The open page is emitted when it has content;
    /// a run that placed nothing still yields one blank page.
    pub fn finish(mut self) -> Document {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            images: self.images,
            pages: self.pages,
        }
    }
}

fn hash_bytes(data: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(tag: u8) -> Bitmap {
        Bitmap {
            width_px: 10,
            height_px: 10,
            data: vec![tag; 32],
        }
    }

    #[test]
    fn register_image_dedupes_identical_bytes() {
        let mut canvas = Canvas::new(Size::a4());
        let a = canvas.register_image(bitmap(1), ImageEncoding::Png);
        let b = canvas.register_image(bitmap(1), ImageEncoding::Png);
        let c = canvas.register_image(bitmap(2), ImageEncoding::Png);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn register_image_keeps_distinct_encodings_apart() {
        let mut canvas = Canvas::new(Size::a4());
        let a = canvas.register_image(bitmap(1), ImageEncoding::Png);
        let b = canvas.register_image(bitmap(1), ImageEncoding::Jpeg);
        assert_ne!(a, b);
    }

    #[test]
    fn finish_emits_open_page_only_when_dirty() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_image(
            0,
            Mm::ZERO,
            Mm::ZERO,
            Mm::from_f32(10.0),
            Mm::from_f32(10.0),
            0,
            10,
        );
        canvas.show_page();
        let doc = canvas.finish();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn empty_run_still_yields_one_page() {
        let doc = Canvas::new(Size::a4()).finish();
        assert_eq!(doc.page_count(), 1);
        assert!(doc.pages[0].commands.is_empty());
    }
}
