use crate::types::{Margins, Mm, Size};

/// Vertical placement cursor on the current page. Owned by the compose
/// loop and reset whenever a new page starts; never shared.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    top: Mm,
    bottom: Mm,
    cursor_y: Mm,
}

impl Frame {
    pub fn new(page: Size, margins: Margins) -> Self {
        let top = margins.top;
        let bottom = (page.height - margins.bottom).max(top);
        Self {
            top,
            bottom,
            cursor_y: top,
        }
    }

    /// Absolute y offset of the next placement, measured from the page top.
    pub fn cursor(&self) -> Mm {
        self.cursor_y
    }

    pub fn remaining_height(&self) -> Mm {
        (self.bottom - self.cursor_y).max(Mm::ZERO)
    }

    pub fn usable_height(&self) -> Mm {
        self.bottom - self.top
    }

    pub fn is_at_top(&self) -> bool {
        self.cursor_y <= self.top
    }

    /// True once the cursor sits past the bottom bound, i.e. the next
    /// fragment has no room on this page.
    pub fn is_exhausted(&self) -> bool {
        self.cursor_y > self.bottom
    }

    pub fn fits(&self, height: Mm) -> bool {
        self.cursor_y + height <= self.bottom
    }

    pub fn advance(&mut self, height: Mm) {
        self.cursor_y += height;
    }

    pub fn reset(&mut self) {
        self.cursor_y = self.top;
    }
}
