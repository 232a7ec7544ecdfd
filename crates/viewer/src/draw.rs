//! Draw list handed to the host for one frame.
//!
//! The viewer never draws. It describes the frame in view coordinates:
//! page backgrounds first, then tiles in row and column order.

use docview_render::{PixelBuffer, Rect, Size};
use docview_scheduler::TileKey;

/// One thing to draw, in painting order
#[derive(Debug, Clone, Copy)]
pub enum DrawItem<'a> {
    /// Frame and background of a visible page
    PageBackground { page: usize, dst: Rect },

    /// Copy `src` from `buffer` into `dst`, scaling as needed
    Tile {
        key: TileKey,
        page: usize,
        dst: Rect,
        src: Rect,
        buffer: &'a PixelBuffer,
    },

    /// Tile still rendering or failed; only the page background shows
    Placeholder { key: TileKey, page: usize, dst: Rect },
}

impl DrawItem<'_> {
    /// Destination in view coordinates
    pub fn dst(&self) -> Rect {
        match self {
            DrawItem::PageBackground { dst, .. }
            | DrawItem::Tile { dst, .. }
            | DrawItem::Placeholder { dst, .. } => *dst,
        }
    }

    pub fn page(&self) -> usize {
        match self {
            DrawItem::PageBackground { page, .. }
            | DrawItem::Tile { page, .. }
            | DrawItem::Placeholder { page, .. } => *page,
        }
    }
}

/// Everything needed to paint one frame
#[derive(Debug, Clone, Default)]
pub struct DrawList<'a> {
    view: Size,
    items: Vec<DrawItem<'a>>,
}

impl<'a> DrawList<'a> {
    pub fn new(view: Size) -> Self {
        Self {
            view,
            items: Vec::new(),
        }
    }

    /// View size the list was built for
    pub fn view_size(&self) -> Size {
        self.view
    }

    /// Append an item, skipping anything entirely outside the view
    pub fn push(&mut self, item: DrawItem<'a>) {
        if item.dst().intersects(&Rect::from_size(self.view)) {
            self.items.push(item);
        }
    }

    pub fn items(&self) -> &[DrawItem<'a>] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawItem<'a>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of tiles with pixels
    pub fn ready_tiles(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, DrawItem::Tile { .. }))
            .count()
    }

    /// Number of tiles still waiting for pixels
    pub fn placeholders(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, DrawItem::Placeholder { .. }))
            .count()
    }
}
