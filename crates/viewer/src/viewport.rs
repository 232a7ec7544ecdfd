//! Scroll offset and interactive scale of the visible window.

use crate::tiles::TileWindow;
use docview_render::{Rect, Size};

/// What is currently moving the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollState {
    #[default]
    Idle,
    Dragging,
    Flinging,
}

/// Allowed offset range per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OffsetBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl OffsetBounds {
    /// Bounds for a document of `document` pixels seen through `view`
    ///
    /// An axis where the document is smaller than the view collapses to a
    /// single negative offset that centers it.
    pub fn compute(view: Size, document: Size) -> Self {
        let (min_x, max_x) = Self::axis(view.width, document.width);
        let (min_y, max_y) = Self::axis(view.height, document.height);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    fn axis(view: i32, document: i32) -> (i32, i32) {
        if view > document {
            let centered = -(view - document) / 2;
            (centered, centered)
        } else {
            (0, document - view)
        }
    }

    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(self.min_x, self.max_x), y.clamp(self.min_y, self.max_y))
    }
}

/// Offset and scale state of the viewer
///
/// The document size is at the committed raw scale; the interactive scale
/// multiplies it while a zoom gesture is running.
#[derive(Debug, Clone)]
pub struct Viewport {
    view: Size,
    document: Size,
    x: i32,
    y: i32,
    scale: f32,
    bounds: OffsetBounds,
    zooming: bool,
    scroll_state: ScrollState,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            view: Size::default(),
            document: Size::default(),
            x: 0,
            y: 0,
            scale: 1.0,
            bounds: OffsetBounds::default(),
            zooming: false,
            scroll_state: ScrollState::Idle,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_size(&self) -> Size {
        self.view
    }

    pub fn set_view_size(&mut self, view: Size) {
        self.view = view;
        self.check_bounds();
    }

    /// Document size at the raw scale
    pub fn document_size(&self) -> Size {
        self.document
    }

    pub fn set_document_size(&mut self, document: Size) {
        self.document = document;
        self.check_bounds();
    }

    /// Document size including the interactive scale
    pub fn scaled_document_size(&self) -> Size {
        Size::new(
            (self.document.width as f32 * self.scale) as i32,
            (self.document.height as f32 * self.scale) as i32,
        )
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn bounds(&self) -> OffsetBounds {
        self.bounds
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the interactive scale and recompute the offset bounds
    ///
    /// The offset is left untouched; callers move it back in range.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.check_bounds();
    }

    pub fn is_zooming(&self) -> bool {
        self.zooming
    }

    pub fn set_zooming(&mut self, zooming: bool) {
        self.zooming = zooming;
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.scroll_state
    }

    /// Returns true if the state changed
    pub fn set_scroll_state(&mut self, state: ScrollState) -> bool {
        if self.scroll_state == state {
            return false;
        }
        self.scroll_state = state;
        true
    }

    fn check_bounds(&mut self) {
        self.bounds = OffsetBounds::compute(self.view, self.scaled_document_size());
    }

    /// Move to (`x`, `y`) clamped to the bounds
    ///
    /// Returns the applied delta, or `None` if the offset did not change.
    pub fn move_to(&mut self, x: i32, y: i32) -> Option<(i32, i32)> {
        let (x, y) = self.bounds.clamp(x, y);
        if x == self.x && y == self.y {
            return None;
        }
        let delta = (x - self.x, y - self.y);
        self.x = x;
        self.y = y;
        Some(delta)
    }

    /// Reset offset and scale, keeping the view size
    pub fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
        self.scale = 1.0;
        self.zooming = false;
        self.scroll_state = ScrollState::Idle;
        self.document = Size::default();
        self.check_bounds();
    }

    /// Visible window grown by one scaled tile on every side
    pub fn window(&self, tile: Size) -> TileWindow {
        let off_x = (tile.width as f32 * self.scale + 0.5) as i32;
        let off_y = (tile.height as f32 * self.scale + 0.5) as i32;
        let rect = Rect::new(
            self.x - off_x,
            self.y - off_y,
            self.x + self.view.width + off_x,
            self.y + self.view.height + off_y,
        );
        TileWindow::new(rect, self.scale)
    }

    /// Map a point in the view to scaled document space
    pub fn view_to_document(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.x as f32, y + self.y as f32)
    }

    /// Check if the document can scroll horizontally
    ///
    /// A negative `direction` asks about moving towards the left edge, a
    /// positive one towards the right edge.
    pub fn can_scroll_horizontally(&self, direction: i32) -> bool {
        match direction.signum() {
            -1 => self.x > self.bounds.min_x,
            1 => self.x < self.bounds.max_x,
            _ => false,
        }
    }

    /// Vertical counterpart of [`Viewport::can_scroll_horizontally`]
    pub fn can_scroll_vertically(&self, direction: i32) -> bool {
        match direction.signum() {
            -1 => self.y > self.bounds.min_y,
            1 => self.y < self.bounds.max_y,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(view: Size, document: Size) -> Viewport {
        let mut viewport = Viewport::new();
        viewport.set_view_size(view);
        viewport.set_document_size(document);
        viewport
    }

    #[test]
    fn test_bounds_when_document_is_larger() {
        let viewport = viewport(Size::new(800, 600), Size::new(1048, 3572));
        assert_eq!(
            viewport.bounds(),
            OffsetBounds {
                min_x: 0,
                max_x: 248,
                min_y: 0,
                max_y: 2972,
            }
        );
    }

    #[test]
    fn test_bounds_center_smaller_document() {
        let viewport = viewport(Size::new(1200, 600), Size::new(1000, 3000));
        let bounds = viewport.bounds();
        assert_eq!(bounds.min_x, -100);
        assert_eq!(bounds.max_x, -100);
        assert_eq!(bounds.min_y, 0);
    }

    #[test]
    fn test_move_to_clamps_and_reports_delta() {
        let mut viewport = viewport(Size::new(800, 600), Size::new(1000, 2000));
        assert_eq!(viewport.move_to(50, 100), Some((50, 100)));
        assert_eq!(viewport.move_to(5000, -5), Some((150, -100)));
        assert_eq!(viewport.offset(), (200, 0));
    }

    #[test]
    fn test_redundant_move_is_noop() {
        let mut viewport = viewport(Size::new(800, 600), Size::new(1000, 2000));
        viewport.move_to(10, 10);
        assert_eq!(viewport.move_to(10, 10), None);
        // Clamped to the same position
        viewport.move_to(200, 1400);
        assert_eq!(viewport.move_to(900, 9000), None);
    }

    #[test]
    fn test_scale_changes_bounds() {
        let mut viewport = viewport(Size::new(800, 600), Size::new(1000, 2000));
        viewport.set_scale(2.0);
        assert_eq!(viewport.scaled_document_size(), Size::new(2000, 4000));
        assert_eq!(viewport.bounds().max_x, 1200);
        assert_eq!(viewport.bounds().max_y, 3400);
    }

    #[test]
    fn test_window_includes_preload_margin() {
        let mut viewport = viewport(Size::new(800, 600), Size::new(1000, 2000));
        viewport.move_to(100, 200);
        let window = viewport.window(Size::new(320, 320));
        assert_eq!(window.rect, Rect::new(-220, -120, 1220, 1120));
        assert_eq!(window.scale, 1.0);

        viewport.set_scale(0.5);
        let window = viewport.window(Size::new(320, 320));
        assert_eq!(window.rect.left, 100 - 160);
    }

    #[test]
    fn test_view_to_document() {
        let mut viewport = viewport(Size::new(800, 600), Size::new(1000, 2000));
        viewport.move_to(40, 300);
        assert_eq!(viewport.view_to_document(10.0, 20.5), (50.0, 320.5));
    }

    #[test]
    fn test_can_scroll() {
        let mut viewport = viewport(Size::new(800, 600), Size::new(1000, 2000));
        assert!(!viewport.can_scroll_vertically(-1));
        assert!(viewport.can_scroll_vertically(1));
        viewport.move_to(200, 1400);
        assert!(viewport.can_scroll_horizontally(-1));
        assert!(!viewport.can_scroll_horizontally(1));
        assert!(!viewport.can_scroll_vertically(1));
        assert!(!viewport.can_scroll_vertically(0));
    }

    #[test]
    fn test_scroll_state_change() {
        let mut viewport = Viewport::new();
        assert!(viewport.set_scroll_state(ScrollState::Dragging));
        assert!(!viewport.set_scroll_state(ScrollState::Dragging));
        assert_eq!(viewport.scroll_state(), ScrollState::Dragging);
    }
}
