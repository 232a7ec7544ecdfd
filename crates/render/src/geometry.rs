//! Integer geometry used across layout, tiling and rendering.
//!
//! Coordinates are in pixels. Rectangles are half-open: `right` and `bottom`
//! are exclusive.

/// Width and height of a page or surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Check if either dimension is zero or negative
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Axis-aligned rectangle with exclusive right/bottom edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin with the given size
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Check if two rectangles overlap
    ///
    /// Touching edges do not count as an overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Check if the point lies inside the rectangle
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Return the rectangle translated by (`dx`, `dy`)
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Return the rectangle with every edge multiplied by `factor`
    ///
    /// Edges are truncated toward zero.
    pub fn scale(&self, factor: f32) -> Rect {
        if factor == 1.0 {
            return *self;
        }
        Rect::new(
            (self.left as f32 * factor) as i32,
            (self.top as f32 * factor) as i32,
            (self.right as f32 * factor) as i32,
            (self.bottom as f32 * factor) as i32,
        )
    }

    /// Intersection of two rectangles, `None` when they do not overlap
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        ))
    }
}

/// Four-sided inset, used to crop page margins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Insets {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Insets::default()
    }

    pub fn horizontal(&self) -> i32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> i32 {
        self.top + self.bottom
    }

    /// Size left over after removing the insets from `size`
    pub fn shrink(&self, size: Size) -> Size {
        Size::new(size.width - self.horizontal(), size.height - self.vertical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_dimensions() {
        let r = Rect::new(10, 20, 40, 100);
        assert_eq!(r.width(), 30);
        assert_eq!(r.height(), 80);
        assert_eq!(r.size(), Size::new(30, 80));
        assert!(!r.is_empty());
        assert!(Rect::new(5, 5, 5, 10).is_empty());
        assert!(Rect::default().is_empty());
    }

    #[test]
    fn test_rect_intersects_excludes_touching_edges() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(&Rect::new(9, 9, 20, 20)));
        assert!(!a.intersects(&Rect::new(10, 0, 20, 10)));
        assert!(!a.intersects(&Rect::new(0, 10, 10, 20)));
        assert!(a.intersects(&Rect::new(-5, -5, 1, 1)));
    }

    #[test]
    fn test_rect_offset_and_scale() {
        let r = Rect::new(1, 2, 11, 22);
        assert_eq!(r.offset(5, -2), Rect::new(6, 0, 16, 20));
        assert_eq!(r.scale(2.0), Rect::new(2, 4, 22, 44));
        assert_eq!(r.scale(0.5), Rect::new(0, 1, 5, 11));
        assert_eq!(r.scale(1.0), r);
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 15, 15);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 10, 10)));
        assert_eq!(a.intersection(&Rect::new(20, 20, 30, 30)), None);
    }

    #[test]
    fn test_insets_shrink() {
        let crop = Insets::new(10, 20, 30, 40);
        assert_eq!(crop.shrink(Size::new(100, 100)), Size::new(60, 40));
        assert!(!crop.is_empty());
        assert!(Insets::default().is_empty());
    }
}
