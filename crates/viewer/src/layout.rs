//! Document layout in tile space.
//!
//! Pages are stacked vertically, centered horizontally, and separated by a
//! margin. Each page is cut into rows and columns of tiles; rows are
//! numbered continuously across the document so a row index alone
//! identifies its page.
//!
//! ```text
//!   +-----------------------------+
//!   |           margin            |
//!   |   +---------+---------+--+  |  row 0   } page 0
//!   |   |         |         |  |  |  row 1   }
//!   |   +---------+---------+--+  |
//!   |           margin            |
//!   |   +---------+---------+--+  |  row 2   } page 1
//!   |   +---------+---------+--+  |
//!   |           margin            |
//!   +-----------------------------+
//! ```
//!
//! All positions are in document pixels at the current raw scale.

use docview_render::{Insets, Rect, Size, TileSpan};

/// Layout failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("crop {crop:?} leaves no content on page {page}")]
    InvalidCrop { crop: Insets, page: usize },
}

/// Derived geometry of one page at the current scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageLayout {
    /// Scaled width after crop
    pub width: i32,
    /// Scaled height after crop
    pub height: i32,
    /// Top edge in the document
    pub top: i32,
    /// First row of the page
    pub start_row: i32,
    /// One past the last row of the page
    pub end_row: i32,
    /// Number of tile columns
    pub columns: i32,
    rows_span: TileSpan,
    columns_span: TileSpan,
}

impl PageLayout {
    /// Number of tile rows
    pub fn rows(&self) -> i32 {
        self.end_row - self.start_row
    }

    /// Clip rectangle of the last row and column, relative to the page
    pub fn last_clip(&self) -> Rect {
        Rect::new(
            self.columns_span.last_start,
            self.rows_span.last_start,
            self.width,
            self.height,
        )
    }
}

/// Page geometry for a document at one raw scale
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    original: Vec<Size>,
    tile: Size,
    raw_scale: f32,
    margin: i32,
    crop: Insets,
    pages: Vec<PageLayout>,
    row_count: i32,
    width: i32,
    height: i32,
}

impl DocumentLayout {
    /// Layout of `pages` at scale 1 with no margin and no crop
    pub fn new(pages: Vec<Size>, tile: Size) -> Self {
        let mut layout = Self {
            pages: vec![PageLayout::default(); pages.len()],
            original: pages,
            tile,
            raw_scale: 1.0,
            margin: 0,
            crop: Insets::default(),
            row_count: 0,
            width: 0,
            height: 0,
        };
        layout.recompute();
        layout
    }

    /// Recompute every page for `raw_scale`, `margin` and `crop`
    ///
    /// The margin is in original page units. A crop that leaves no content
    /// on some page is replaced by an empty crop; the rest of the update
    /// still applies and [`LayoutError::InvalidCrop`] is returned.
    pub fn update(&mut self, raw_scale: f32, margin: i32, crop: Insets) -> Result<(), LayoutError> {
        let checked = self.check_crop(crop);
        self.raw_scale = raw_scale;
        self.margin = margin;
        self.crop = if checked.is_ok() { crop } else { Insets::default() };
        self.recompute();
        checked
    }

    /// Change the raw scale only
    pub fn set_raw_scale(&mut self, raw_scale: f32) {
        self.raw_scale = raw_scale;
        self.recompute();
    }

    /// Check `crop` leaves at least one unit of content on every page
    pub fn check_crop(&self, crop: Insets) -> Result<(), LayoutError> {
        let negative = crop.left < 0 || crop.top < 0 || crop.right < 0 || crop.bottom < 0;
        for (page, size) in self.original.iter().enumerate() {
            let content = crop.shrink(*size);
            if negative || content.width < 1 || content.height < 1 {
                return Err(LayoutError::InvalidCrop { crop, page });
            }
        }
        Ok(())
    }

    fn recompute(&mut self) {
        let raw = self.raw_scale;
        let margin = self.margin as f32 * raw;
        let mut top = margin;
        let mut row = 0;

        for (attr, size) in self.pages.iter_mut().zip(&self.original) {
            let content = self.crop.shrink(*size);
            let width = (content.width as f32 * raw) as i32;
            let height = (content.height as f32 * raw) as i32;

            let rows_span = TileSpan::compute(height, self.tile.height);
            let columns_span = TileSpan::compute(width, self.tile.width);

            *attr = PageLayout {
                width,
                height,
                top: (top + 0.5) as i32,
                start_row: row,
                end_row: row + rows_span.count,
                columns: columns_span.count,
                rows_span,
                columns_span,
            };

            row = attr.end_row;
            // Accumulate unrounded so per-page rounding never drifts
            top += margin + content.height as f32 * raw;
        }
        self.row_count = row;

        let contents = self.content_sizes();
        let max_width = contents.iter().map(|s| s.width).max().unwrap_or(0);
        let total_height: i32 = contents.iter().map(|s| s.height).sum();
        let count = self.original.len() as i32;

        self.width = ((max_width + self.margin * 2) as f32 * raw + 0.5) as i32;
        self.height = ((total_height + (count + 1) * self.margin) as f32 * raw) as i32;
    }

    /// Original page sizes with the crop removed
    pub fn content_sizes(&self) -> Vec<Size> {
        self.original.iter().map(|size| self.crop.shrink(*size)).collect()
    }

    /// Original page sizes
    pub fn original_sizes(&self) -> &[Size] {
        &self.original
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn row_count(&self) -> i32 {
        self.row_count
    }

    pub fn tile_size(&self) -> Size {
        self.tile
    }

    pub fn raw_scale(&self) -> f32 {
        self.raw_scale
    }

    /// Page margin in original units
    pub fn margin(&self) -> i32 {
        self.margin
    }

    /// Page margin in document pixels
    pub fn current_margin(&self) -> f32 {
        self.margin as f32 * self.raw_scale
    }

    pub fn crop(&self) -> Insets {
        self.crop
    }

    /// Document size at the raw scale
    pub fn document_size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn page(&self, page: usize) -> Option<&PageLayout> {
        self.pages.get(page)
    }

    /// Page containing `row`, found by binary search
    pub fn page_of(&self, row: i32) -> Option<usize> {
        let index = self.pages.partition_point(|page| page.end_row <= row);
        self.pages
            .get(index)
            .filter(|page| row >= page.start_row && row < page.end_row)
            .map(|_| index)
    }

    /// Left edge of `page` in the document
    pub fn left_of(&self, page: usize) -> Option<i32> {
        self.pages.get(page).map(|attr| (self.width - attr.width) / 2)
    }

    /// Top edge of `page` in the document
    pub fn top_of(&self, page: usize) -> Option<i32> {
        self.pages.get(page).map(|attr| attr.top)
    }

    pub fn width_of(&self, page: usize) -> Option<i32> {
        self.pages.get(page).map(|attr| attr.width)
    }

    pub fn height_of(&self, page: usize) -> Option<i32> {
        self.pages.get(page).map(|attr| attr.height)
    }

    /// Page rectangle in the document
    pub fn page_bounds(&self, page: usize) -> Option<Rect> {
        let attr = self.pages.get(page)?;
        let left = (self.width - attr.width) / 2;
        Some(Rect::new(left, attr.top, left + attr.width, attr.top + attr.height))
    }

    /// Number of columns in `row`
    pub fn column_count(&self, row: i32) -> Option<i32> {
        self.page_of(row).map(|page| self.pages[page].columns)
    }

    /// Document bounds of the tile at (`row`, `col`) on `page`
    ///
    /// The last row and column are clipped to the page edge. Panics if
    /// `page` is out of range.
    pub fn bounds_of(&self, page: usize, row: i32, col: i32) -> Rect {
        let attr = &self.pages[page];
        let tile = self.tile;

        let (left, right) = attr.columns_span.range_of(col, tile.width);
        let (top, bottom) = attr.rows_span.range_of(row - attr.start_row, tile.height);

        Rect::new(left, top, right, bottom).offset((self.width - attr.width) / 2, attr.top)
    }

    /// Document bounds of the tile at (`row`, `col`)
    pub fn tile_bounds(&self, row: i32, col: i32) -> Option<Rect> {
        self.page_of(row).map(|page| self.bounds_of(page, row, col))
    }

    /// Region of the scaled page to render for tile `bounds`
    ///
    /// Relative to the uncropped page, so the crop offset is added back.
    /// Panics if `page` is out of range.
    pub fn render_region(&self, page: usize, bounds: Rect) -> Rect {
        let attr = &self.pages[page];
        let left = (self.width - attr.width) / 2;
        let crop_left = (self.crop.left as f32 * self.raw_scale) as i32;
        let crop_top = (self.crop.top as f32 * self.raw_scale) as i32;
        bounds.offset(crop_left - left, crop_top - attr.top)
    }
}

#[cfg(test)]
impl DocumentLayout {
    /// Collapse the last column of `page` to zero width until the next update
    pub(crate) fn collapse_last_column(&mut self, page: usize) {
        self.pages[page].columns_span.last_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const TILE: Size = Size::new(320, 320);

    fn two_pages() -> DocumentLayout {
        let mut layout = DocumentLayout::new(
            vec![Size::new(1000, 2000), Size::new(1000, 1500)],
            TILE,
        );
        layout.update(1.0, 24, Insets::default()).unwrap();
        layout
    }

    #[test]
    fn test_rows_are_continuous_across_pages() {
        let layout = two_pages();
        let first = layout.page(0).unwrap();
        let second = layout.page(1).unwrap();

        assert_eq!((first.start_row, first.end_row), (0, 7));
        assert_eq!((second.start_row, second.end_row), (7, 12));
        assert_eq!(layout.row_count(), 12);
        assert_eq!(first.columns, 4);
    }

    #[test]
    fn test_page_of() {
        let layout = two_pages();
        assert_eq!(layout.page_of(0), Some(0));
        assert_eq!(layout.page_of(6), Some(0));
        assert_eq!(layout.page_of(7), Some(1));
        assert_eq!(layout.page_of(8), Some(1));
        assert_eq!(layout.page_of(11), Some(1));
        assert_eq!(layout.page_of(12), None);
        assert_eq!(layout.page_of(-1), None);
    }

    #[test]
    fn test_page_positions_and_document_size() {
        let layout = two_pages();
        assert_eq!(layout.top_of(0), Some(24));
        assert_eq!(layout.top_of(1), Some(24 + 2000 + 24));
        assert_eq!(layout.document_size(), Size::new(1048, 3500 + 3 * 24));
        assert_eq!(layout.left_of(0), Some(24));
        assert_eq!(layout.page_bounds(1), Some(Rect::new(24, 2048, 1024, 3548)));
    }

    #[test]
    fn test_last_row_and_column_are_clipped() {
        let layout = two_pages();
        // 2000 = 6 * 320 + 80
        let last = layout.bounds_of(0, 6, 3);
        assert_eq!(last, Rect::new(960, 1920, 1000, 2000).offset(24, 24));
        assert_eq!(layout.page(0).unwrap().last_clip(), Rect::new(960, 1920, 1000, 2000));

        let inner = layout.bounds_of(0, 1, 1);
        assert_eq!(inner, Rect::new(320, 320, 640, 640).offset(24, 24));
    }

    #[test]
    fn test_exact_multiple_has_full_last_tile() {
        let mut layout = DocumentLayout::new(vec![Size::new(320, 640)], TILE);
        layout.update(1.0, 0, Insets::default()).unwrap();
        let page = layout.page(0).unwrap();
        assert_eq!(page.rows(), 2);
        assert_eq!(page.last_clip(), Rect::new(0, 320, 320, 640));
        assert_eq!(layout.tile_bounds(1, 0), Some(Rect::new(0, 320, 320, 640)));
    }

    #[test]
    fn test_margin_accumulates_without_drift() {
        let pages = vec![Size::new(100, 333); 50];
        let mut layout = DocumentLayout::new(pages, TILE);
        layout.update(0.37, 7, Insets::default()).unwrap();

        for page in 0..50 {
            let expected = (7.0 * 0.37 + page as f32 * (7.0 * 0.37 + 333.0 * 0.37)) + 0.5;
            let top = layout.top_of(page).unwrap();
            assert!((top - expected as i32).abs() <= 1, "page {page}: {top}");
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut layout = two_pages();
        let before: Vec<_> = (0..2).map(|p| *layout.page(p).unwrap()).collect();
        let size = layout.document_size();

        layout.update(1.0, 24, Insets::default()).unwrap();
        let after: Vec<_> = (0..2).map(|p| *layout.page(p).unwrap()).collect();
        assert_eq!(before, after);
        assert_eq!(size, layout.document_size());
    }

    #[test]
    fn test_crop_shrinks_pages_and_offsets_region() {
        let mut layout = DocumentLayout::new(vec![Size::new(1000, 1000)], TILE);
        layout
            .update(2.0, 0, Insets::new(100, 50, 100, 50))
            .unwrap();
        assert_eq!(layout.width_of(0), Some(1600));
        assert_eq!(layout.height_of(0), Some(1800));
        assert_eq!(layout.content_sizes(), vec![Size::new(800, 900)]);

        let bounds = layout.bounds_of(0, 0, 0);
        assert_eq!(
            layout.render_region(0, bounds),
            Rect::new(200, 100, 520, 420)
        );
    }

    #[test]
    fn test_invalid_crop_resets_to_empty() {
        let mut layout = DocumentLayout::new(vec![Size::new(100, 100), Size::new(100, 40)], TILE);
        let crop = Insets::new(0, 20, 0, 20);
        assert_eq!(
            layout.update(1.0, 0, crop),
            Err(LayoutError::InvalidCrop { crop, page: 1 })
        );
        assert_eq!(layout.crop(), Insets::default());
        assert_eq!(layout.height_of(1), Some(40));

        assert!(layout.check_crop(Insets::new(-1, 0, 0, 0)).is_err());
        assert!(layout.check_crop(Insets::new(0, 19, 0, 20)).is_ok());
    }

    #[test]
    fn test_random_layouts_partition_pages() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let pages: Vec<Size> = (0..rng.gen_range(1..6))
                .map(|_| Size::new(rng.gen_range(1..3000), rng.gen_range(1..3000)))
                .collect();
            let tile = Size::new(rng.gen_range(16..512), rng.gen_range(16..512));
            let mut layout = DocumentLayout::new(pages, tile);
            layout
                .update(rng.gen_range(0.05..3.0), rng.gen_range(0..40), Insets::default())
                .unwrap();

            for page in 0..layout.page_count() {
                let attr = *layout.page(page).unwrap();
                let origin = layout.page_bounds(page).unwrap();
                let mut area = 0i64;
                for row in attr.start_row..attr.end_row {
                    assert_eq!(layout.page_of(row), Some(page));
                    let height = layout.bounds_of(page, row, 0).height();
                    for col in 0..attr.columns {
                        let bounds = layout.bounds_of(page, row, col);
                        assert!(!bounds.is_empty());
                        assert_eq!(bounds.height(), height);
                        assert_eq!(bounds.intersection(&origin), Some(bounds));
                        area += bounds.width() as i64 * bounds.height() as i64;
                    }
                }
                assert_eq!(area, attr.width as i64 * attr.height as i64);
            }
        }
    }
}
