//! Tile population and recycling
//!
//! The manager keeps the tiles intersecting the visible window, grouped in
//! rows ordered top to bottom and columns ordered left to right:
//!
//! ```text
//! +------------------------------------------------+
//! |        |    tile    |   tile   |               |
//! +-------------------------------------------     +
//! |  tile    |    tile    |   tile   | tile  |     |
//! +------------------------------------------------+
//! |      | tile    |    tile    |   tile   | tile  |
//! +      ------------------------------------------+
//! | visible window                                 |
//! +------------------------------------------------+
//! ```
//!
//! Tiles may differ in width, but every tile in a row has the same height.
//! Tiles leaving the window are recycled into a spare list and reused for
//! tiles entering it.

use crate::layout::DocumentLayout;
use docview_render::Rect;
use docview_scheduler::TileKey;
use std::collections::VecDeque;

/// Broken layout detected while populating; the frame is abandoned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileError {
    #[error("tile ({row}, {col}) has empty bounds")]
    EmptyBounds { row: i32, col: i32 },
    #[error("tile ({row}, {col}) is {actual}px tall in a row of {expected}px")]
    InconsistentRowHeight {
        row: i32,
        col: i32,
        expected: i32,
        actual: i32,
    },
}

/// Tile geometry the manager walks
///
/// Rows are numbered continuously across pages, and every tile in a row is
/// expected to have the same height.
pub trait TileGrid {
    fn row_count(&self) -> i32;

    /// Page holding `row`
    fn page_of(&self, row: i32) -> Option<usize>;

    fn column_count(&self, row: i32) -> Option<i32>;

    /// Document bounds of tile (`row`, `col`) on `page`
    fn bounds_of(&self, page: usize, row: i32, col: i32) -> Rect;

    fn tile_bounds(&self, row: i32, col: i32) -> Option<Rect> {
        self.page_of(row).map(|page| self.bounds_of(page, row, col))
    }
}

impl TileGrid for DocumentLayout {
    fn row_count(&self) -> i32 {
        DocumentLayout::row_count(self)
    }

    fn page_of(&self, row: i32) -> Option<usize> {
        DocumentLayout::page_of(self, row)
    }

    fn column_count(&self, row: i32) -> Option<i32> {
        DocumentLayout::column_count(self, row)
    }

    fn bounds_of(&self, page: usize, row: i32, col: i32) -> Rect {
        DocumentLayout::bounds_of(self, page, row, col)
    }
}

/// A tile and whatever is attached to it
#[derive(Debug)]
pub struct Tile<C> {
    pub key: TileKey,
    /// Bounds in the document at the raw scale
    pub bounds: Rect,
    pub content: C,
}

/// Attaches and detaches content when tiles enter or leave the window
pub trait TileBinder<C> {
    /// Start producing content for a tile that became visible
    fn bind(&mut self, tile: &mut Tile<C>);

    /// Release everything attached to a tile leaving the window
    fn recycle(&mut self, tile: &mut Tile<C>);
}

/// Visible window in scaled document space
///
/// Tile bounds are unscaled; they are scaled by the interactive zoom before
/// every test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileWindow {
    pub rect: Rect,
    pub scale: f32,
}

impl TileWindow {
    pub fn new(rect: Rect, scale: f32) -> Self {
        Self { rect, scale }
    }

    pub fn is_visible(&self, bounds: &Rect) -> bool {
        self.rect.intersects(&bounds.scale(self.scale))
    }

    fn is_above(&self, bounds: &Rect) -> bool {
        bounds.scale(self.scale).bottom < self.rect.top
    }

    fn is_below(&self, bounds: &Rect) -> bool {
        bounds.scale(self.scale).top > self.rect.bottom
    }
}

#[derive(Debug)]
struct TileRow<C> {
    index: i32,
    tiles: VecDeque<Tile<C>>,
}

/// Keeps the tile set in sync with the visible window
#[derive(Debug)]
pub struct TileManager<C> {
    rows: VecDeque<TileRow<C>>,
    spare: Vec<Tile<C>>,
}

impl<C> Default for TileManager<C> {
    fn default() -> Self {
        Self {
            rows: VecDeque::new(),
            spare: Vec::new(),
        }
    }
}

impl<C: Default> TileManager<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// First row holding tiles
    pub fn first_visible_row(&self) -> Option<i32> {
        self.rows.front().map(|row| row.index)
    }

    /// Last row holding tiles
    pub fn last_visible_row(&self) -> Option<i32> {
        self.rows.back().map(|row| row.index)
    }

    /// Tiles in row then column order
    pub fn tiles(&self) -> impl Iterator<Item = &Tile<C>> {
        self.rows.iter().flat_map(|row| row.tiles.iter())
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(|row| row.tiles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Recycled tiles kept for reuse
    pub fn spare_count(&self) -> usize {
        self.spare.len()
    }

    pub fn tile_mut(&mut self, key: TileKey) -> Option<&mut Tile<C>> {
        let row = self.rows.iter_mut().find(|row| row.index == key.row)?;
        row.tiles.iter_mut().find(|tile| tile.key == key)
    }

    /// Add every tile of the window that is not present yet
    ///
    /// Seeds the first visible tile, grows rows above and below, fills rows
    /// missing in between, then extends every row left and right. Each new
    /// tile is bound once. On a broken row the pass stops; tiles already
    /// placed stay, and tiles of the unfinished row are recycled.
    pub fn populate(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
    ) -> Result<(), TileError> {
        if layout.row_count() == 0 {
            return Ok(());
        }
        self.fill_first(layout, window, binder)?;
        self.fill_above(layout, window, binder)?;
        self.fill_below(layout, window, binder)?;
        self.fill_gaps(layout, window, binder)?;
        self.fill_horizontal(layout, window, binder, false)?;
        self.fill_horizontal(layout, window, binder, true)?;
        Ok(())
    }

    /// Drop every tile that left the window
    ///
    /// Trims rows from the left and right, then whole rows from the top and
    /// bottom, stopping at the first visible tile in each direction.
    pub fn recycle(&mut self, window: &TileWindow, binder: &mut impl TileBinder<C>) {
        self.recycle_horizontal(window, binder, false);
        self.recycle_horizontal(window, binder, true);
        self.recycle_vertical(window, binder, false);
        self.recycle_vertical(window, binder, true);
    }

    /// Recycle every tile
    pub fn recycle_all(&mut self, binder: &mut impl TileBinder<C>) {
        while let Some(row) = self.rows.pop_front() {
            self.recycle_row(row, binder);
        }
    }

    /// Detach and bind every tile again in place
    pub fn rebind(&mut self, binder: &mut impl TileBinder<C>) {
        for tile in self.rows.iter_mut().flat_map(|row| row.tiles.iter_mut()) {
            binder.recycle(tile);
            binder.bind(tile);
        }
    }

    fn acquire(&mut self, key: TileKey, bounds: Rect) -> Tile<C> {
        match self.spare.pop() {
            Some(mut tile) => {
                tile.key = key;
                tile.bounds = bounds;
                tile
            }
            None => Tile {
                key,
                bounds,
                content: C::default(),
            },
        }
    }

    fn create(&mut self, key: TileKey, bounds: Rect, binder: &mut impl TileBinder<C>) -> Tile<C> {
        let mut tile = self.acquire(key, bounds);
        binder.bind(&mut tile);
        tile
    }

    fn release(&mut self, mut tile: Tile<C>, binder: &mut impl TileBinder<C>) {
        binder.recycle(&mut tile);
        self.spare.push(tile);
    }

    fn recycle_row(&mut self, row: TileRow<C>, binder: &mut impl TileBinder<C>) {
        for tile in row.tiles {
            self.release(tile, binder);
        }
    }

    fn check(row: i32, col: i32, bounds: &Rect, row_height: i32) -> Result<(), TileError> {
        if bounds.is_empty() {
            return Err(TileError::EmptyBounds { row, col });
        }
        if bounds.height() != row_height {
            return Err(TileError::InconsistentRowHeight {
                row,
                col,
                expected: row_height,
                actual: bounds.height(),
            });
        }
        Ok(())
    }

    /// Visible tiles of `row`, left to right, stopping after the visible run
    fn scan_row(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
        row: i32,
    ) -> Result<Option<TileRow<C>>, TileError> {
        let Some(page) = layout.page_of(row) else {
            return Ok(None);
        };
        let columns = layout.column_count(row).unwrap_or(0);
        let row_height = layout.bounds_of(page, row, 0).height();

        let mut tiles = VecDeque::new();
        for col in 0..columns {
            let bounds = layout.bounds_of(page, row, col);
            if let Err(error) = Self::check(row, col, &bounds, row_height) {
                for tile in tiles {
                    self.release(tile, binder);
                }
                return Err(error);
            }

            if window.is_visible(&bounds) {
                tiles.push_back(self.create(TileKey::new(row, col), bounds, binder));
            } else if !tiles.is_empty() {
                break;
            }
        }

        Ok((!tiles.is_empty()).then_some(TileRow { index: row, tiles }))
    }

    fn row_bounds(layout: &impl TileGrid, row: i32) -> Option<Rect> {
        layout.tile_bounds(row, 0)
    }

    fn fill_first(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
    ) -> Result<(), TileError> {
        if !self.rows.is_empty() {
            return Ok(());
        }

        for row in 0..layout.row_count() {
            let Some(bounds) = Self::row_bounds(layout, row) else {
                continue;
            };
            if window.is_above(&bounds) {
                continue;
            }
            if window.is_below(&bounds) {
                break;
            }

            let Some(page) = layout.page_of(row) else {
                continue;
            };
            let columns = layout.column_count(row).unwrap_or(0);
            for col in 0..columns {
                let bounds = layout.bounds_of(page, row, col);
                if window.is_visible(&bounds) {
                    Self::check(row, col, &bounds, bounds.height())?;
                    let tile = self.create(TileKey::new(row, col), bounds, binder);
                    self.rows.push_back(TileRow {
                        index: row,
                        tiles: VecDeque::from([tile]),
                    });
                    return Ok(());
                }
            }
            // A narrow page may leave this row without visible tiles
        }
        Ok(())
    }

    fn fill_above(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
    ) -> Result<(), TileError> {
        let Some(start) = self.first_visible_row() else {
            return Ok(());
        };
        for row in (0..start).rev() {
            let Some(bounds) = Self::row_bounds(layout, row) else {
                continue;
            };
            if window.is_above(&bounds) || window.is_below(&bounds) {
                break;
            }
            if let Some(tiles) = self.scan_row(layout, window, binder, row)? {
                self.rows.push_front(tiles);
            }
        }
        Ok(())
    }

    fn fill_below(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
    ) -> Result<(), TileError> {
        let Some(start) = self.last_visible_row() else {
            return Ok(());
        };
        for row in start + 1..layout.row_count() {
            let Some(bounds) = Self::row_bounds(layout, row) else {
                continue;
            };
            if window.is_above(&bounds) || window.is_below(&bounds) {
                break;
            }
            if let Some(tiles) = self.scan_row(layout, window, binder, row)? {
                self.rows.push_back(tiles);
            }
        }
        Ok(())
    }

    /// Rows dropped while empty can leave holes between populated rows
    fn fill_gaps(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
    ) -> Result<(), TileError> {
        let mut index = 1;
        while index < self.rows.len() {
            let previous = self.rows[index - 1].index;
            let next = self.rows[index].index;
            for row in previous + 1..next {
                if let Some(tiles) = self.scan_row(layout, window, binder, row)? {
                    self.rows.insert(index, tiles);
                    index += 1;
                }
            }
            index += 1;
        }
        Ok(())
    }

    fn fill_horizontal(
        &mut self,
        layout: &impl TileGrid,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
        to_right: bool,
    ) -> Result<(), TileError> {
        for index in 0..self.rows.len() {
            let row = &self.rows[index];
            let (Some(first), Some(last)) = (row.tiles.front(), row.tiles.back()) else {
                continue;
            };
            let start = if to_right { last } else { first };
            let (row_index, start_col, row_height) =
                (row.index, start.key.col, start.bounds.height());

            let Some(page) = layout.page_of(row_index) else {
                continue;
            };
            let columns = layout.column_count(row_index).unwrap_or(0);
            let range: Box<dyn Iterator<Item = i32>> = if to_right {
                Box::new(start_col + 1..columns)
            } else {
                Box::new((0..start_col).rev())
            };

            for col in range {
                let bounds = layout.bounds_of(page, row_index, col);
                Self::check(row_index, col, &bounds, row_height)?;
                if !window.is_visible(&bounds) {
                    break;
                }
                let tile = self.create(TileKey::new(row_index, col), bounds, binder);
                let tiles = &mut self.rows[index].tiles;
                if to_right {
                    tiles.push_back(tile);
                } else {
                    tiles.push_front(tile);
                }
            }
        }
        Ok(())
    }

    fn recycle_horizontal(
        &mut self,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
        from_right: bool,
    ) {
        let mut released = Vec::new();
        for row in self.rows.iter_mut() {
            loop {
                let edge = if from_right {
                    row.tiles.back()
                } else {
                    row.tiles.front()
                };
                match edge {
                    Some(tile) if !window.is_visible(&tile.bounds) => {}
                    _ => break,
                }
                let tile = if from_right {
                    row.tiles.pop_back()
                } else {
                    row.tiles.pop_front()
                };
                released.extend(tile);
            }
        }
        self.rows.retain(|row| !row.tiles.is_empty());

        for tile in released {
            self.release(tile, binder);
        }
    }

    fn recycle_vertical(
        &mut self,
        window: &TileWindow,
        binder: &mut impl TileBinder<C>,
        from_below: bool,
    ) {
        loop {
            let edge = if from_below {
                self.rows.back()
            } else {
                self.rows.front()
            };
            let Some(row) = edge else {
                return;
            };
            // Invisible tiles at the row ends are gone, so the first tile decides
            let visible = row
                .tiles
                .front()
                .is_some_and(|tile| window.is_visible(&tile.bounds));
            if visible {
                return;
            }
            let row = if from_below {
                self.rows.pop_back()
            } else {
                self.rows.pop_front()
            };
            if let Some(row) = row {
                self.recycle_row(row, binder);
            }
        }
    }
}
