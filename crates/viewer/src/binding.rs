//! Tile content and its binding to render tasks.

use crate::layout::DocumentLayout;
use crate::tiles::{Tile, TileBinder};
use docview_render::PixelBuffer;
use docview_scheduler::{CancelOutcome, RenderRequest, RenderScheduler, TaskId};

/// What a tile currently shows
#[derive(Debug, Default)]
pub enum TileContent {
    /// Not bound
    #[default]
    Empty,
    /// Waiting for the worker
    Pending { task: TaskId },
    /// Rendered pixels, full or thumbnail class
    Ready(PixelBuffer),
    /// The page failed to render; the tile stays blank
    Failed,
}

impl TileContent {
    pub fn is_pending(&self) -> bool {
        matches!(self, TileContent::Pending { .. })
    }

    pub fn buffer(&self) -> Option<&PixelBuffer> {
        match self {
            TileContent::Ready(buffer) => Some(buffer),
            _ => None,
        }
    }
}

/// Submits a render task for every bound tile and cancels it on recycle
///
/// Tiles bound while a zoom gesture runs get a thumbnail buffer rendered at
/// the thumbnail scale, so the gesture never waits on full resolution work.
pub struct RenderBinder<'a> {
    scheduler: &'a RenderScheduler,
    layout: &'a DocumentLayout,
    zooming: bool,
}

impl<'a> RenderBinder<'a> {
    pub fn new(scheduler: &'a RenderScheduler, layout: &'a DocumentLayout, zooming: bool) -> Self {
        Self {
            scheduler,
            layout,
            zooming,
        }
    }

    fn request(&self, tile: &Tile<TileContent>, page: usize) -> (RenderRequest, PixelBuffer) {
        let pool = self.scheduler.pool();
        let raw = self.layout.raw_scale();
        let region = self.layout.render_region(page, tile.bounds);

        let (scale, region, buffer) = if self.zooming {
            let thumbnail = pool.thumbnail_scale();
            (thumbnail * raw, region.scale(thumbnail), pool.acquire_thumbnail())
        } else {
            (raw, region, pool.acquire_full())
        };

        let request = RenderRequest {
            tile: tile.key,
            page,
            scale,
            region,
        };
        (request, buffer)
    }
}

impl TileBinder<TileContent> for RenderBinder<'_> {
    fn bind(&mut self, tile: &mut Tile<TileContent>) {
        let Some(page) = self.layout.page_of(tile.key.row) else {
            tile.content = TileContent::Failed;
            return;
        };
        let (request, buffer) = self.request(tile, page);
        let task = self.scheduler.submit(request, buffer);
        tile.content = TileContent::Pending { task };
    }

    fn recycle(&mut self, tile: &mut Tile<TileContent>) {
        match std::mem::take(&mut tile.content) {
            TileContent::Pending { task } => {
                let outcome = self.scheduler.cancel(task);
                if outcome == CancelOutcome::Unknown {
                    tracing::warn!(tile = ?tile.key, ?task, "recycled tile had no live render task");
                } else {
                    tracing::trace!(tile = ?tile.key, ?outcome, "cancelled tile render");
                }
            }
            TileContent::Ready(buffer) => {
                self.scheduler.pool().recycle(buffer);
            }
            TileContent::Empty | TileContent::Failed => {}
        }
    }
}
