//! Work items for the render worker and the results it sends back.

use crate::task::TaskId;
use docview_render::{PixelBuffer, Rect, RenderError, Renderer, Size};

/// Position of a tile in the document's tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub row: i32,
    pub col: i32,
}

impl TileKey {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// What to render for one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// Tile the result belongs to
    pub tile: TileKey,

    /// Page index
    pub page: usize,

    /// Page scale to render at
    pub scale: f32,

    /// Region of the scaled page to render, written at the buffer origin
    pub region: Rect,
}

/// Identity of an opened document, increases with every `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub(crate) u64);

impl DocumentId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Queued work for the worker thread
pub(crate) enum Job {
    /// Replace the current renderer and open it
    Open {
        document: DocumentId,
        renderer: Box<dyn Renderer>,
    },

    /// Render one tile into the attached buffer
    Render {
        task: TaskId,
        request: RenderRequest,
        buffer: PixelBuffer,
    },
}

/// Result of a finished render, handed back with the buffer it filled
#[derive(Debug)]
pub struct RenderOutcome {
    pub task: TaskId,
    pub request: RenderRequest,
    pub buffer: PixelBuffer,
    pub result: Result<(), RenderError>,
}

/// Messages from the worker to the control thread
#[derive(Debug)]
pub enum Completion {
    /// The document opened and reported its page sizes
    Opened {
        document: DocumentId,
        pages: Vec<Size>,
    },

    /// The document could not be opened
    OpenFailed {
        document: DocumentId,
        error: RenderError,
    },

    /// A render task finished, successfully or not
    Rendered(RenderOutcome),
}

/// What `cancel` did to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Removed from the queue before running; its buffer went back to the pool
    Dequeued,

    /// Running; the worker recycles the buffer when the render returns
    Interrupted,

    /// Already finished; the pending result will be discarded on receive
    AlreadyDelivered,

    /// The id is stale or was never issued
    Unknown,
}
