//! Docview Scheduler Library
//!
//! Background tile rendering on a single worker thread.
//!
//! The control thread owns the tile grid; the worker owns the renderer.
//! Render tasks carry their destination buffer to the worker and come back
//! through a completion channel, so no pixel data is ever shared between
//! threads. Tasks run in submission order and can be cancelled at any point
//! of their life without leaking their buffer.
//!
//! # Example
//!
//! ```
//! use docview_cache::{BufferPool, PoolConfig};
//! use docview_render::{PatternRenderer, Rect, Size};
//! use docview_scheduler::{CancelOutcome, RenderRequest, RenderScheduler, TileKey, WorkerConfig};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(BufferPool::new(PoolConfig::default()).unwrap());
//! let mut scheduler = RenderScheduler::new(pool.clone(), WorkerConfig::default()).unwrap();
//! scheduler.open(Box::new(PatternRenderer::uniform(3, Size::new(612, 792))));
//!
//! let task = scheduler.submit(
//!     RenderRequest {
//!         tile: TileKey::new(0, 0),
//!         page: 0,
//!         scale: 1.0,
//!         region: Rect::new(0, 0, 320, 320),
//!     },
//!     pool.acquire_full(),
//! );
//!
//! // The tile scrolled away before its result was consumed
//! let outcome = scheduler.cancel(task);
//! assert_ne!(outcome, CancelOutcome::Unknown);
//! ```

mod job;
mod scheduler;
mod task;
mod worker;

// Re-export public API
pub use job::{CancelOutcome, Completion, DocumentId, RenderOutcome, RenderRequest, TileKey};
pub use scheduler::{RenderScheduler, SchedulerError, SchedulerStats, Waker};
pub use task::{TaskId, TaskState};
pub use worker::WorkerConfig;
