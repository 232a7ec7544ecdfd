//! Docview Cache Library
//!
//! Pixel buffer pool shared by the control thread and the render worker.
//! Buffers come in two resolution classes, full tiles and thumbnails, and
//! are recycled instead of freed so scrolling does not allocate.

pub mod config;
pub mod pool;

pub use config::{PoolConfig, PoolConfigError};
pub use pool::{BufferPool, PoolStats};
