//! Two-class pixel buffer pool
//!
//! Buffers are handed out by value and must be given back with `recycle`.
//! A buffer is allocated only when the free list of its class is empty, and
//! every recycled buffer is wiped to white so a reused tile never flashes
//! stale content.

use crate::config::{PoolConfig, PoolConfigError};
use docview_render::{BufferClass, BufferId, PixelBuffer, WHITE};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Statistics about pool usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Full tile buffers ever allocated
    pub full_allocated: usize,

    /// Thumbnail buffers ever allocated
    pub thumbnail_allocated: usize,

    /// Full tile buffers waiting in the free list
    pub full_free: usize,

    /// Thumbnail buffers waiting in the free list
    pub thumbnail_free: usize,

    /// Recycles dropped because the buffer was already pooled or foreign
    pub rejected_recycles: u64,
}

impl PoolStats {
    /// Buffers of `class` currently held outside the pool
    pub fn outstanding(&self, class: BufferClass) -> usize {
        match class {
            BufferClass::Full => self.full_allocated - self.full_free,
            BufferClass::Thumbnail => self.thumbnail_allocated - self.thumbnail_free,
        }
    }
}

struct PoolState {
    full: VecDeque<PixelBuffer>,
    thumbnails: VecDeque<PixelBuffer>,
    next_id: u64,
    stats: PoolStats,
}

/// Thread-safe pixel buffer pool
///
/// # Example
///
/// ```
/// use docview_cache::{BufferPool, PoolConfig};
///
/// let pool = BufferPool::new(PoolConfig::new(256)).unwrap();
/// let buffer = pool.acquire_full();
/// let id = buffer.id();
/// pool.recycle_full(buffer);
///
/// // The recycled buffer is reused before anything new is allocated
/// assert_eq!(pool.acquire_full().id(), id);
/// assert_eq!(pool.stats().full_allocated, 1);
/// ```
pub struct BufferPool {
    config: PoolConfig,
    thumbnail_width: u32,
    thumbnail_height: u32,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Create an empty pool; nothing is allocated up front
    pub fn new(config: PoolConfig) -> Result<Self, PoolConfigError> {
        config.validate()?;
        let (thumbnail_width, thumbnail_height) = config.thumbnail_size();
        Ok(Self {
            config,
            thumbnail_width,
            thumbnail_height,
            state: Mutex::new(PoolState {
                full: VecDeque::new(),
                thumbnails: VecDeque::new(),
                next_id: 0,
                stats: PoolStats::default(),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Full tile buffer dimensions
    pub fn tile_size(&self) -> (u32, u32) {
        (self.config.tile_width, self.config.tile_height)
    }

    /// Thumbnail buffer dimensions
    pub fn thumbnail_size(&self) -> (u32, u32) {
        (self.thumbnail_width, self.thumbnail_height)
    }

    pub fn thumbnail_scale(&self) -> f32 {
        self.config.thumbnail_scale
    }

    /// Take a full tile buffer, allocating only if none is free
    pub fn acquire_full(&self) -> PixelBuffer {
        self.acquire(BufferClass::Full)
    }

    /// Take a thumbnail buffer, allocating only if none is free
    pub fn acquire_thumbnail(&self) -> PixelBuffer {
        self.acquire(BufferClass::Thumbnail)
    }

    /// Give a full tile buffer back
    pub fn recycle_full(&self, buffer: PixelBuffer) -> bool {
        debug_assert_eq!(buffer.class(), BufferClass::Full);
        self.recycle(buffer)
    }

    /// Give a thumbnail buffer back
    pub fn recycle_thumbnail(&self, buffer: PixelBuffer) -> bool {
        debug_assert_eq!(buffer.class(), BufferClass::Thumbnail);
        self.recycle(buffer)
    }

    /// Give a buffer back to the free list of its class
    ///
    /// The buffer is wiped to white. Returns `false` when the buffer was not
    /// taken in: a buffer whose id is already pooled, or one whose size does
    /// not match this pool, is dropped instead.
    pub fn recycle(&self, mut buffer: PixelBuffer) -> bool {
        let class = buffer.class();
        let expected = match class {
            BufferClass::Full => self.tile_size(),
            BufferClass::Thumbnail => self.thumbnail_size(),
        };

        let mut guard = self.state();
        let state = &mut *guard;
        if (buffer.width(), buffer.height()) != expected {
            tracing::warn!(
                id = buffer.id().raw(),
                width = buffer.width(),
                height = buffer.height(),
                "dropping buffer that does not belong to this pool"
            );
            state.stats.rejected_recycles += 1;
            return false;
        }

        let free = match class {
            BufferClass::Full => &state.full,
            BufferClass::Thumbnail => &state.thumbnails,
        };
        if free.iter().any(|pooled| pooled.id() == buffer.id()) {
            state.stats.rejected_recycles += 1;
            return false;
        }

        buffer.fill(WHITE);
        match class {
            BufferClass::Full => {
                state.full.push_back(buffer);
                state.stats.full_free = state.full.len();
            }
            BufferClass::Thumbnail => {
                state.thumbnails.push_back(buffer);
                state.stats.thumbnail_free = state.thumbnails.len();
            }
        }
        true
    }

    /// Drop every free buffer, keeping outstanding ones accounted for
    pub fn trim(&self) {
        let mut state = self.state();
        let full = state.full.len();
        let thumbnails = state.thumbnails.len();
        state.full.clear();
        state.thumbnails.clear();
        state.stats.full_allocated -= full;
        state.stats.thumbnail_allocated -= thumbnails;
        state.stats.full_free = 0;
        state.stats.thumbnail_free = 0;
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        self.state().stats
    }

    fn acquire(&self, class: BufferClass) -> PixelBuffer {
        let mut guard = self.state();
        let state = &mut *guard;
        let reused = match class {
            BufferClass::Full => state.full.pop_front(),
            BufferClass::Thumbnail => state.thumbnails.pop_front(),
        };
        if let Some(buffer) = reused {
            state.stats.full_free = state.full.len();
            state.stats.thumbnail_free = state.thumbnails.len();
            return buffer;
        }

        let id = BufferId::new(state.next_id);
        state.next_id += 1;
        let buffer = match class {
            BufferClass::Full => {
                state.stats.full_allocated += 1;
                PixelBuffer::new(
                    id,
                    class,
                    self.config.tile_width,
                    self.config.tile_height,
                    self.config.full_format(),
                )
            }
            BufferClass::Thumbnail => {
                state.stats.thumbnail_allocated += 1;
                PixelBuffer::new(
                    id,
                    class,
                    self.thumbnail_width,
                    self.thumbnail_height,
                    self.config.thumbnail_format(),
                )
            }
        };
        tracing::debug!(
            ?class,
            full = state.stats.full_allocated,
            thumbnails = state.stats.thumbnail_allocated,
            "allocated pixel buffer"
        );
        buffer
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
