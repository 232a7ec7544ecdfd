//! Buffer pool sizing.
//!
//! Sizing is fixed once a pool is constructed; changing any value means
//! building a new pool.

use docview_render::{PixelFormat, DEFAULT_TILE_SIZE};
use serde::{Deserialize, Serialize};

/// Default thumbnail scale relative to a full tile
pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.1;

/// Configuration for a [`BufferPool`](crate::BufferPool)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Width of a full tile buffer in pixels
    pub tile_width: u32,
    /// Height of a full tile buffer in pixels
    pub tile_height: u32,
    /// Thumbnail edge length as a fraction of the full tile, in (0, 1]
    pub thumbnail_scale: f32,
    /// Use 32-bit full tile buffers instead of 16-bit ones
    pub best_quality: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE as u32,
            tile_height: DEFAULT_TILE_SIZE as u32,
            thumbnail_scale: DEFAULT_THUMBNAIL_SCALE,
            best_quality: false,
        }
    }
}

impl PoolConfig {
    /// Square tiles of `tile_size` pixels with default thumbnail scale
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_width: tile_size,
            tile_height: tile_size,
            ..Self::default()
        }
    }

    /// Sets the tile size.
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Sets the thumbnail scale.
    pub fn with_thumbnail_scale(mut self, scale: f32) -> Self {
        self.thumbnail_scale = scale;
        self
    }

    /// Sets the full tile quality flag.
    pub fn with_best_quality(mut self, best_quality: bool) -> Self {
        self.best_quality = best_quality;
        self
    }

    /// Check the values can size a pool
    pub fn validate(&self) -> Result<(), PoolConfigError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(PoolConfigError::EmptyTile {
                width: self.tile_width,
                height: self.tile_height,
            });
        }
        if !(self.thumbnail_scale > 0.0 && self.thumbnail_scale <= 1.0) {
            return Err(PoolConfigError::ThumbnailScale(self.thumbnail_scale));
        }
        Ok(())
    }

    /// Pixel format of full tile buffers
    pub fn full_format(&self) -> PixelFormat {
        if self.best_quality {
            PixelFormat::Rgba8888
        } else {
            PixelFormat::Rgb565
        }
    }

    /// Pixel format of thumbnail buffers
    pub fn thumbnail_format(&self) -> PixelFormat {
        PixelFormat::Rgb565
    }

    /// Thumbnail buffer dimensions, never smaller than 1x1
    pub fn thumbnail_size(&self) -> (u32, u32) {
        let w = (self.tile_width as f32 * self.thumbnail_scale) as u32;
        let h = (self.tile_height as f32 * self.thumbnail_scale) as u32;
        (w.max(1), h.max(1))
    }
}

/// Invalid pool sizing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoolConfigError {
    #[error("tile size must be non-zero, got {width}x{height}")]
    EmptyTile { width: u32, height: u32 },
    #[error("thumbnail scale must be in (0, 1], got {0}")]
    ThumbnailScale(f32),
}
