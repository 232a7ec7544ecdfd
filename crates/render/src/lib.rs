//! Docview Render Library
//!
//! Pixel-level building blocks shared by the tiling engine: integer geometry,
//! fixed-size pixel buffers, tile bucketing, and the `Renderer` contract that
//! concrete document decoders implement.
//!
//! A `Renderer` is only ever driven from a single worker thread. It is opened
//! once, reports the original size of every page, and then fills pixel
//! buffers with clipped regions of a page at a given scale.
//!
//! # Example
//!
//! ```
//! use docview_render::{
//!     BufferClass, BufferId, PatternRenderer, PixelBuffer, PixelFormat, Rect, Renderer, Size,
//! };
//!
//! let mut renderer = PatternRenderer::new(vec![Size::new(1000, 2000)]);
//! let pages = renderer.open().unwrap();
//! assert_eq!(pages.len(), 1);
//!
//! let mut buffer =
//!     PixelBuffer::new(BufferId::new(0), BufferClass::Full, 320, 320, PixelFormat::Rgba8888);
//! renderer
//!     .render_page_clip(&mut buffer, 0, 1.0, Rect::new(0, 0, 320, 320))
//!     .unwrap();
//! renderer.release();
//! ```

pub mod buffer;
pub mod geometry;
pub mod pattern;
pub mod raster;
pub mod renderer;
pub mod source;
pub mod tile;

pub use buffer::{BufferClass, BufferId, PixelBuffer, PixelFormat, WHITE};
pub use geometry::{Insets, Rect, Size};
pub use image::Rgba;
pub use pattern::PatternRenderer;
pub use raster::ImageRenderer;
pub use renderer::{RenderError, RenderResult, Renderer};
pub use source::DocumentSource;
pub use tile::{TileSpan, DEFAULT_TILE_SIZE};
