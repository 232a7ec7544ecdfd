//! Docview Viewer Library
//!
//! A tiled, zoomable, scrollable document view.
//!
//! Pages are laid out in a vertical strip and cut into fixed size tiles.
//! Only tiles inside the visible window (grown by one tile on every side)
//! are live; each live tile owns a pooled pixel buffer rendered on the
//! scheduler's worker. Scrolling recycles tiles that leave the window and
//! binds new ones; zooming scales the existing tiles and renders new ones
//! at thumbnail resolution until the gesture ends, when the scale is
//! committed and every tile is rebuilt at full resolution.
//!
//! The viewer is host agnostic. The host feeds it pointer events, view
//! sizes and a monotonic clock, pumps completions when the worker wakes it,
//! and paints the [`DrawList`] it gets back.
//!
//! # Example
//!
//! ```
//! use docview_render::{PatternRenderer, Size};
//! use docview_viewer::{DocumentViewer, ViewerConfig, ViewerStatus};
//! use std::time::Duration;
//!
//! let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
//! viewer.resize(800, 600);
//! viewer.open(Box::new(PatternRenderer::uniform(3, Size::new(612, 792))));
//! viewer.pump_until_idle(Duration::from_secs(5));
//!
//! assert_eq!(viewer.status(), ViewerStatus::Ready);
//! viewer.move_by(0, 400);
//! let frame = viewer.draw_list();
//! assert!(!frame.is_empty());
//! ```

mod animation;
mod binding;
mod config;
mod draw;
mod gesture;
mod layout;
mod scale;
mod tiles;
mod viewer;
mod viewport;

// Re-export public API
pub use animation::{AnimationConfig, AnimationStep, Animator, Easing};
pub use binding::{RenderBinder, TileContent};
pub use config::{
    ConfigError, LayoutConfig, ViewerConfig, WorkerSection, ENV_BEST_QUALITY, ENV_PAGE_MARGIN,
    ENV_THUMBNAIL_SCALE, ENV_TILE_SIZE,
};
pub use draw::{DrawItem, DrawList};
pub use gesture::{GestureConfig, GestureInterpreter, Intent, PointerEvent, PointerKind};
pub use layout::{DocumentLayout, LayoutError, PageLayout};
pub use scale::{ScaleLimits, ScalePolicy, DEFAULT_FULL_WIDTH_MARGIN};
pub use tiles::{Tile, TileBinder, TileError, TileGrid, TileManager, TileWindow};
pub use viewer::{DocumentViewer, ViewerError, ViewerEvent, ViewerStatus};
pub use viewport::{OffsetBounds, ScrollState, Viewport};
