//! The document viewer.
//!
//! `DocumentViewer` owns the layout, the tile manager and the render
//! scheduler and exposes the narrow surface a host needs: resize, pointer
//! input, animation ticks, completion pumping and a draw list. Everything
//! here runs on the host's control thread; only rendering happens on the
//! scheduler's worker.

use crate::animation::{AnimationStep, Animator};
use crate::binding::{RenderBinder, TileContent};
use crate::config::{ConfigError, ViewerConfig};
use crate::draw::{DrawItem, DrawList};
use crate::gesture::{GestureInterpreter, Intent, PointerEvent};
use crate::layout::{DocumentLayout, LayoutError};
use crate::scale::ScaleLimits;
use crate::tiles::{TileError, TileManager};
use crate::viewport::{ScrollState, Viewport};
use docview_cache::{BufferPool, PoolConfigError, PoolStats};
use docview_render::{
    BufferClass, DocumentSource, ImageRenderer, Insets, Rect, RenderError, Renderer, Size,
};
use docview_scheduler::{
    Completion, DocumentId, RenderOutcome, RenderScheduler, SchedulerError, SchedulerStats, Waker,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scale changes smaller than this are ignored
const MIN_ZOOM_DELTA: f32 = 0.001;

/// Two scales closer than this are the same double tap target
const SCALE_EPSILON: f32 = 1e-5;

/// Errors returned by viewer operations
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolConfigError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("no document is attached")]
    NotAttached,
    #[error("page {page} is out of range, document has {count} pages")]
    PageOutOfRange { page: usize, count: usize },
}

/// Notifications for the host, drained with [`DocumentViewer::poll_event`]
#[derive(Debug)]
pub enum ViewerEvent {
    /// A document started opening
    Loading,
    /// The document opened with this many pages
    Loaded { pages: usize },
    /// The document could not be opened and is unusable
    LoadFailed { error: RenderError },
    /// One tile of `page` failed; the rest of the document is unaffected
    PageRenderFailed { page: usize, error: RenderError },
    Scrolled { dx: i32, dy: i32 },
    ScrollStateChanged(ScrollState),
    ZoomStarted,
    /// Interactive scale changed by `delta` around view point (`px`, `py`)
    Zoomed { delta: f32, px: f32, py: f32 },
    /// The interactive scale was folded into the raw scale
    ZoomEnded,
    /// A pointer went down at this document position
    Pressed { x: f32, y: f32 },
    Clicked { x: f32, y: f32 },
    PressCancelled,
    /// Tile population hit a layout defect; the frame was abandoned
    FrameAborted { error: TileError },
}

/// Document lifecycle as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerStatus {
    /// No document
    Unattached,
    /// Opening on the worker
    Loading,
    /// Opened, waiting for a non-empty view size
    Opened,
    /// Laid out and drawing
    Ready,
    /// The last open failed
    Failed,
}

struct Attached {
    document: DocumentId,
    layout: DocumentLayout,
    tiles: TileManager<TileContent>,
    limits: ScaleLimits,
}

enum DocumentState {
    Unattached,
    Loading { document: DocumentId },
    Opened { document: DocumentId, pages: Vec<Size> },
    Attached(Box<Attached>),
    Failed,
}

/// Tiled, zoomable view of one document
pub struct DocumentViewer {
    config: ViewerConfig,
    scheduler: RenderScheduler,
    state: DocumentState,
    viewport: Viewport,
    animator: Animator,
    gestures: GestureInterpreter,
    gestures_enabled: bool,
    crop: Insets,
    scroll_remainder: (f32, f32),
    events: VecDeque<ViewerEvent>,
    redraw: bool,
}

impl DocumentViewer {
    /// Viewer with its own buffer pool
    pub fn new(config: ViewerConfig) -> Result<Self, ViewerError> {
        config.validate()?;
        let pool = Arc::new(BufferPool::new(config.pool_config())?);
        Self::build(config, pool, None)
    }

    /// Viewer whose worker calls `waker` whenever a completion is ready
    ///
    /// The host should call [`DocumentViewer::pump`] on its control thread
    /// when woken.
    pub fn with_waker(config: ViewerConfig, waker: Waker) -> Result<Self, ViewerError> {
        config.validate()?;
        let pool = Arc::new(BufferPool::new(config.pool_config())?);
        Self::build(config, pool, Some(waker))
    }

    /// Viewer drawing buffers from an existing pool
    ///
    /// The pool's sizing replaces the tile section of `config`.
    pub fn with_shared_pool(
        mut config: ViewerConfig,
        pool: Arc<BufferPool>,
    ) -> Result<Self, ViewerError> {
        config.tiles = *pool.config();
        config.validate()?;
        Self::build(config, pool, None)
    }

    fn build(
        config: ViewerConfig,
        pool: Arc<BufferPool>,
        waker: Option<Waker>,
    ) -> Result<Self, ViewerError> {
        let worker = config.worker_config();
        let scheduler = match waker {
            Some(waker) => RenderScheduler::with_waker(pool, worker, waker)?,
            None => RenderScheduler::new(pool, worker)?,
        };

        Ok(Self {
            animator: Animator::new(config.animation.clone()),
            gestures: GestureInterpreter::new(config.gestures.clone()),
            config,
            scheduler,
            state: DocumentState::Unattached,
            viewport: Viewport::new(),
            gestures_enabled: true,
            crop: Insets::default(),
            scroll_remainder: (0.0, 0.0),
            events: VecDeque::new(),
            redraw: false,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn status(&self) -> ViewerStatus {
        match self.state {
            DocumentState::Unattached => ViewerStatus::Unattached,
            DocumentState::Loading { .. } => ViewerStatus::Loading,
            DocumentState::Opened { .. } => ViewerStatus::Opened,
            DocumentState::Attached(_) => ViewerStatus::Ready,
            DocumentState::Failed => ViewerStatus::Failed,
        }
    }

    // Document lifecycle

    /// Replace the document with `renderer`, opened on the worker
    ///
    /// Tiles of the previous document are recycled and its pending renders
    /// cancelled. [`ViewerEvent::Loaded`] or [`ViewerEvent::LoadFailed`]
    /// follows from [`DocumentViewer::pump`].
    pub fn open(&mut self, renderer: Box<dyn Renderer>) {
        self.stop_all_animations();
        self.detach();

        let document = self.scheduler.open(renderer);
        self.state = DocumentState::Loading { document };
        self.viewport.reset();
        self.scroll_remainder = (0.0, 0.0);
        self.emit(ViewerEvent::Loading);
        self.redraw = true;
    }

    /// Open an image from a path, bytes or a reader
    pub fn open_source(&mut self, source: impl Into<DocumentSource>) {
        self.open(Box::new(ImageRenderer::new(source)));
    }

    fn detach(&mut self) {
        let state = std::mem::replace(&mut self.state, DocumentState::Unattached);
        if let DocumentState::Attached(mut attached) = state {
            let mut binder = RenderBinder::new(&self.scheduler, &attached.layout, false);
            attached.tiles.recycle_all(&mut binder);
            tracing::debug!(document = attached.document.raw(), "document detached");
        }
    }

    /// Apply every completion the worker has delivered
    ///
    /// Returns the number of completions handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(completion) = self.scheduler.try_recv() {
            self.handle_completion(completion);
            handled += 1;
        }
        handled
    }

    /// Pump until nothing is loading or rendering, or `timeout` passes
    ///
    /// Returns true if the viewer went idle.
    pub fn pump_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.is_idle() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            if let Some(completion) = self.scheduler.recv_timeout(remaining) {
                self.handle_completion(completion);
            }
        }
    }

    /// True when no open or tile render is outstanding
    pub fn is_idle(&self) -> bool {
        match &self.state {
            DocumentState::Loading { .. } => false,
            DocumentState::Attached(attached) => {
                !attached.tiles.tiles().any(|tile| tile.content.is_pending())
            }
            _ => true,
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Opened { document, pages } => {
                if !matches!(self.state, DocumentState::Loading { document: d } if d == document) {
                    tracing::debug!(document = document.raw(), "ignoring stale open");
                    return;
                }
                self.emit(ViewerEvent::Loaded { pages: pages.len() });
                self.state = DocumentState::Opened { document, pages };
                self.try_attach();
            }
            Completion::OpenFailed { document, error } => {
                if !matches!(self.state, DocumentState::Loading { document: d } if d == document) {
                    return;
                }
                self.state = DocumentState::Failed;
                self.emit(ViewerEvent::LoadFailed { error });
                self.redraw = true;
            }
            Completion::Rendered(outcome) => self.deliver(outcome),
        }
    }

    fn deliver(&mut self, outcome: RenderOutcome) {
        let RenderOutcome {
            task,
            request,
            buffer,
            result,
        } = outcome;
        let pool = self.scheduler.pool();

        let tile = match &mut self.state {
            DocumentState::Attached(attached) => attached.tiles.tile_mut(request.tile),
            _ => None,
        };
        let Some(tile) = tile.filter(|tile| {
            matches!(tile.content, TileContent::Pending { task: pending } if pending == task)
        }) else {
            pool.recycle(buffer);
            return;
        };

        match result {
            Ok(()) => tile.content = TileContent::Ready(buffer),
            Err(error) => {
                tile.content = TileContent::Failed;
                pool.recycle(buffer);
                tracing::warn!(page = request.page, %error, "page render failed");
                self.events.push_back(ViewerEvent::PageRenderFailed {
                    page: request.page,
                    error,
                });
            }
        }
        self.redraw = true;
    }

    /// Lay the opened document out once the view has a size
    fn try_attach(&mut self) {
        let view = self.viewport.view_size();
        if view.is_empty() {
            return;
        }
        let (document, pages) =
            match std::mem::replace(&mut self.state, DocumentState::Unattached) {
                DocumentState::Opened { document, pages } => (document, pages),
                other => {
                    self.state = other;
                    return;
                }
            };

        let mut layout = DocumentLayout::new(pages, self.tile_size());
        if let Err(error) = layout.check_crop(self.crop) {
            tracing::warn!(%error, "resetting crop");
            self.crop = Insets::default();
        }
        let limits = self.scale_limits_for(&layout, self.crop);
        if let Err(error) = layout.update(limits.initial, limits.page_margin, self.crop) {
            tracing::warn!(%error, "crop reset during layout");
            self.crop = Insets::default();
        }

        self.viewport.set_scale(1.0);
        self.viewport.set_zooming(false);
        self.viewport.set_document_size(layout.document_size());
        let bounds = self.viewport.bounds();
        self.viewport.move_to(bounds.min_x, bounds.min_y);

        tracing::info!(
            document = document.raw(),
            pages = layout.page_count(),
            scale = limits.initial,
            "document attached"
        );
        self.state = DocumentState::Attached(Box::new(Attached {
            document,
            layout,
            tiles: TileManager::new(),
            limits,
        }));
        self.refresh(false);
    }

    fn tile_size(&self) -> Size {
        let tiles = &self.config.tiles;
        Size::new(tiles.tile_width as i32, tiles.tile_height as i32)
    }

    fn scale_limits_for(&self, layout: &DocumentLayout, crop: Insets) -> ScaleLimits {
        let pages: Vec<Size> = layout
            .original_sizes()
            .iter()
            .map(|size| crop.shrink(*size))
            .collect();
        self.config
            .layout
            .scale_policy
            .limits(self.viewport.view_size(), &pages)
    }

    /// Recycle tiles that left the window and populate new ones
    fn refresh(&mut self, recycle_all: bool) {
        let DocumentState::Attached(attached) = &mut self.state else {
            return;
        };
        let window = self.viewport.window(attached.layout.tile_size());
        let mut binder =
            RenderBinder::new(&self.scheduler, &attached.layout, self.viewport.is_zooming());

        if recycle_all {
            attached.tiles.recycle_all(&mut binder);
        } else {
            attached.tiles.recycle(&window, &mut binder);
        }
        if let Err(error) = attached.tiles.populate(&attached.layout, &window, &mut binder) {
            tracing::error!(%error, "tile population aborted");
            self.events.push_back(ViewerEvent::FrameAborted { error });
        }
        self.redraw = true;
    }

    // Host surface

    /// Set the view size in pixels
    pub fn resize(&mut self, width: i32, height: i32) {
        let view = Size::new(width.max(0), height.max(0));
        if view == self.viewport.view_size() {
            return;
        }
        self.viewport.set_view_size(view);
        self.redraw = true;
        if view.is_empty() {
            return;
        }

        match self.state {
            DocumentState::Opened { .. } => self.try_attach(),
            DocumentState::Attached(_) => self.update_limits(),
            _ => {}
        }
    }

    /// Recompute scale limits and the page margin for the current view
    fn update_limits(&mut self) {
        let DocumentState::Attached(attached) = &self.state else {
            return;
        };
        let limits = self.scale_limits_for(&attached.layout, self.crop);
        let margin_changed = limits.page_margin != attached.layout.margin();

        if let DocumentState::Attached(attached) = &mut self.state {
            attached.limits = limits;
            if margin_changed {
                let raw = attached.layout.raw_scale();
                if let Err(error) = attached.layout.update(raw, limits.page_margin, self.crop) {
                    tracing::warn!(%error, "crop reset during relayout");
                    self.crop = Insets::default();
                }
            }
            self.viewport
                .set_document_size(attached.layout.document_size());
        }
        self.clamp_offset();
        self.refresh(margin_changed);
    }

    /// Move back inside the bounds after they changed
    fn clamp_offset(&mut self) {
        let (x, y) = self.viewport.offset();
        if let Some((dx, dy)) = self.viewport.move_to(x, y) {
            self.emit(ViewerEvent::Scrolled { dx, dy });
        }
    }

    /// Feed a pointer event
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if !self.gestures_enabled {
            return;
        }
        for intent in self.gestures.handle(event) {
            self.apply_intent(intent);
        }
    }

    pub fn set_gestures_enabled(&mut self, enabled: bool) {
        self.gestures_enabled = enabled;
    }

    pub fn gestures_enabled(&self) -> bool {
        self.gestures_enabled
    }

    /// Advance animations and delayed taps to `now`
    ///
    /// Returns true while an animation is still running, so the host keeps
    /// ticking.
    pub fn tick(&mut self, now: Duration) -> bool {
        for intent in self.gestures.poll(now) {
            self.apply_intent(intent);
        }

        for step in self.animator.advance(now) {
            match step {
                AnimationStep::Move { x, y } => {
                    self.move_to(x, y);
                }
                AnimationStep::MoveFinished => self.set_scroll_state(ScrollState::Idle),
                AnimationStep::Zoom { scale, px, py } => {
                    self.zoom_to(scale, px, py);
                }
                AnimationStep::ZoomFinished => self.zoom_end(),
            }
        }
        self.animator.is_running()
    }

    fn apply_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Down => self.stop_all_animations(),
            Intent::Press { x, y } => {
                let (x, y) = self.view_to_document(x, y);
                self.emit(ViewerEvent::Pressed { x, y });
            }
            Intent::CancelPress => self.emit(ViewerEvent::PressCancelled),
            Intent::ScrollBegin => {
                self.scroll_remainder = (0.0, 0.0);
                self.set_scroll_state(ScrollState::Dragging);
            }
            Intent::Scroll { dx, dy } => {
                let (rx, ry) = self.scroll_remainder;
                let (dx, dy) = (dx + rx, dy + ry);
                let (ix, iy) = (dx.trunc(), dy.trunc());
                self.scroll_remainder = (dx - ix, dy - iy);
                self.move_by(ix as i32, iy as i32);
            }
            Intent::ScrollEnd => self.set_scroll_state(ScrollState::Idle),
            Intent::Fling { vx, vy } => {
                self.fling(vx, vy);
            }
            Intent::DoubleTap { x, y } => self.double_tap_zoom(x, y),
            Intent::ZoomBegin => self.zoom_start(),
            Intent::Zoom { factor, px, py } => {
                self.zoom_by(factor, px, py);
            }
            Intent::ZoomEnd => self.zoom_end(),
            Intent::Click { x, y } => {
                let (x, y) = self.view_to_document(x, y);
                self.emit(ViewerEvent::Clicked { x, y });
            }
        }
    }

    fn double_tap_zoom(&mut self, px: f32, py: f32) {
        let Some(limits) = self.relative_limits() else {
            return;
        };
        let target = if (self.viewport.scale() - limits.mid).abs() < SCALE_EPSILON {
            limits.min
        } else {
            limits.mid
        };
        self.animate_zoom(target, px, py);
    }

    /// Take the pending redraw request
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    pub fn poll_event(&mut self) -> Option<ViewerEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    fn emit(&mut self, event: ViewerEvent) {
        self.events.push_back(event);
    }

    fn set_scroll_state(&mut self, state: ScrollState) {
        if self.viewport.set_scroll_state(state) {
            self.emit(ViewerEvent::ScrollStateChanged(state));
        }
    }

    /// Describe the current frame
    pub fn draw_list(&self) -> DrawList<'_> {
        let view = self.viewport.view_size();
        let mut list = DrawList::new(view);
        let DocumentState::Attached(attached) = &self.state else {
            return list;
        };

        let scale = self.viewport.scale();
        let (x, y) = self.viewport.offset();
        let to_view = |bounds: Rect| bounds.scale(scale).offset(-x, -y);

        if let (Some(first), Some(last)) = (self.first_visible_page(), self.last_visible_page()) {
            for page in first..=last {
                if let Some(bounds) = attached.layout.page_bounds(page) {
                    list.push(DrawItem::PageBackground {
                        page,
                        dst: to_view(bounds),
                    });
                }
            }
        }

        let thumbnail_scale = self.scheduler.pool().thumbnail_scale();
        for tile in attached.tiles.tiles() {
            let Some(page) = attached.layout.page_of(tile.key.row) else {
                continue;
            };
            let dst = to_view(tile.bounds);
            let size = tile.bounds.size();

            let item = match &tile.content {
                TileContent::Ready(buffer) => {
                    let src = match buffer.class() {
                        BufferClass::Full => Rect::new(0, 0, size.width, size.height),
                        BufferClass::Thumbnail => Rect::new(
                            0,
                            0,
                            (size.width as f32 * thumbnail_scale) as i32,
                            (size.height as f32 * thumbnail_scale) as i32,
                        ),
                    };
                    if src.is_empty() {
                        continue;
                    }
                    DrawItem::Tile {
                        key: tile.key,
                        page,
                        dst,
                        src,
                        buffer,
                    }
                }
                _ => DrawItem::Placeholder {
                    key: tile.key,
                    page,
                    dst,
                },
            };
            list.push(item);
        }
        list
    }

    // Viewport

    /// Scroll offset in scaled document pixels
    pub fn offset(&self) -> (i32, i32) {
        self.viewport.offset()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Move to (`x`, `y`), clamped
    ///
    /// Returns false if the offset did not change; nothing is repopulated
    /// or redrawn in that case.
    pub fn move_to(&mut self, x: i32, y: i32) -> bool {
        let Some((dx, dy)) = self.viewport.move_to(x, y) else {
            return false;
        };
        self.emit(ViewerEvent::Scrolled { dx, dy });
        self.refresh(false);
        true
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) -> bool {
        let (x, y) = self.viewport.offset();
        self.move_to(x.saturating_add(dx), y.saturating_add(dy))
    }

    /// Animate to (`x`, `y`), clamped
    pub fn smooth_move_to(&mut self, x: i32, y: i32) {
        self.stop_fling_and_move();
        let target = self.viewport.bounds().clamp(x, y);
        if self.animator.start_move(self.viewport.offset(), target) {
            self.set_scroll_state(ScrollState::Flinging);
        }
    }

    /// Fling with a pointer velocity in pixels per second
    pub fn fling(&mut self, vx: f32, vy: f32) -> bool {
        self.stop_fling_and_move();
        let (x, y) = self.viewport.offset();
        if self.animator.start_fling(x, y, vx, vy, self.viewport.bounds()) {
            self.set_scroll_state(ScrollState::Flinging);
            true
        } else {
            self.set_scroll_state(ScrollState::Idle);
            false
        }
    }

    fn stop_fling_and_move(&mut self) {
        let stopped = self.animator.stop_fling() | self.animator.stop_move();
        if stopped && self.viewport.scroll_state() == ScrollState::Flinging {
            self.set_scroll_state(ScrollState::Idle);
        }
    }

    /// Stop every animation; a running zoom animation ends the zoom
    pub fn stop_all_animations(&mut self) {
        self.stop_fling_and_move();
        if self.animator.stop_zoom() {
            self.zoom_end();
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_running()
    }

    /// Interactive scale, 1.0 outside a zoom
    pub fn scale(&self) -> f32 {
        self.viewport.scale()
    }

    /// Committed layout scale
    pub fn raw_scale(&self) -> f32 {
        match &self.state {
            DocumentState::Attached(attached) => attached.layout.raw_scale(),
            _ => 1.0,
        }
    }

    /// Absolute scale limits for the current view
    pub fn scale_limits(&self) -> Option<ScaleLimits> {
        match &self.state {
            DocumentState::Attached(attached) => Some(attached.limits),
            _ => None,
        }
    }

    /// Limits relative to the raw scale, the space of the interactive scale
    fn relative_limits(&self) -> Option<ScaleLimits> {
        let DocumentState::Attached(attached) = &self.state else {
            return None;
        };
        let raw = attached.layout.raw_scale();
        let limits = attached.limits;
        Some(ScaleLimits {
            initial: limits.initial / raw,
            min: limits.min / raw,
            mid: limits.mid / raw,
            max: limits.max / raw,
            page_margin: limits.page_margin,
        })
    }

    /// Set the interactive scale, keeping view point (`px`, `py`) fixed
    ///
    /// The scale is clamped to the limits. Returns false if it did not
    /// change.
    pub fn zoom_to(&mut self, scale: f32, px: f32, py: f32) -> bool {
        let Some(limits) = self.relative_limits() else {
            return false;
        };
        let target = limits.clamp(scale);
        let current = self.viewport.scale();
        if target == current {
            return false;
        }

        let delta = target / current;
        let (x, y) = self.viewport.offset();
        let nx = x as f32 * delta - px + px * delta;
        let ny = y as f32 * delta - py + py * delta;

        // Tiles bound from here on render as thumbnails
        self.viewport.set_zooming(true);
        self.viewport.set_scale(target);
        if !self.move_to(nx as i32, ny as i32) {
            self.refresh(false);
        }
        self.emit(ViewerEvent::Zoomed { delta, px, py });
        true
    }

    /// Multiply the interactive scale by `factor`
    pub fn zoom_by(&mut self, factor: f32, px: f32, py: f32) -> bool {
        if (factor - 1.0).abs() < MIN_ZOOM_DELTA {
            return false;
        }
        self.zoom_to(self.viewport.scale() * factor, px, py)
    }

    pub fn zoom_start(&mut self) {
        self.emit(ViewerEvent::ZoomStarted);
    }

    /// Fold the interactive scale into the raw scale and rebuild every tile
    pub fn zoom_end(&mut self) {
        if !self.viewport.is_zooming() {
            self.emit(ViewerEvent::ZoomEnded);
            return;
        }

        let scale = self.viewport.scale();
        if let DocumentState::Attached(attached) = &mut self.state {
            let raw = attached.layout.raw_scale() * scale;
            attached.layout.set_raw_scale(raw);
            self.viewport.set_scale(1.0);
            self.viewport
                .set_document_size(attached.layout.document_size());
            tracing::debug!(raw, "zoom committed");
        }
        self.viewport.set_zooming(false);
        self.clamp_offset();
        self.refresh(true);
        self.emit(ViewerEvent::ZoomEnded);
    }

    /// Animate the interactive scale to `scale` around (`px`, `py`)
    pub fn animate_zoom(&mut self, scale: f32, px: f32, py: f32) {
        let Some(limits) = self.relative_limits() else {
            return;
        };
        self.stop_all_animations();
        self.zoom_start();
        self.animator
            .start_zoom(self.viewport.scale(), limits.clamp(scale), px, py);
    }

    /// Map a view point to scaled document coordinates
    pub fn view_to_document(&self, x: f32, y: f32) -> (f32, f32) {
        self.viewport.view_to_document(x, y)
    }

    pub fn can_scroll_horizontally(&self, direction: i32) -> bool {
        self.viewport.can_scroll_horizontally(direction)
    }

    pub fn can_scroll_vertically(&self, direction: i32) -> bool {
        self.viewport.can_scroll_vertically(direction)
    }

    // Pages

    pub fn page_count(&self) -> usize {
        match &self.state {
            DocumentState::Opened { pages, .. } => pages.len(),
            DocumentState::Attached(attached) => attached.layout.page_count(),
            _ => 0,
        }
    }

    pub fn layout(&self) -> Option<&DocumentLayout> {
        match &self.state {
            DocumentState::Attached(attached) => Some(&attached.layout),
            _ => None,
        }
    }

    pub fn first_visible_row(&self) -> Option<i32> {
        match &self.state {
            DocumentState::Attached(attached) => attached.tiles.first_visible_row(),
            _ => None,
        }
    }

    pub fn last_visible_row(&self) -> Option<i32> {
        match &self.state {
            DocumentState::Attached(attached) => attached.tiles.last_visible_row(),
            _ => None,
        }
    }

    pub fn first_visible_page(&self) -> Option<usize> {
        let layout = self.layout()?;
        layout.page_of(self.first_visible_row()?)
    }

    pub fn last_visible_page(&self) -> Option<usize> {
        let layout = self.layout()?;
        layout.page_of(self.last_visible_row()?)
    }

    /// Scroll so `page` starts `offset` pixels below the top margin
    pub fn scroll_to_page(
        &mut self,
        page: usize,
        offset: i32,
        smooth: bool,
    ) -> Result<(), ViewerError> {
        let layout = self.layout().ok_or(ViewerError::NotAttached)?;
        let count = layout.page_count();
        let top = layout
            .top_of(page)
            .ok_or(ViewerError::PageOutOfRange { page, count })?;
        let margin = layout.current_margin();

        let y = ((top + offset) as f32 - margin) * self.viewport.scale();
        let (x, _) = self.viewport.offset();

        self.stop_all_animations();
        if smooth {
            self.smooth_move_to(x, y as i32);
        } else {
            self.move_to(x, y as i32);
        }
        Ok(())
    }

    // Crop and invalidation

    pub fn crop(&self) -> Insets {
        self.crop
    }

    /// Inset every page by `crop`, in original page units
    ///
    /// Before a document is laid out the crop is only stored. A crop that
    /// would remove a whole page dimension resets the crop to empty and
    /// returns [`LayoutError::InvalidCrop`].
    pub fn set_crop(&mut self, crop: Insets) -> Result<(), ViewerError> {
        let DocumentState::Attached(attached) = &self.state else {
            self.crop = crop;
            return Ok(());
        };

        let checked = attached.layout.check_crop(crop);
        self.crop = if checked.is_ok() { crop } else { Insets::default() };
        let limits = self.scale_limits_for(&attached.layout, self.crop);

        if let DocumentState::Attached(attached) = &mut self.state {
            attached.limits = limits;
            let raw = attached.layout.raw_scale();
            if let Err(error) = attached.layout.update(raw, limits.page_margin, self.crop) {
                tracing::warn!(%error, "crop reset during relayout");
                self.crop = Insets::default();
            }
            self.viewport
                .set_document_size(attached.layout.document_size());
        }
        self.clamp_offset();
        self.refresh(true);
        checked.map_err(ViewerError::from)
    }

    /// Render every live tile again in place
    pub fn invalidate_visible(&mut self) {
        let DocumentState::Attached(attached) = &mut self.state else {
            return;
        };
        let mut binder =
            RenderBinder::new(&self.scheduler, &attached.layout, self.viewport.is_zooming());
        attached.tiles.rebind(&mut binder);
        self.redraw = true;
    }

    /// Drop every tile and populate from scratch
    pub fn invalidate_all(&mut self) {
        self.refresh(true);
    }

    // Statistics

    pub fn pool_stats(&self) -> PoolStats {
        self.scheduler.pool().stats()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Number of live tiles
    pub fn tile_count(&self) -> usize {
        match &self.state {
            DocumentState::Attached(attached) => attached.tiles.len(),
            _ => 0,
        }
    }
}

impl Drop for DocumentViewer {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::PointerKind;
    use docview_render::PatternRenderer;

    const WAIT: Duration = Duration::from_secs(10);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Two 1000x2000 / 1000x1500 pages in an 1048x800 view, fit width at 1.0
    fn viewer() -> DocumentViewer {
        let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
        viewer.resize(1048, 800);
        viewer.open(Box::new(PatternRenderer::new(vec![
            Size::new(1000, 2000),
            Size::new(1000, 1500),
        ])));
        assert!(viewer.pump_until_idle(WAIT));
        viewer.drain_events();
        viewer
    }

    fn visible_keys(viewer: &DocumentViewer) -> Vec<(i32, i32)> {
        let DocumentState::Attached(attached) = &viewer.state else {
            return Vec::new();
        };
        attached
            .tiles
            .tiles()
            .map(|tile| (tile.key.row, tile.key.col))
            .collect()
    }

    #[test]
    fn test_open_lays_out_at_fit_width() {
        let viewer = viewer();
        assert_eq!(viewer.status(), ViewerStatus::Ready);
        assert_eq!(viewer.page_count(), 2);
        assert_eq!(viewer.raw_scale(), 1.0);
        let layout = viewer.layout().unwrap();
        assert_eq!(layout.margin(), 24);
        assert_eq!(layout.document_size(), Size::new(1048, 3572));
        assert_eq!(viewer.first_visible_page(), Some(0));
        assert!(viewer.is_idle());
    }

    #[test]
    fn test_open_waits_for_view_size() {
        let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
        viewer.open(Box::new(PatternRenderer::uniform(1, Size::new(500, 500))));
        assert!(viewer.pump_until_idle(WAIT));
        assert_eq!(viewer.status(), ViewerStatus::Opened);
        assert_eq!(viewer.page_count(), 1);

        viewer.resize(600, 400);
        assert_eq!(viewer.status(), ViewerStatus::Ready);
        assert!(viewer.tile_count() > 0);
    }

    #[test]
    fn test_open_failure_is_reported_once() {
        let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
        viewer.resize(100, 100);
        viewer.open(Box::new(
            PatternRenderer::uniform(1, Size::new(10, 10)).with_open_error("corrupt"),
        ));
        assert!(viewer.pump_until_idle(WAIT));
        assert_eq!(viewer.status(), ViewerStatus::Failed);

        let events = viewer.drain_events();
        assert!(matches!(events[0], ViewerEvent::Loading));
        let failures = events
            .iter()
            .filter(|event| matches!(event, ViewerEvent::LoadFailed { .. }))
            .count();
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_move_repopulates_and_redundant_move_is_noop() {
        let mut viewer = viewer();
        viewer.take_redraw_request();

        assert!(viewer.move_to(0, 1000));
        assert!(viewer.take_redraw_request());
        assert!(matches!(
            viewer.poll_event(),
            Some(ViewerEvent::Scrolled { dx: 0, dy: 1000 })
        ));
        assert!(visible_keys(&viewer).iter().all(|(row, _)| *row >= 1));

        assert!(!viewer.move_to(0, 1000));
        assert!(!viewer.take_redraw_request());
        assert!(viewer.poll_event().is_none());
    }

    #[test]
    fn test_tiles_render_and_draw() {
        let viewer = viewer();
        let list = viewer.draw_list();
        assert!(list.ready_tiles() > 0);
        assert_eq!(list.placeholders(), 0);
        assert!(matches!(
            list.items()[0],
            DrawItem::PageBackground { page: 0, .. }
        ));
        for item in list.iter() {
            if let DrawItem::Tile { src, dst, .. } = item {
                assert_eq!(src.size(), dst.size());
            }
        }
    }

    #[test]
    fn test_zoom_pivot_and_commit() {
        let mut viewer = viewer();
        viewer.move_to(0, 400);
        viewer.drain_events();

        viewer.zoom_start();
        assert!(viewer.zoom_to(2.0, 100.0, 200.0));
        assert_eq!(viewer.scale(), 2.0);
        // (400 + 200) * 2 - 200
        assert_eq!(viewer.offset(), (100, 1000));
        assert!(!viewer.zoom_to(2.0, 100.0, 200.0));

        viewer.zoom_end();
        assert_eq!(viewer.scale(), 1.0);
        assert_eq!(viewer.raw_scale(), 2.0);
        assert_eq!(viewer.offset(), (100, 1000));
        assert!(viewer.pump_until_idle(WAIT));
        assert_eq!(viewer.draw_list().placeholders(), 0);

        let events = viewer.drain_events();
        assert!(matches!(events.last(), Some(ViewerEvent::ZoomEnded)));
    }

    #[test]
    fn test_zoom_is_clamped_to_limits() {
        let mut viewer = viewer();
        let limits = viewer.scale_limits().unwrap();
        assert!(viewer.zoom_to(100.0, 0.0, 0.0));
        assert_eq!(viewer.scale(), limits.max);
        assert!(!viewer.zoom_by(1.0005, 0.0, 0.0));
    }

    #[test]
    fn test_tiles_bound_while_zooming_use_thumbnails() {
        let mut viewer = viewer();
        viewer.zoom_to(0.5, 0.0, 0.0);
        assert!(viewer.pump_until_idle(WAIT));
        let thumbnails = viewer
            .draw_list()
            .iter()
            .filter(|item| {
                matches!(item, DrawItem::Tile { buffer, .. } if buffer.class() == BufferClass::Thumbnail)
            })
            .count();
        assert!(thumbnails > 0);
        viewer.zoom_end();
        assert_eq!(viewer.raw_scale(), 0.5);
    }

    #[test]
    fn test_drag_scrolls_document() {
        let mut viewer = viewer();
        viewer.handle_pointer(PointerEvent::down(500.0, 500.0, ms(0)));
        viewer.handle_pointer(PointerEvent::moved(500.0, 400.0, ms(10)));
        viewer.handle_pointer(PointerEvent::moved(500.0, 300.0, ms(400)));
        assert_eq!(viewer.offset(), (0, 192));
        assert_eq!(viewer.viewport().scroll_state(), ScrollState::Dragging);

        viewer.handle_pointer(PointerEvent::up(500.0, 300.0, ms(500)));
        assert_eq!(viewer.viewport().scroll_state(), ScrollState::Idle);

        let events = viewer.drain_events();
        assert!(matches!(events[0], ViewerEvent::Pressed { x, y } if x == 500.0 && y == 500.0));
        assert!(events
            .iter()
            .any(|event| matches!(event, ViewerEvent::PressCancelled)));
    }

    #[test]
    fn test_fling_runs_until_stopped() {
        let mut viewer = viewer();
        assert!(viewer.fling(0.0, -3000.0));
        assert_eq!(viewer.viewport().scroll_state(), ScrollState::Flinging);

        let mut now = 0;
        while viewer.tick(ms(now)) {
            now += 16;
            assert!(now < 10_000, "fling never ended");
        }
        assert!(viewer.offset().1 > 0);
        assert_eq!(viewer.viewport().scroll_state(), ScrollState::Idle);
    }

    #[test]
    fn test_pointer_down_stops_fling() {
        let mut viewer = viewer();
        viewer.fling(0.0, -3000.0);
        viewer.tick(ms(0));
        viewer.tick(ms(16));
        viewer.handle_pointer(PointerEvent::down(10.0, 10.0, ms(20)));
        assert!(!viewer.is_animating());
        assert_eq!(viewer.viewport().scroll_state(), ScrollState::Idle);
    }

    #[test]
    fn test_double_tap_zooms_to_mid_then_back_to_min() {
        let mut viewer = viewer();
        let limits = viewer.scale_limits().unwrap();
        assert!(limits.min < limits.mid);

        // Fit width is the mid scale here, so the first double tap zooms out
        viewer.handle_pointer(PointerEvent::down(100.0, 100.0, ms(0)));
        viewer.handle_pointer(PointerEvent::up(100.0, 100.0, ms(20)));
        viewer.handle_pointer(PointerEvent::down(100.0, 100.0, ms(100)));
        viewer.handle_pointer(PointerEvent::up(100.0, 100.0, ms(120)));
        let mut now = 120;
        while viewer.tick(ms(now)) {
            now += 16;
        }
        assert_eq!(viewer.raw_scale(), limits.min);

        viewer.handle_pointer(PointerEvent::down(100.0, 100.0, ms(now + 1000)));
        viewer.handle_pointer(PointerEvent::up(100.0, 100.0, ms(now + 1020)));
        viewer.handle_pointer(PointerEvent::down(100.0, 100.0, ms(now + 1100)));
        viewer.handle_pointer(PointerEvent::up(100.0, 100.0, ms(now + 1120)));
        let mut later = now + 1120;
        while viewer.tick(ms(later)) {
            later += 16;
        }
        assert!((viewer.raw_scale() - limits.mid).abs() < 1e-4);
    }

    #[test]
    fn test_click_reported_in_document_coordinates() {
        let mut viewer = viewer();
        viewer.move_to(0, 300);
        viewer.drain_events();
        viewer.handle_pointer(PointerEvent::down(10.0, 20.0, ms(0)));
        viewer.handle_pointer(PointerEvent::up(10.0, 20.0, ms(30)));
        viewer.tick(ms(400));

        let events = viewer.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, ViewerEvent::Clicked { x, y } if *x == 10.0 && *y == 320.0)));
    }

    #[test]
    fn test_pinch_zoom_commits_on_release() {
        let mut viewer = viewer();
        viewer.handle_pointer(PointerEvent::down(400.0, 400.0, ms(0)));
        viewer.handle_pointer(PointerEvent::new(
            PointerKind::PointerDown,
            1,
            600.0,
            400.0,
            ms(10),
        ));
        viewer.handle_pointer(PointerEvent::new(PointerKind::Move, 1, 800.0, 400.0, ms(20)));
        assert!(viewer.viewport().is_zooming());
        viewer.handle_pointer(PointerEvent::new(
            PointerKind::PointerUp,
            1,
            800.0,
            400.0,
            ms(30),
        ));
        assert!(!viewer.viewport().is_zooming());
        assert!(viewer.raw_scale() > 1.0);
    }

    #[test]
    fn test_gestures_can_be_disabled() {
        let mut viewer = viewer();
        viewer.set_gestures_enabled(false);
        viewer.handle_pointer(PointerEvent::down(500.0, 500.0, ms(0)));
        viewer.handle_pointer(PointerEvent::moved(500.0, 100.0, ms(10)));
        assert_eq!(viewer.offset(), (0, 0));
        assert!(viewer.poll_event().is_none());
    }

    #[test]
    fn test_scroll_to_page() {
        let mut viewer = viewer();
        viewer.scroll_to_page(1, 0, false).unwrap();
        // Page 1 top is 2048, shown below one margin
        assert_eq!(viewer.offset(), (0, 2024));
        assert_eq!(viewer.first_visible_page(), Some(0));
        assert_eq!(viewer.last_visible_page(), Some(1));

        assert!(matches!(
            viewer.scroll_to_page(5, 0, false),
            Err(ViewerError::PageOutOfRange { page: 5, count: 2 })
        ));
    }

    #[test]
    fn test_smooth_scroll_to_page() {
        let mut viewer = viewer();
        viewer.scroll_to_page(1, 0, true).unwrap();
        assert_eq!(viewer.offset(), (0, 0));
        let mut now = 0;
        while viewer.tick(ms(now)) {
            now += 16;
        }
        assert_eq!(viewer.offset(), (0, 2024));
    }

    #[test]
    fn test_crop_relayouts_document() {
        let mut viewer = viewer();
        viewer
            .set_crop(Insets::new(100, 100, 100, 100))
            .unwrap();
        assert_eq!(viewer.crop(), Insets::new(100, 100, 100, 100));
        // Fit width recomputed for 800 wide content
        assert_eq!(viewer.scale_limits().unwrap().initial, 1000.0 / 800.0);
        assert!(viewer.pump_until_idle(WAIT));

        let error = viewer.set_crop(Insets::new(600, 0, 600, 0)).unwrap_err();
        assert!(matches!(error, ViewerError::Layout(LayoutError::InvalidCrop { .. })));
        assert_eq!(viewer.crop(), Insets::default());
    }

    #[test]
    fn test_crop_before_open_is_applied_on_attach() {
        let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
        viewer.set_crop(Insets::new(10, 20, 30, 40)).unwrap();
        viewer.resize(500, 500);
        viewer.open(Box::new(PatternRenderer::uniform(1, Size::new(400, 400))));
        assert!(viewer.pump_until_idle(WAIT));
        assert_eq!(viewer.layout().unwrap().crop(), Insets::new(10, 20, 30, 40));
    }

    #[test]
    fn test_invalid_crop_before_open_is_reset_on_attach() {
        let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
        viewer.set_crop(Insets::new(300, 0, 300, 0)).unwrap();
        viewer.resize(500, 500);
        viewer.open(Box::new(PatternRenderer::uniform(1, Size::new(400, 400))));
        assert!(viewer.pump_until_idle(WAIT));
        assert_eq!(viewer.crop(), Insets::default());
        assert_eq!(viewer.layout().unwrap().crop(), Insets::default());
        assert!(viewer.tile_count() > 0);
    }

    #[test]
    fn test_page_render_failure_is_isolated() {
        let mut viewer = DocumentViewer::new(ViewerConfig::default()).unwrap();
        viewer.resize(1048, 5000);
        viewer.open(Box::new(
            PatternRenderer::new(vec![Size::new(1000, 1000), Size::new(1000, 1000)])
                .with_failing_page(0),
        ));
        assert!(viewer.pump_until_idle(WAIT));

        let events = viewer.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, ViewerEvent::PageRenderFailed { page: 0, .. })));
        let list = viewer.draw_list();
        assert!(list
            .iter()
            .any(|item| matches!(item, DrawItem::Tile { page: 1, .. })));
        assert!(list
            .iter()
            .any(|item| matches!(item, DrawItem::Placeholder { page: 0, .. })));
    }

    #[test]
    fn test_invalidate() {
        let mut viewer = viewer();
        let before = viewer.scheduler_stats().tasks_submitted;
        let tiles = viewer.tile_count() as u64;

        viewer.invalidate_visible();
        assert_eq!(viewer.scheduler_stats().tasks_submitted, before + tiles);
        assert!(viewer.pump_until_idle(WAIT));

        viewer.invalidate_all();
        assert_eq!(viewer.scheduler_stats().tasks_submitted, before + 2 * tiles);
        assert!(viewer.pump_until_idle(WAIT));
    }

    fn settle(viewer: &mut DocumentViewer) {
        assert!(viewer.pump_until_idle(WAIT));
        let deadline = Instant::now() + WAIT;
        while viewer.scheduler_stats().live_tasks > 0 {
            assert!(Instant::now() < deadline, "cancelled tasks never drained");
            std::thread::sleep(ms(1));
            viewer.pump();
        }
    }

    fn outstanding(viewer: &DocumentViewer) -> usize {
        let stats = viewer.pool_stats();
        stats.outstanding(BufferClass::Full) + stats.outstanding(BufferClass::Thumbnail)
    }

    #[test]
    fn test_broken_layout_aborts_frame_and_keeps_pool_consistent() {
        let mut viewer = viewer();
        let DocumentState::Attached(attached) = &mut viewer.state else {
            panic!("viewer should be attached");
        };
        attached.layout.collapse_last_column(0);

        viewer.invalidate_all();
        let aborted: Vec<_> = viewer
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                ViewerEvent::FrameAborted { error } => Some(error),
                _ => None,
            })
            .collect();
        assert_eq!(aborted, vec![TileError::EmptyBounds { row: 1, col: 3 }]);

        // Row 0 kept its seed tile; the unfinished row 1 was recycled
        assert_eq!(visible_keys(&viewer), vec![(0, 0)]);
        settle(&mut viewer);
        assert_eq!(outstanding(&viewer), viewer.tile_count());

        // A relayout restores the geometry and the next frame completes
        viewer.set_crop(Insets::default()).unwrap();
        settle(&mut viewer);
        assert!(!viewer
            .drain_events()
            .iter()
            .any(|event| matches!(event, ViewerEvent::FrameAborted { .. })));
        assert!(visible_keys(&viewer).contains(&(1, 3)));
        assert_eq!(outstanding(&viewer), viewer.tile_count());
    }

    #[test]
    fn test_resize_keeps_offset_in_bounds() {
        let mut viewer = viewer();
        viewer.move_to(0, 2772);
        viewer.resize(1048, 1600);
        let bounds = viewer.viewport().bounds();
        assert_eq!(viewer.offset().1, bounds.max_y);
        assert!(viewer.pump_until_idle(WAIT));
    }

    #[test]
    fn test_reopen_recycles_previous_tiles() {
        let mut viewer = viewer();
        viewer.open(Box::new(PatternRenderer::uniform(3, Size::new(800, 800))));
        assert_eq!(viewer.tile_count(), 0);
        assert!(viewer.pump_until_idle(WAIT));
        assert_eq!(viewer.page_count(), 3);

        let live = viewer.tile_count();
        let stats = viewer.pool_stats();
        assert_eq!(stats.outstanding(BufferClass::Full), live);
    }

    #[test]
    fn test_can_scroll() {
        let mut viewer = viewer();
        assert!(!viewer.can_scroll_vertically(-1));
        assert!(viewer.can_scroll_vertically(1));
        assert!(!viewer.can_scroll_horizontally(1));
        viewer.move_to(0, 5000);
        assert!(!viewer.can_scroll_vertically(1));
    }
}
