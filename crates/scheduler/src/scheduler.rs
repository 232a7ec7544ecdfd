//! Render scheduler implementation
//!
//! The control thread submits render requests together with the buffer to
//! render into. A single worker thread executes them in FIFO order against
//! the attached [`Renderer`], and hands every buffer back through a
//! completion channel that the control thread drains.

use crate::job::{CancelOutcome, Completion, DocumentId, Job, RenderOutcome, RenderRequest};
use crate::task::{TaskArena, TaskId, TaskState};
use crate::worker::{RenderWorker, WorkerConfig};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use docview_cache::BufferPool;
use docview_render::{PixelBuffer, Renderer};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Callback run on the worker thread after a completion is sent
///
/// Hosts use it to schedule a `pump` on their control thread.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Render scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total render tasks submitted
    pub tasks_submitted: u64,

    /// Render results accepted by the control thread
    pub tasks_completed: u64,

    /// Tasks removed from the queue before running
    pub tasks_cancelled: u64,

    /// Tasks whose result was thrown away after running
    pub tasks_discarded: u64,

    /// Renders that returned an error
    pub render_failures: u64,

    /// Current queue size
    pub queue_size: usize,

    /// Task slots currently in use
    pub live_tasks: usize,
}

impl SchedulerStats {
    /// Get the number of tasks not yet resolved
    pub fn pending_tasks(&self) -> u64 {
        self.tasks_submitted - self.tasks_completed - self.tasks_cancelled - self.tasks_discarded
    }
}

/// Failure to start the scheduler
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub(crate) struct State {
    pub(crate) queue: VecDeque<Job>,
    pub(crate) tasks: TaskArena,
    pub(crate) stats: SchedulerStats,
    pub(crate) shutdown: bool,
}

/// State shared between the control thread and the worker
pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) available: Condvar,
    pub(crate) pool: Arc<BufferPool>,
    pub(crate) completions: Sender<Completion>,
    pub(crate) waker: Option<Waker>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn send(&self, completion: Completion) {
        if self.completions.send(completion).is_err() {
            tracing::debug!("completion receiver gone");
        }
    }

    pub(crate) fn wake(&self) {
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

/// Single-worker FIFO render scheduler
///
/// # Example
///
/// ```
/// use docview_cache::{BufferPool, PoolConfig};
/// use docview_render::{PatternRenderer, Rect, Size};
/// use docview_scheduler::{Completion, RenderRequest, RenderScheduler, TileKey, WorkerConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let pool = Arc::new(BufferPool::new(PoolConfig::new(64)).unwrap());
/// let mut scheduler = RenderScheduler::new(pool.clone(), WorkerConfig::default()).unwrap();
///
/// scheduler.open(Box::new(PatternRenderer::uniform(1, Size::new(200, 200))));
/// assert!(matches!(
///     scheduler.recv_timeout(Duration::from_secs(5)),
///     Some(Completion::Opened { .. })
/// ));
///
/// let request = RenderRequest {
///     tile: TileKey::new(0, 0),
///     page: 0,
///     scale: 1.0,
///     region: Rect::new(0, 0, 64, 64),
/// };
/// scheduler.submit(request, pool.acquire_full());
///
/// if let Some(Completion::Rendered(outcome)) = scheduler.recv_timeout(Duration::from_secs(5)) {
///     assert!(outcome.result.is_ok());
///     pool.recycle(outcome.buffer);
/// }
/// ```
pub struct RenderScheduler {
    shared: Arc<Shared>,
    receiver: Receiver<Completion>,
    worker: Option<RenderWorker>,
    next_document: u64,
}

impl RenderScheduler {
    /// Start a scheduler and its worker thread
    pub fn new(pool: Arc<BufferPool>, config: WorkerConfig) -> Result<Self, SchedulerError> {
        Self::spawn(pool, config, None)
    }

    /// Start a scheduler that calls `waker` after every completion
    pub fn with_waker(
        pool: Arc<BufferPool>,
        config: WorkerConfig,
        waker: Waker,
    ) -> Result<Self, SchedulerError> {
        Self::spawn(pool, config, Some(waker))
    }

    fn spawn(
        pool: Arc<BufferPool>,
        config: WorkerConfig,
        waker: Option<Waker>,
    ) -> Result<Self, SchedulerError> {
        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                tasks: TaskArena::new(),
                stats: SchedulerStats::default(),
                shutdown: false,
            }),
            available: Condvar::new(),
            pool,
            completions: sender,
            waker,
        });
        let worker = RenderWorker::spawn(shared.clone(), &config)?;

        Ok(Self {
            shared,
            receiver,
            worker: Some(worker),
            next_document: 0,
        })
    }

    /// The buffer pool tasks render into
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.shared.pool
    }

    /// Attach a new renderer and open it on the worker
    ///
    /// Every queued job is dropped first. The previous renderer is released
    /// by the worker before the new one is opened. The result arrives as
    /// [`Completion::Opened`] or [`Completion::OpenFailed`].
    pub fn open(&mut self, renderer: Box<dyn Renderer>) -> DocumentId {
        self.next_document += 1;
        let document = DocumentId(self.next_document);

        let dropped = self.cancel_queued(false);
        let mut state = self.shared.lock();
        state.queue.push_back(Job::Open { document, renderer });
        drop(state);
        self.shared.available.notify_one();

        tracing::debug!(document = document.raw(), dropped, "queued document open");
        document
    }

    /// Queue a render of `request` into `buffer`
    ///
    /// The buffer is owned by the task until it comes back in a
    /// [`RenderOutcome`] or, on cancellation, is returned to the pool.
    pub fn submit(&self, request: RenderRequest, buffer: PixelBuffer) -> TaskId {
        let mut state = self.shared.lock();
        let task = state.tasks.allocate();
        state.queue.push_back(Job::Render {
            task,
            request,
            buffer,
        });
        state.stats.tasks_submitted += 1;
        drop(state);

        self.shared.available.notify_one();
        task
    }

    /// Cancel a task
    ///
    /// A queued task is removed and its buffer recycled. A running task is
    /// marked so the worker discards its result. A task whose result is
    /// waiting in the channel is marked so `try_recv` drops it.
    pub fn cancel(&self, task: TaskId) -> CancelOutcome {
        let mut state = self.shared.lock();
        match state.tasks.state(task) {
            Some(TaskState::Queued) => {
                let position = state
                    .queue
                    .iter()
                    .position(|job| matches!(job, Job::Render { task: t, .. } if *t == task));
                let job = position.and_then(|index| state.queue.remove(index));
                state.tasks.release(task);
                state.stats.tasks_cancelled += 1;
                drop(state);

                if let Some(Job::Render { buffer, .. }) = job {
                    self.shared.pool.recycle(buffer);
                }
                CancelOutcome::Dequeued
            }
            Some(TaskState::Executing) => {
                state
                    .tasks
                    .transition(task, TaskState::Executing, TaskState::Cancelled);
                CancelOutcome::Interrupted
            }
            Some(TaskState::Delivered) => {
                state
                    .tasks
                    .transition(task, TaskState::Delivered, TaskState::Cancelled);
                CancelOutcome::AlreadyDelivered
            }
            Some(TaskState::Cancelled) => CancelOutcome::Interrupted,
            Some(TaskState::Idle) | None => CancelOutcome::Unknown,
        }
    }

    /// Cancel every queued render task
    ///
    /// Returns the number of tasks removed. Running tasks are unaffected.
    pub fn cancel_all_pending(&self) -> usize {
        self.cancel_queued(true)
    }

    /// Current state of `task`, `None` once it is resolved
    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        self.shared.lock().tasks.state(task)
    }

    /// Next completion, without blocking
    ///
    /// Render results of cancelled tasks are dropped here and their buffers
    /// recycled, so every `Rendered` returned belongs to a live task.
    pub fn try_recv(&self) -> Option<Completion> {
        while let Ok(completion) = self.receiver.try_recv() {
            if let Some(completion) = self.accept(completion) {
                return Some(completion);
            }
        }
        None
    }

    /// Next completion, waiting up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(completion) = self.accept(completion) {
                        return Some(completion);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    /// All completions available right now
    pub fn drain(&self) -> Vec<Completion> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let state = self.shared.lock();
        let mut stats = state.stats.clone();
        stats.queue_size = state.queue.len();
        stats.live_tasks = state.tasks.live();
        stats
    }

    /// Stop the worker and wait for it to exit
    ///
    /// The running task, if any, finishes first. Queued buffers go back to
    /// the pool and the renderer is released.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shared.lock().shutdown = true;
        self.shared.available.notify_all();
        worker.join();

        let jobs: Vec<Job> = self.shared.lock().queue.drain(..).collect();
        for job in jobs {
            if let Job::Render { buffer, .. } = job {
                self.shared.pool.recycle(buffer);
            }
        }
        while let Ok(completion) = self.receiver.try_recv() {
            if let Completion::Rendered(outcome) = completion {
                self.shared.pool.recycle(outcome.buffer);
            }
        }
    }

    fn cancel_queued(&self, keep_open: bool) -> usize {
        let mut state = self.shared.lock();
        let mut kept = VecDeque::new();
        let mut buffers = Vec::new();

        for job in state.queue.drain(..).collect::<Vec<_>>() {
            match job {
                Job::Render { task, buffer, .. } => {
                    buffers.push((task, buffer));
                }
                open @ Job::Open { .. } if keep_open => kept.push_back(open),
                Job::Open { .. } => {}
            }
        }
        state.queue = kept;
        for (task, _) in &buffers {
            state.tasks.release(*task);
        }
        state.stats.tasks_cancelled += buffers.len() as u64;
        drop(state);

        let cancelled = buffers.len();
        for (_, buffer) in buffers {
            self.shared.pool.recycle(buffer);
        }
        cancelled
    }

    /// Resolve a received completion against the task's liveness
    fn accept(&self, completion: Completion) -> Option<Completion> {
        let Completion::Rendered(outcome) = completion else {
            return Some(completion);
        };

        let mut state = self.shared.lock();
        let live = state.tasks.state(outcome.task) == Some(TaskState::Delivered);
        state.tasks.release(outcome.task);
        if live {
            state.stats.tasks_completed += 1;
            return Some(Completion::Rendered(outcome));
        }
        state.stats.tasks_discarded += 1;
        drop(state);

        tracing::trace!(tile = ?outcome.request.tile, "dropping result of cancelled task");
        let RenderOutcome { buffer, .. } = outcome;
        self.shared.pool.recycle(buffer);
        None
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
