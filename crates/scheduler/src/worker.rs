//! The render worker thread.
//!
//! One worker pulls jobs from the shared queue in FIFO order. Opening a
//! document and rendering tiles both happen here, so the renderer is only
//! ever touched from this thread.

use crate::job::{Completion, Job, RenderOutcome, RenderRequest};
use crate::scheduler::Shared;
use crate::task::{TaskId, TaskState};
use docview_render::{PixelBuffer, RenderError, Renderer};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the render worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name given to the worker thread.
    /// Default: `docview-render-worker`.
    pub thread_name: String,

    /// Maximum time the worker waits for a job before checking shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "docview-render-worker".to_string(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WorkerConfig {
    /// Set the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the poll interval for the worker.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Handle to the running worker thread
pub(crate) struct RenderWorker {
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub(crate) fn spawn(shared: Arc<Shared>, config: &WorkerConfig) -> std::io::Result<Self> {
        let poll_interval = config.poll_interval;
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || Self::run(&shared, poll_interval))?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Main worker loop.
    ///
    /// Runs until shutdown is flagged, then releases the attached renderer.
    fn run(shared: &Shared, poll_interval: Duration) {
        let mut renderer: Option<Box<dyn Renderer>> = None;

        while let Some(job) = Self::next_job(shared, poll_interval) {
            match job {
                Job::Open {
                    document,
                    renderer: mut next,
                } => {
                    if let Some(mut previous) = renderer.take() {
                        previous.release();
                    }
                    match next.open() {
                        Ok(pages) => {
                            tracing::info!(
                                document = document.raw(),
                                pages = pages.len(),
                                "document opened"
                            );
                            renderer = Some(next);
                            shared.send(Completion::Opened { document, pages });
                        }
                        Err(error) => {
                            tracing::warn!(document = document.raw(), %error, "failed to open document");
                            next.release();
                            shared.send(Completion::OpenFailed { document, error });
                        }
                    }
                    shared.wake();
                }
                Job::Render {
                    task,
                    request,
                    mut buffer,
                } => {
                    let result = Self::render(renderer.as_deref_mut(), &mut buffer, &request);
                    Self::finish(shared, task, request, buffer, result);
                }
            }
        }

        if let Some(mut renderer) = renderer {
            renderer.release();
        }
        tracing::debug!("render worker stopped");
    }

    /// Block until a job is available or shutdown is flagged
    fn next_job(shared: &Shared, poll_interval: Duration) -> Option<Job> {
        let mut state = shared.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(job) = state.queue.pop_front() {
                if let Job::Render { task, .. } = &job {
                    // Cancelling a queued task removes it under this lock
                    let started =
                        state
                            .tasks
                            .transition(*task, TaskState::Queued, TaskState::Executing);
                    debug_assert!(started, "queued task in unexpected state");
                }
                return Some(job);
            }
            state = shared
                .available
                .wait_timeout(state, poll_interval)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    fn render(
        renderer: Option<&mut (dyn Renderer + 'static)>,
        buffer: &mut PixelBuffer,
        request: &RenderRequest,
    ) -> Result<(), RenderError> {
        let Some(renderer) = renderer else {
            return Err(RenderError::NotOpen);
        };
        let result = catch_unwind(AssertUnwindSafe(|| {
            renderer.render_page_clip(buffer, request.page, request.scale, request.region)
        }));
        match result {
            Ok(result) => result,
            Err(_) => Err(RenderError::Backend(format!(
                "renderer panicked on page {}",
                request.page
            ))),
        }
    }

    /// Deliver the result, or recycle the buffer if the task was cancelled
    fn finish(
        shared: &Shared,
        task: TaskId,
        request: RenderRequest,
        buffer: PixelBuffer,
        result: Result<(), RenderError>,
    ) {
        let mut state = shared.lock();
        if let Err(error) = &result {
            state.stats.render_failures += 1;
            tracing::debug!(page = request.page, tile = ?request.tile, %error, "tile render failed");
        }

        if state
            .tasks
            .transition(task, TaskState::Executing, TaskState::Delivered)
        {
            shared.send(Completion::Rendered(RenderOutcome {
                task,
                request,
                buffer,
                result,
            }));
            drop(state);
            shared.wake();
            return;
        }

        state.tasks.release(task);
        state.stats.tasks_discarded += 1;
        drop(state);
        tracing::trace!(tile = ?request.tile, "discarding cancelled render");
        shared.pool.recycle(buffer);
    }

    /// Wait for the worker thread to finish.
    pub(crate) fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("render worker panicked");
            }
        }
    }
}
