use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::preheat::PreheatRegistry;
use super::registry::BuildError;
use super::traits::ImageManager;
use crate::fetcher::{FetchError, ImageFetcher};
use crate::image::Image;
use crate::observability::Metrics;
use crate::request::ImageRequest;
use crate::task::{Completion, ImageInfo, ImageTask, TaskSet, keys};

/// Adapts an [`ImageFetcher`] to the [`ImageManager`] contract
///
/// Each accepted request becomes a task whose fetch runs on the tokio
/// runtime captured at construction; cancelling the task aborts the fetch.
/// Preheated requests are fetched in the background and kept in memory
/// while they stay registered, so a later task for an equal request
/// completes before `task_for_request` returns.
pub struct FetchingImageManager<F: ImageFetcher> {
    fetcher: Arc<F>,
    runtime: Handle,
    tasks: TaskSet,
    preheat: Arc<Mutex<PreheatState>>,
    invalidated: AtomicBool,
    metrics: Arc<Metrics>,
}

#[derive(Default)]
struct PreheatState {
    registry: PreheatRegistry,
    jobs: HashMap<ImageRequest, PreheatJob>,
    generation: u64,
}

enum PreheatJob {
    Pending { generation: u64, handle: JoinHandle<()> },
    Ready(Image),
}

impl PreheatJob {
    fn abort(self) {
        if let PreheatJob::Pending { handle, .. } = self {
            handle.abort();
        }
    }
}

/// Hands the outcome of a spawned fetch to its task
///
/// Dropping it before the task is finished fails the task, which covers a
/// runtime that shuts down with the fetch still queued.
struct Delivery {
    task: ImageTask,
    metrics: Arc<Metrics>,
}

impl Delivery {
    fn deliver(&self, outcome: Result<Result<Image, FetchError>, JoinError>) {
        let task = &self.task;
        match outcome {
            Ok(Ok(image)) => {
                debug!(task_id = %task.id(), bytes = image.len(), "Image fetched");
                if task.complete(image, ImageInfo::new()) {
                    self.metrics.task_completed();
                }
            }
            Ok(Err(e)) => {
                debug!(task_id = %task.id(), error = %e, "Image fetch failed");
                self.fail(e.to_info());
            }
            Err(e) if e.is_panic() => {
                warn!(task_id = %task.id(), manager = task.manager(), "Fetcher panicked");
                self.fail(ImageInfo::failure("fetcher panicked", "panic"));
            }
            // Aborted by the cancel handler
            Err(_) => {}
        }
    }

    fn fail(&self, info: ImageInfo) {
        if self.task.fail(info) {
            self.metrics.task_failed();
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            warn!(task_id = %self.task.id(), "Fetch dropped before delivering a result");
            self.fail(ImageInfo::failure("fetch job was dropped", "aborted"));
        }
    }
}

impl<F: ImageFetcher> FetchingImageManager<F> {
    /// Wrap `fetcher`; must be called from within a tokio runtime
    pub fn new(fetcher: F, metrics: Arc<Metrics>) -> Result<Self, BuildError> {
        let runtime = Handle::try_current()?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            runtime,
            tasks: TaskSet::new(),
            preheat: Arc::new(Mutex::new(PreheatState::default())),
            invalidated: AtomicBool::new(false),
            metrics,
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Tasks that have been handed out and not yet finished
    pub fn active_tasks(&self) -> usize {
        self.tasks.active()
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Whether a preheated image for `request` is ready to be served
    pub fn is_preheated(&self, request: &ImageRequest) -> bool {
        self.preheated_image(request).is_some()
    }

    fn preheated_image(&self, request: &ImageRequest) -> Option<Image> {
        match lock(&self.preheat).jobs.get(request) {
            Some(PreheatJob::Ready(image)) => Some(image.clone()),
            _ => None,
        }
    }

    fn spawn_fetch(&self, task: &ImageTask) {
        let fetcher = Arc::clone(&self.fetcher);
        let fetch_task = task.clone();
        let fetch = self
            .runtime
            .spawn(async move { fetcher.fetch(fetch_task.request()).await });
        let abort = fetch.abort_handle();

        // Watches the fetch so that a panic or a runtime shutdown still
        // finishes the task.
        let delivery = Delivery {
            task: task.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        self.runtime.spawn(async move {
            let outcome = fetch.await;
            delivery.deliver(outcome);
        });

        let metrics = Arc::clone(&self.metrics);
        task.set_cancel_handler(move || {
            abort.abort();
            metrics.task_cancelled();
        });
    }

    fn spawn_preheat(&self, state: &mut PreheatState, request: ImageRequest) {
        state.generation += 1;
        let generation = state.generation;
        let fetcher = Arc::clone(&self.fetcher);
        let preheat = Arc::clone(&self.preheat);
        let job_request = request.clone();

        let handle = self.runtime.spawn(async move {
            let result = fetcher.fetch(&job_request).await;

            let mut state = lock(&preheat);
            // Stale if the request was released, or released and registered again
            let current = matches!(
                state.jobs.get(&job_request),
                Some(PreheatJob::Pending { generation: g, .. }) if *g == generation
            );
            if !current {
                return;
            }

            match result {
                Ok(image) => {
                    debug!(resource = %job_request.resource, bytes = image.len(), "Preheat ready");
                    state.jobs.insert(job_request, PreheatJob::Ready(image));
                }
                Err(e) => {
                    warn!(resource = %job_request.resource, error = %e, "Preheat failed");
                    state.jobs.remove(&job_request);
                }
            }
        });

        self.metrics.preheat_started();
        state
            .jobs
            .insert(request, PreheatJob::Pending { generation, handle });
    }
}

impl<F: ImageFetcher> ImageManager for FetchingImageManager<F> {
    fn name(&self) -> &str {
        self.fetcher.name()
    }

    fn can_handle(&self, request: &ImageRequest) -> bool {
        !self.is_invalidated() && self.fetcher.can_fetch(request)
    }

    fn task_for_request(
        &self,
        request: &ImageRequest,
        completion: Option<Completion>,
    ) -> Option<ImageTask> {
        if !self.can_handle(request) {
            debug!(manager = self.name(), resource = %request.resource, "Request declined");
            return None;
        }

        let task = ImageTask::new(self.name(), request.clone(), completion);
        if !self.tasks.track(&task) {
            debug!(manager = self.name(), "Manager invalidated, dropping new task");
            return None;
        }
        self.metrics.task_created();
        task.resume();

        if let Some(image) = self.preheated_image(task.request()) {
            debug!(task_id = %task.id(), "Serving preheated image");
            if task.complete(image, ImageInfo::new().with(keys::PREHEATED, true)) {
                self.metrics.task_completed();
            }
            return Some(task);
        }

        debug!(
            task_id = %task.id(),
            manager = self.name(),
            resource = %request.resource,
            "Task started"
        );
        self.spawn_fetch(&task);
        Some(task)
    }

    fn invalidate_and_cancel(&self) {
        if self.invalidated.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancelled = self.tasks.close_and_cancel_all();
        info!(manager = self.name(), cancelled, "Manager invalidated");
        self.stop_preheating_all();
    }

    fn start_preheating(&self, requests: &[ImageRequest]) {
        let mut state = lock(&self.preheat);
        // Checked under the lock that invalidation drains, so no job can be
        // spawned after that drain.
        if self.is_invalidated() {
            return;
        }
        for request in state.registry.start(requests) {
            if self.fetcher.can_fetch(&request) {
                self.spawn_preheat(&mut state, request);
            }
        }
    }

    fn stop_preheating(&self, requests: &[ImageRequest]) {
        let mut state = lock(&self.preheat);
        for request in state.registry.stop(requests) {
            if let Some(job) = state.jobs.remove(&request) {
                job.abort();
            }
        }
    }

    fn stop_preheating_all(&self) {
        let mut state = lock(&self.preheat);
        state.registry.clear();
        for (_, job) in state.jobs.drain() {
            job.abort();
        }
    }
}

fn lock(preheat: &Mutex<PreheatState>) -> MutexGuard<'_, PreheatState> {
    preheat.lock().unwrap_or_else(PoisonError::into_inner)
}
