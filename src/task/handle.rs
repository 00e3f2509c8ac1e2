use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use super::info::{ImageInfo, TaskStatus, keys};
use crate::image::Image;
use crate::request::ImageRequest;

/// Completion callback: the image (absent on failure or cancellation) and
/// the info payload, which is always present
pub type Completion = Box<dyn FnOnce(Option<Image>, ImageInfo) + Send + 'static>;

type CancelHandler = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of an [`ImageTask`]
///
/// `Created → Running → {Completed, Failed, Cancelled}`. A task that is
/// cancelled or finished before it was resumed goes straight from `Created`
/// to the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Running,
    Cancelled,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Cancelled | TaskState::Completed | TaskState::Failed
        )
    }

    fn status(self) -> Option<TaskStatus> {
        match self {
            TaskState::Completed => Some(TaskStatus::Success),
            TaskState::Cancelled => Some(TaskStatus::Cancelled),
            TaskState::Failed => Some(TaskStatus::Failed),
            TaskState::Created | TaskState::Running => None,
        }
    }
}

/// Cancellable handle for one image load
///
/// Cloning yields another handle to the same task. The first terminal
/// transition wins; the completion runs exactly once, outside the internal
/// lock, so it may call back into the task or its manager.
#[derive(Clone)]
pub struct ImageTask {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: Uuid,
    manager: String,
    request: ImageRequest,
    cell: Mutex<TaskCell>,
}

struct TaskCell {
    state: TaskState,
    completion: Option<Completion>,
    cancel_handler: Option<CancelHandler>,
}

impl ImageTask {
    pub fn new(
        manager: impl Into<String>,
        request: ImageRequest,
        completion: Option<Completion>,
    ) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: Uuid::now_v7(),
                manager: manager.into(),
                request,
                cell: Mutex::new(TaskCell {
                    state: TaskState::Created,
                    completion,
                    cancel_handler: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Name of the manager that created the task
    pub fn manager(&self) -> &str {
        &self.inner.manager
    }

    /// The manager's private copy of the request
    pub fn request(&self) -> &ImageRequest {
        &self.inner.request
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Mark the task as running; only valid from `Created`
    pub fn resume(&self) -> bool {
        let mut cell = self.lock();
        if cell.state != TaskState::Created {
            return false;
        }
        cell.state = TaskState::Running;
        true
    }

    /// Install the hook that stops the underlying work on cancellation
    ///
    /// Runs immediately if the task was already cancelled; dropped unused
    /// if the task already completed or failed.
    pub fn set_cancel_handler(&self, handler: impl FnOnce() + Send + 'static) {
        let mut cell = self.lock();
        let state = cell.state;
        match state {
            TaskState::Cancelled => {
                drop(cell);
                handler();
            }
            TaskState::Completed | TaskState::Failed => {}
            TaskState::Created | TaskState::Running => {
                cell.cancel_handler = Some(Box::new(handler));
            }
        }
    }

    /// Deliver a successful result; returns `false` if the task had already
    /// reached a terminal state
    pub fn complete(&self, image: Image, info: ImageInfo) -> bool {
        self.finish(TaskState::Completed, Some(image), info)
    }

    /// Deliver a failure; `info` should describe it (see [`ImageInfo::failure`])
    pub fn fail(&self, info: ImageInfo) -> bool {
        self.finish(TaskState::Failed, None, info)
    }

    /// Cancel the task. Safe to call at any time and any number of times;
    /// only the call that wins the transition has an effect.
    pub fn cancel(&self) -> bool {
        self.finish(TaskState::Cancelled, None, ImageInfo::new())
    }

    fn finish(&self, state: TaskState, image: Option<Image>, info: ImageInfo) -> bool {
        let (completion, cancel_handler) = {
            let mut cell = self.lock();
            if cell.state.is_terminal() {
                return false;
            }
            cell.state = state;
            (cell.completion.take(), cell.cancel_handler.take())
        };

        debug!(task_id = %self.inner.id, manager = %self.inner.manager, ?state, "Task finished");

        if state == TaskState::Cancelled {
            if let Some(handler) = cancel_handler {
                handler();
            }
        }

        if let Some(completion) = completion {
            let mut info = info;
            if let Some(status) = state.status() {
                info.insert(keys::STATUS, status.as_str());
            }
            info.insert(keys::MANAGER, self.inner.manager.clone());
            info.insert(keys::TASK_ID, self.inner.id.to_string());
            completion(image, info);
        }

        true
    }

    fn lock(&self) -> MutexGuard<'_, TaskCell> {
        // Every critical section leaves the cell consistent, so a poisoned
        // lock is still safe to use.
        self.inner.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for ImageTask {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ImageTask {}

impl fmt::Debug for ImageTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageTask")
            .field("id", &self.inner.id)
            .field("manager", &self.inner.manager)
            .field("resource", &self.inner.request.resource)
            .field("state", &self.state())
            .finish()
    }
}
