use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::handle::ImageTask;

/// Tasks owned by one manager
///
/// Finished tasks are pruned lazily on insertion. Once closed, the set
/// refuses new tasks, which is how a manager guarantees that nothing is
/// admitted after it has been invalidated.
#[derive(Debug, Default)]
pub struct TaskSet {
    inner: Mutex<TaskSetInner>,
}

#[derive(Debug, Default)]
struct TaskSetInner {
    tasks: HashMap<Uuid, ImageTask>,
    closed: bool,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `task`; `false` if the set has been closed
    pub fn track(&self, task: &ImageTask) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        inner.tasks.retain(|_, task| !task.is_finished());
        inner.tasks.insert(task.id(), task.clone());
        true
    }

    /// Number of tracked tasks that have not reached a terminal state
    pub fn active(&self) -> usize {
        self.lock()
            .tasks
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Cancel every outstanding task and return how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let drained = self.drain(false);
        Self::cancel_each(drained)
    }

    /// Close the set, then cancel every outstanding task
    pub fn close_and_cancel_all(&self) -> usize {
        let drained = self.drain(true);
        Self::cancel_each(drained)
    }

    fn drain(&self, close: bool) -> Vec<ImageTask> {
        let mut inner = self.lock();
        if close {
            inner.closed = true;
        }
        inner.tasks.drain().map(|(_, task)| task).collect()
    }

    // Outside the lock: cancellation runs completions, which may re-enter.
    fn cancel_each(tasks: Vec<ImageTask>) -> usize {
        tasks.into_iter().filter(|task| task.cancel()).count()
    }

    fn lock(&self) -> MutexGuard<'_, TaskSetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use crate::request::{ImageRequest, Resource};
    use crate::task::{ImageInfo, TaskState};

    fn task() -> ImageTask {
        let task = ImageTask::new("test", ImageRequest::new(Resource::asset("a")), None);
        task.resume();
        task
    }

    #[test]
    fn test_track_and_cancel_all() {
        let set = TaskSet::new();
        let first = task();
        let second = task();
        assert!(set.track(&first));
        assert!(set.track(&second));
        assert_eq!(set.active(), 2);

        assert_eq!(set.cancel_all(), 2);
        assert_eq!(first.state(), TaskState::Cancelled);
        assert_eq!(second.state(), TaskState::Cancelled);
        assert_eq!(set.active(), 0);
        assert!(!set.is_closed());
    }

    #[test]
    fn test_finished_tasks_are_not_cancelled() {
        let set = TaskSet::new();
        let done = task();
        set.track(&done);
        done.complete(Image::new(vec![0u8]), ImageInfo::new());

        assert_eq!(set.active(), 0);
        assert_eq!(set.cancel_all(), 0);
        assert_eq!(done.state(), TaskState::Completed);
    }

    #[test]
    fn test_closed_set_rejects_new_tasks() {
        let set = TaskSet::new();
        let running = task();
        set.track(&running);

        assert_eq!(set.close_and_cancel_all(), 1);
        assert!(set.is_closed());
        assert!(!set.track(&task()));
        assert_eq!(set.active(), 0);
    }
}
