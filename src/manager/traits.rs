use crate::request::{ImageRequest, Resource};
use crate::task::{Completion, ImageTask};

/// Capability contract implemented by every image manager
///
/// A manager decides which requests it can serve, creates and owns the
/// tasks for them, and honours the completion contract: once a task has been
/// returned, its completion fires exactly once, with an info payload whose
/// `status` says whether it succeeded, failed or was cancelled. Returning
/// `None` means the request was declined and the completion will never run.
///
/// Completions may fire synchronously, before `task_for_request` returns, or
/// later on any thread.
pub trait ImageManager: Send + Sync {
    /// Name used in logs and in the `manager` info key
    fn name(&self) -> &str;

    /// Whether this manager would accept `request`
    ///
    /// Must be cheap and free of side effects: the dispatcher calls it on
    /// every routing walk, concurrently with other dispatches.
    fn can_handle(&self, request: &ImageRequest) -> bool;

    /// Task for the largest available representation of `resource`
    fn task_for_resource(
        &self,
        resource: &Resource,
        completion: Option<Completion>,
    ) -> Option<ImageTask> {
        self.task_for_request(&ImageRequest::new(resource.clone()), completion)
    }

    /// Create a task for `request` and start it
    ///
    /// Implementations keep their own copy of the request. After
    /// [`invalidate_and_cancel`](Self::invalidate_and_cancel) this must
    /// return `None`.
    fn task_for_request(
        &self,
        request: &ImageRequest,
        completion: Option<Completion>,
    ) -> Option<ImageTask>;

    /// Cancel every outstanding task and preheat, then refuse new work
    /// for good
    fn invalidate_and_cancel(&self);

    /// Advisory prefetch; repeating a request that is already being
    /// preheated must not duplicate work. Failures are never reported.
    fn start_preheating(&self, requests: &[ImageRequest]);

    /// Release one preheat registration per request
    fn stop_preheating(&self, requests: &[ImageRequest]);

    fn stop_preheating_all(&self);
}
