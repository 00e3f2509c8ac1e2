use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

use super::preheat::PreheatRegistry;
use super::traits::ImageManager;
use crate::observability::Metrics;
use crate::request::ImageRequest;
use crate::task::{Completion, ImageTask};

type ManagerList = Arc<[Arc<dyn ImageManager>]>;

/// Chain-of-responsibility dispatcher over image managers
///
/// Requests go to the first registered manager whose `can_handle` accepts
/// them; later managers are never consulted, so specific managers should be
/// registered ahead of general fallbacks. Preheat hints and invalidation fan
/// out to every member.
///
/// The member list is an immutable snapshot swapped on mutation. A routing
/// walk clones the snapshot and releases the lock before calling into any
/// manager, so managers may re-enter the dispatcher from `task_for_request`
/// or from a synchronous completion.
///
/// Preheat changes reach members in the order the registrations changed.
/// They are queued under the registry lock and delivered by one thread at a
/// time; a caller that finds delivery in progress leaves its change to that
/// thread and returns.
pub struct CompositeImageManager {
    managers: RwLock<ManagerList>,
    invalidated: AtomicBool,
    preheat: Mutex<PreheatState>,
    metrics: Arc<Metrics>,
}

#[derive(Default)]
struct PreheatState {
    registry: PreheatRegistry,
    outbox: VecDeque<PreheatChange>,
    delivering: bool,
}

enum PreheatChange {
    Start(Vec<ImageRequest>),
    Stop(Vec<ImageRequest>),
    StopAll,
}

impl PreheatChange {
    fn apply(&self, manager: &dyn ImageManager) {
        match self {
            PreheatChange::Start(requests) => manager.start_preheating(requests),
            PreheatChange::Stop(requests) => manager.stop_preheating(requests),
            PreheatChange::StopAll => manager.stop_preheating_all(),
        }
    }
}

/// Clears the delivering flag if a member panics mid-delivery
struct DeliveryReset<'a> {
    preheat: &'a Mutex<PreheatState>,
    armed: bool,
}

impl Drop for DeliveryReset<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_preheat(self.preheat).delivering = false;
        }
    }
}

impl CompositeImageManager {
    pub fn new(managers: Vec<Arc<dyn ImageManager>>) -> Self {
        Self::with_metrics(managers, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(managers: Vec<Arc<dyn ImageManager>>, metrics: Arc<Metrics>) -> Self {
        Self {
            managers: RwLock::new(managers.into()),
            invalidated: AtomicBool::new(false),
            preheat: Mutex::new(PreheatState::default()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Append a manager to the end of the chain; no-op once invalidated
    pub fn add_manager(&self, manager: Arc<dyn ImageManager>) {
        self.add_managers(vec![manager]);
    }

    pub fn add_managers(&self, managers: Vec<Arc<dyn ImageManager>>) {
        if managers.is_empty() {
            return;
        }

        let mut current = self.managers.write().unwrap_or_else(PoisonError::into_inner);
        // Checked under the write lock: invalidation sets the flag before it
        // takes its snapshot, so a manager is either rejected here or seen
        // by that snapshot.
        if self.is_invalidated() {
            debug!(count = managers.len(), "Dispatcher invalidated, ignoring new managers");
            return;
        }

        for manager in &managers {
            info!(manager = manager.name(), position = current.len(), "Manager registered");
        }
        let next: Vec<_> = current.iter().cloned().chain(managers).collect();
        *current = next.into();
    }

    /// Remove a manager by identity
    ///
    /// Tasks it already created are unaffected and remain its responsibility.
    pub fn remove_manager(&self, manager: &Arc<dyn ImageManager>) {
        self.remove_managers(std::slice::from_ref(manager));
    }

    pub fn remove_managers(&self, managers: &[Arc<dyn ImageManager>]) {
        let mut current = self.managers.write().unwrap_or_else(PoisonError::into_inner);
        let next: Vec<_> = current
            .iter()
            .filter(|member| !managers.iter().any(|m| same_manager(member, m)))
            .cloned()
            .collect();

        if next.len() != current.len() {
            info!(removed = current.len() - next.len(), "Managers removed");
            *current = next.into();
        }
    }

    /// Snapshot of the chain in routing order
    pub fn managers(&self) -> Vec<Arc<dyn ImageManager>> {
        self.snapshot().to_vec()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Name of the manager that would handle `request`
    pub fn route(&self, request: &ImageRequest) -> Option<String> {
        self.select(request).map(|manager| manager.name().to_string())
    }

    /// Outstanding caller-side preheat registrations for `request`
    pub fn preheat_count(&self, request: &ImageRequest) -> usize {
        lock_preheat(&self.preheat).registry.count(request)
    }

    // The single first-match walk behind both routing and `can_handle`
    fn select(&self, request: &ImageRequest) -> Option<Arc<dyn ImageManager>> {
        self.snapshot()
            .iter()
            .find(|manager| manager.can_handle(request))
            .cloned()
    }

    fn snapshot(&self) -> ManagerList {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue `change` and deliver the outbox unless another thread already is
    fn publish(&self, mut state: MutexGuard<'_, PreheatState>, change: PreheatChange) {
        state.outbox.push_back(change);
        if state.delivering {
            return;
        }
        state.delivering = true;
        drop(state);

        let mut reset = DeliveryReset {
            preheat: &self.preheat,
            armed: true,
        };
        loop {
            let change = {
                let mut state = lock_preheat(&self.preheat);
                match state.outbox.pop_front() {
                    Some(change) => change,
                    None => {
                        state.delivering = false;
                        reset.armed = false;
                        return;
                    }
                }
            };
            for manager in self.snapshot().iter() {
                change.apply(manager.as_ref());
            }
        }
    }
}

fn lock_preheat(preheat: &Mutex<PreheatState>) -> MutexGuard<'_, PreheatState> {
    preheat.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for CompositeImageManager {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ImageManager for CompositeImageManager {
    fn name(&self) -> &str {
        "composite"
    }

    fn can_handle(&self, request: &ImageRequest) -> bool {
        !self.is_invalidated() && self.select(request).is_some()
    }

    fn task_for_request(
        &self,
        request: &ImageRequest,
        completion: Option<Completion>,
    ) -> Option<ImageTask> {
        if self.is_invalidated() {
            debug!(resource = %request.resource, "Dispatcher invalidated, declining request");
            self.metrics.request_declined();
            return None;
        }

        let request = request.clone();
        let Some(manager) = self.select(&request) else {
            debug!(resource = %request.resource, "No manager accepts request");
            self.metrics.request_declined();
            return None;
        };

        debug!(resource = %request.resource, manager = manager.name(), "Request routed");
        let task = manager.task_for_request(&request, completion);
        if task.is_none() {
            debug!(resource = %request.resource, manager = manager.name(), "Selected manager declined");
            self.metrics.request_declined();
        }
        task
    }

    fn invalidate_and_cancel(&self) {
        if self.invalidated.swap(true, Ordering::SeqCst) {
            return;
        }

        let managers = self.snapshot();
        info!(managers = managers.len(), "Invalidating dispatcher");

        {
            let mut state = lock_preheat(&self.preheat);
            state.registry.clear();
            state.outbox.clear();
        }
        for manager in managers.iter() {
            manager.invalidate_and_cancel();
        }
    }

    fn start_preheating(&self, requests: &[ImageRequest]) {
        let mut state = lock_preheat(&self.preheat);
        if self.is_invalidated() {
            return;
        }

        let added = state.registry.start(requests);
        if added.is_empty() {
            return;
        }
        debug!(count = added.len(), "Preheating requests");
        self.publish(state, PreheatChange::Start(added));
    }

    fn stop_preheating(&self, requests: &[ImageRequest]) {
        let mut state = lock_preheat(&self.preheat);
        let released = state.registry.stop(requests);
        if released.is_empty() {
            return;
        }
        debug!(count = released.len(), "Stopping preheat");
        self.publish(state, PreheatChange::Stop(released));
    }

    fn stop_preheating_all(&self) {
        let mut state = lock_preheat(&self.preheat);
        state.registry.clear();
        self.publish(state, PreheatChange::StopAll);
    }
}

fn same_manager(a: &Arc<dyn ImageManager>, b: &Arc<dyn ImageManager>) -> bool {
    // Compare data pointers only; vtable pointers for the same type may differ
    // across codegen units.
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
