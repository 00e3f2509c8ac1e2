use std::collections::HashMap;

use crate::request::ImageRequest;

/// Reference-counted preheat registrations keyed by request equality
///
/// `start` and `stop` report only the edges: requests that went from zero to
/// one registration, and requests whose last registration was released.
/// Callers start or stop real work on those edges only, so repeated hints
/// for the same request never duplicate it.
#[derive(Debug, Default)]
pub struct PreheatRegistry {
    counts: HashMap<ImageRequest, usize>,
}

impl PreheatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register each request once; returns the newly registered ones
    pub fn start(&mut self, requests: &[ImageRequest]) -> Vec<ImageRequest> {
        let mut added = Vec::new();
        for request in requests {
            let count = self.counts.entry(request.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                added.push(request.clone());
            }
        }
        added
    }

    /// Release one registration per request; returns the ones that reached
    /// zero. Requests that were never registered are ignored.
    pub fn stop(&mut self, requests: &[ImageRequest]) -> Vec<ImageRequest> {
        let mut released = Vec::new();
        for request in requests {
            let Some(count) = self.counts.get_mut(request) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                self.counts.remove(request);
                released.push(request.clone());
            }
        }
        released
    }

    /// Drop every registration; returns what was registered
    pub fn clear(&mut self) -> Vec<ImageRequest> {
        self.counts.drain().map(|(request, _)| request).collect()
    }

    pub fn count(&self, request: &ImageRequest) -> usize {
        self.counts.get(request).copied().unwrap_or(0)
    }

    pub fn contains(&self, request: &ImageRequest) -> bool {
        self.counts.contains_key(request)
    }

    /// Number of distinct registered requests
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
