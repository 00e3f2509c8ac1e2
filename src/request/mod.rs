//! Image requests: what to load and how
//!
//! An [`ImageRequest`] is a plain value. Managers receive it by reference and
//! clone it when they accept it, so whatever the caller does with its own
//! copy afterwards cannot reach work that is already in flight.

mod options;
mod resource;

pub use options::{ContentMode, Priority, RequestOptions, TargetSize};
pub use resource::{Resource, ResourceParseError};

use bon::Builder;
use std::fmt;

/// Resource plus load options
///
/// Equality and hashing cover every option, which is what preheat
/// deduplication keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
pub struct ImageRequest {
    pub resource: Resource,
    #[builder(default)]
    pub options: RequestOptions,
}

impl ImageRequest {
    /// Request for the largest representation of `resource`
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            options: RequestOptions::maximal(),
        }
    }

    pub fn with_options(resource: Resource, options: RequestOptions) -> Self {
        Self { resource, options }
    }
}

impl From<Resource> for ImageRequest {
    fn from(resource: Resource) -> Self {
        Self::new(resource)
    }
}

impl fmt::Display for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.options.target_size {
            Some(size) => write!(f, "{} ({}x{})", self.resource, size.width, size.height),
            None => write!(f, "{}", self.resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_is_maximal() {
        let request = ImageRequest::new(Resource::url("https://example.com/a.png"));
        assert!(request.options.is_maximal_size());
        assert_eq!(request.to_string(), "https://example.com/a.png");
    }

    #[test]
    fn test_equality_includes_options() {
        let resource = Resource::url("https://example.com/a.png");
        let plain = ImageRequest::new(resource.clone());
        let sized = ImageRequest::builder()
            .resource(resource.clone())
            .options(
                RequestOptions::builder()
                    .target_size(TargetSize::new(10, 10))
                    .build(),
            )
            .build();

        assert_ne!(plain, sized);
        assert_eq!(plain, ImageRequest::from(resource));

        let set: HashSet<_> = [plain.clone(), plain, sized].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_clone_is_isolated() {
        let mut original = ImageRequest::new(Resource::asset("a"));
        let accepted = original.clone();

        original.options.priority = Priority::VeryHigh;
        original.resource = Resource::asset("b");

        assert_eq!(accepted.resource, Resource::asset("a"));
        assert_eq!(accepted.options.priority, Priority::Normal);
    }
}
