//! Resource-agnostic image loading
//!
//! Callers describe what they want with an [`ImageRequest`](request::ImageRequest)
//! and hand it to a [`CompositeImageManager`](manager::CompositeImageManager),
//! which routes it to the first registered manager that can serve it and
//! returns a cancellable [`ImageTask`](task::ImageTask).

pub mod config;
pub mod fetcher;
pub mod humanize;
pub mod image;
pub mod manager;
pub mod observability;
pub mod request;
pub mod task;
