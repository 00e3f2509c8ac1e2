//! Image managers and the dispatcher that routes between them
//!
//! [`ImageManager`] is the contract every backend implements.
//! [`CompositeImageManager`] is itself a manager: it forwards each request to
//! the first member that accepts it. [`FetchingImageManager`] turns any
//! [`ImageFetcher`](crate::fetcher::ImageFetcher) into a manager.

mod composite;
mod fetching;
mod preheat;
mod registry;
mod traits;

pub use composite::CompositeImageManager;
pub use fetching::FetchingImageManager;
pub use preheat::PreheatRegistry;
pub use registry::{BuildError, build_dispatcher};
pub use traits::ImageManager;
