//! Task lifecycle
//!
//! - [`ImageTask`] - cancellable handle with a single-fire completion
//! - [`ImageInfo`] - info payload delivered with every completion
//! - [`TaskSet`] - the tasks a manager owns, cancelled together on shutdown

mod handle;
mod info;
mod set;

pub use handle::{Completion, ImageTask, TaskState};
pub use info::{ImageInfo, TaskStatus, keys};
pub use set::TaskSet;
