use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::TryCurrentError;
use tracing::info;

use super::composite::CompositeImageManager;
use super::fetching::FetchingImageManager;
use super::traits::ImageManager;
use crate::config::{Config, ManagerKind};
use crate::fetcher::{FetchError, FileFetcher, HttpFetcher};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] TryCurrentError),

    #[error("failed to initialise fetcher: {0}")]
    Fetcher(#[from] FetchError),
}

/// Build the dispatcher described by `config.dispatcher.managers`
///
/// Managers are registered in the configured order, which is also the
/// routing order. Must be called from within a tokio runtime.
pub fn build_dispatcher(
    config: &Config,
    metrics: Arc<Metrics>,
) -> Result<CompositeImageManager, BuildError> {
    let mut managers: Vec<Arc<dyn ImageManager>> =
        Vec::with_capacity(config.dispatcher.managers.len());

    for kind in &config.dispatcher.managers {
        let manager: Arc<dyn ImageManager> = match kind {
            ManagerKind::File => Arc::new(FetchingImageManager::new(
                FileFetcher::new(config.file.clone()),
                Arc::clone(&metrics),
            )?),
            ManagerKind::Http => Arc::new(FetchingImageManager::new(
                HttpFetcher::new(config.http.clone())?,
                Arc::clone(&metrics),
            )?),
        };
        managers.push(manager);
    }

    info!(
        managers = ?config.dispatcher.managers,
        "Dispatcher built"
    );
    Ok(CompositeImageManager::with_metrics(managers, metrics))
}
