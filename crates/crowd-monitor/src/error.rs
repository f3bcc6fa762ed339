//! Monitor error types.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crowd_store::{StoreError, StoreResult};

pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Await a store call, giving up after `limit`.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = StoreResult<T>>,
) -> MonitorResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(MonitorError::from),
        Err(_) => Err(MonitorError::Timeout(limit)),
    }
}
