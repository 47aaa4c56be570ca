use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::instance::ModelInstance;
use crate::core::executor::BatchReport;
use crate::error::{BackendError, Result};
use crate::host::Host;

/// Hands batches of host requests to a model from async code.
///
/// Batch execution blocks: on the interpreter gate and on the transform
/// itself. Implementations must keep that work off the async reactor.
///
/// # Type Parameters
///
/// * `Q` - The host request handle type
///
/// # Example
///
/// ```ignore
/// let instance = Arc::new(ModelInstance::new(model, gate, host, identity)?);
/// let report = instance.dispatch(requests).await?;
/// tracing::info!(failed = report.failed(), "batch done");
/// ```
#[async_trait]
pub trait BatchDispatcher<Q: Send + 'static> {
    /// Execute `requests` as one batch and wait for it to finish.
    ///
    /// Every request is released by the time this resolves successfully.
    /// An error means the batch could not be run or joined at all.
    async fn dispatch(&self, requests: Vec<Q>) -> Result<BatchReport>;
}

#[async_trait]
impl<H> BatchDispatcher<H::Request> for Arc<ModelInstance<H>>
where
    H: Host + 'static,
    H::Request: 'static,
{
    async fn dispatch(&self, requests: Vec<H::Request>) -> Result<BatchReport> {
        let instance = Arc::clone(self);
        tokio::task::spawn_blocking(move || instance.execute(requests))
            .await
            .map_err(|e| {
                error!(error = %e, "batch worker did not complete");
                BackendError::Dispatch(e.to_string())
            })
    }
}
