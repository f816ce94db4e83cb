//! Timeout enforcement.

use std::future::Future;
use std::time::Duration;

use crate::error::MirrorError;

/// Run `fut` with a deadline. Expiry drops `fut` and yields
/// [`MirrorError::Timeout`].
pub async fn with_timeout<F, T>(deadline: Duration, fut: F) -> Result<T, MirrorError>
where
    F: Future<Output = Result<T, MirrorError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = deadline.as_millis() as u64, "Request deadline exceeded");
            Err(MirrorError::Timeout(deadline))
        }
    }
}
