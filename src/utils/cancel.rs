use crate::utils::error::{DriveError, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Await `operation` unless `ct` fires first.
///
/// A token that is already cancelled wins even if the operation would be
/// immediately ready, so callers never observe a completed remote call after
/// asking for cancellation.
pub async fn cancellable<F, T>(ct: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if ct.is_cancelled() {
        return Err(DriveError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = ct.cancelled() => Err(DriveError::Cancelled),
        result = operation => result,
    }
}
