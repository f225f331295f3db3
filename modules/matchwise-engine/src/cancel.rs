//! Cancellation plumbing for store and cache awaits.
//!
//! Every public entry point takes a `CancellationToken`. Suspension only happens
//! at collaborator calls, so those are the only places that race the token.

use std::future::Future;

use matchwise_common::MatchError;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless `cancel` fires first.
pub async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, MatchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MatchError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Await a store call, classifying its error as a store failure.
pub async fn store_call<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, MatchError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    cancellable(cancel, fut).await?.map_err(MatchError::store)
}

pub fn ensure_active(cancel: &CancellationToken) -> Result<(), MatchError> {
    if cancel.is_cancelled() {
        Err(MatchError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cancellable(&cancel, std::future::pending::<()>()).await;
        assert!(matches!(result, Err(MatchError::Cancelled)));
        assert!(ensure_active(&cancel).is_err());
    }

    #[tokio::test]
    async fn store_errors_are_classified() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> =
            store_call(&cancel, async { Err(anyhow::anyhow!("connection reset")) }).await;
        assert!(matches!(result, Err(MatchError::Store(_))));
    }
}
