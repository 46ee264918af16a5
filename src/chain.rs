//! Running one step of a provider fallback chain
//!
//! Every provider call races its own timeout and the caller's cancellation token.
//! A timeout is reported exactly like any other provider failure so the chain can
//! move on to the next provider.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::Result;
use crate::error::LocatorError;

/// Outcome of a single provider attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// The provider produced a usable result; the chain stops here
    Found(T),
    /// The provider answered but had nothing for this input
    NoMatch,
    /// The provider errored, timed out, or was skipped
    Failed(LocatorError),
}

/// Await one provider call under a timeout, honouring cancellation.
///
/// Returns `Err(Cancelled)` only when the token fires; every other problem is
/// folded into [`Attempt::Failed`].
pub async fn attempt<T, F>(
    provider: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<Attempt<T>>
where
    F: Future<Output = Result<Option<T>>>,
{
    if cancel.is_cancelled() {
        return Err(LocatorError::Cancelled);
    }

    let outcome = tokio::select! {
        () = cancel.cancelled() => return Err(LocatorError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => outcome,
    };

    let attempt = match outcome {
        Ok(Ok(Some(value))) => Attempt::Found(value),
        Ok(Ok(None)) => {
            debug!(provider, "Provider returned no match");
            Attempt::NoMatch
        }
        Ok(Err(e)) => {
            warn!(provider, error = %e, "Provider failed, falling back");
            Attempt::Failed(e)
        }
        Err(_) => {
            let e = LocatorError::ProviderTimeout {
                provider: provider.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            };
            warn!(provider, error = %e, "Provider timed out, falling back");
            Attempt::Failed(e)
        }
    };
    Ok(attempt)
}
