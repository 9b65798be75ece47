// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{BoxError, Error};

/// Fired by an invoker to record the metric matching its outcome.
pub(crate) type MetricCallback = Arc<dyn Fn() + Send + Sync>;

/// The per-state invocation strategy.
///
/// Exactly one invoker is bound to each state for the lifetime of the
/// breaker: the closed and half-open states share the [`Deadline`]
/// behavior, the open state uses [`Reject`].
///
/// [`Deadline`]: Invoker::Deadline
/// [`Reject`]: Invoker::Reject
pub(crate) enum Invoker {
    /// Runs the operation against the breaker-imposed deadline.
    Deadline {
        timeout: Duration,
        on_timeout: MetricCallback,
    },
    /// Refuses the call without running the operation.
    Reject { on_reject: MetricCallback },
}

impl Invoker {
    /// Dispatches the operation according to the strategy.
    ///
    /// The deadline variant races the operation against the timeout; on
    /// expiry the operation is cancelled by being dropped, the timeout
    /// callback fires, and the returned error carries the deadline. An
    /// operation error that arrives before the deadline is returned
    /// unchanged. The reject variant never constructs the operation future.
    pub(crate) async fn invoke<T, F, Fut>(&self, operation: F) -> Result<T, BoxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        match self {
            Self::Deadline { timeout, on_timeout } => {
                match tokio::time::timeout(*timeout, operation()).await {
                    Ok(outcome) => outcome,
                    Err(_elapsed) => {
                        tracing::trace!(timeout = ?timeout, "invocation hit the breaker deadline");
                        on_timeout();
                        Err(Box::new(Error::InvocationTimeout { duration: *timeout }))
                    }
                }
            }
            Self::Reject { on_reject } => {
                tracing::trace!("invocation refused on open state");
                on_reject();
                Err(Box::new(Error::OnOpenState))
            }
        }
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline { timeout, .. } => f.debug_struct("Deadline").field("timeout", timeout).finish_non_exhaustive(),
            Self::Reject { .. } => f.debug_struct("Reject").finish_non_exhaustive(),
        }
    }
}
