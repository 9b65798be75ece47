// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::State;

/// A boxed error used at the boundaries of the breaker: the error type
/// returned by operations and restrictors, and the cause carried by
/// [`Error::Invocation`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The errors surfaced by the breaker.
///
/// Construction-time errors ([`InvalidOption`][Self::InvalidOption],
/// [`UnknownState`][Self::UnknownState]) are reported once and never retried.
/// Trip-time errors ([`AlreadyInDesiredState`][Self::AlreadyInDesiredState],
/// [`UnknownState`][Self::UnknownState]) leave the breaker untouched.
/// Everything [`Breaker::run`][crate::Breaker::run] returns is an
/// [`Invocation`][Self::Invocation] wrapping the cause; handlers and callers
/// can reach the cause through [`std::error::Error::source`] and downcast it:
///
/// ```
/// use tripwire::Error;
///
/// fn rejected_on_open(error: &Error) -> bool {
///     let Error::Invocation { source, .. } = error else {
///         return false;
///     };
///
///     matches!(source.downcast_ref::<Error>(), Some(Error::OnOpenState))
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option failed validation during construction.
    #[error("invalid option provided for {name}: {message}")]
    InvalidOption {
        /// The option that failed validation.
        name: &'static str,
        /// Why the provided value was rejected.
        message: &'static str,
    },

    /// A state outside the three real breaker states was provided.
    #[error("unknown state({state}) provided, the allowed states are 'close', 'half-open' and 'open'")]
    UnknownState {
        /// The rejected state.
        state: State,
    },

    /// A trip targeted the state the breaker is already in. The breaker is
    /// unchanged and no handlers ran.
    #[error("circuit breaker({name}) is already in the desired state({state})")]
    AlreadyInDesiredState {
        /// The breaker's name.
        name: String,
        /// The state the breaker already occupies.
        state: State,
    },

    /// The open-state invoker rejected the call without running the
    /// operation.
    #[error("is on open state")]
    OnOpenState,

    /// The breaker-imposed deadline expired before the operation completed.
    #[error("invocation timeout on {duration:?}")]
    InvocationTimeout {
        /// The deadline that expired.
        duration: Duration,
    },

    /// The reason an opener policy passes to the reset timer when tripping
    /// the breaker open.
    #[error("failure threshold reached")]
    FailureThresholdReached,

    /// Wraps every error surfaced from [`Breaker::run`][crate::Breaker::run]:
    /// operation errors, restrictor rejections, timeouts, and open-state
    /// rejections.
    #[error("circuit breaker({name}) invocation failed with {source}")]
    Invocation {
        /// The breaker's name.
        name: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Error: Send, Sync);
    }

    #[test]
    fn display_forms() {
        let error = Error::InvalidOption {
            name: "invocation timeout",
            message: "must be a positive duration",
        };
        assert_eq!(
            error.to_string(),
            "invalid option provided for invocation timeout: must be a positive duration"
        );

        let error = Error::UnknownState { state: State::Unknown };
        assert_eq!(
            error.to_string(),
            "unknown state(unknown) provided, the allowed states are 'close', 'half-open' and 'open'"
        );

        let error = Error::AlreadyInDesiredState {
            name: "api".to_owned(),
            state: State::Open,
        };
        assert_eq!(error.to_string(), "circuit breaker(api) is already in the desired state(open)");

        assert_eq!(Error::OnOpenState.to_string(), "is on open state");

        let error = Error::InvocationTimeout {
            duration: Duration::from_secs(5),
        };
        assert_eq!(error.to_string(), "invocation timeout on 5s");

        assert_eq!(Error::FailureThresholdReached.to_string(), "failure threshold reached");
    }

    #[test]
    fn invocation_wraps_and_exposes_the_cause() {
        let error = Error::Invocation {
            name: "api".to_owned(),
            source: Box::new(Error::OnOpenState),
        };

        assert_eq!(error.to_string(), "circuit breaker(api) invocation failed with is on open state");

        let source = error.source().expect("invocation errors carry a source");
        assert!(matches!(source.downcast_ref::<Error>(), Some(Error::OnOpenState)));
    }
}
