// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Weak;

use crate::breaker::Core;
use crate::handler::{Execution, FailureHandler, SuccessHandler};
use crate::{Error, State, Stats};

/// Thresholds for one auto-trip policy.
///
/// `min_success_ratio` is a percentage in `(0, 100]`; `min_requests` guards
/// the ratio against being judged on too small a sample.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TripPolicy {
    pub min_success_ratio: f64,
    pub min_requests: u32,
}

impl TripPolicy {
    pub fn validate(self, option: &'static str) -> Result<(), Error> {
        if self.min_success_ratio <= 0.0 || self.min_success_ratio > 100.0 {
            return Err(Error::InvalidOption {
                name: option,
                message: "min success ratio must be greater than 0 and at most 100",
            });
        }

        if self.min_requests < 1 {
            return Err(Error::InvalidOption {
                name: option,
                message: "min requests must be a positive integer",
            });
        }

        Ok(())
    }
}

/// The requests that actually exercised the guarded dependency.
///
/// Rejections are subtracted because they increment both `failure` and
/// `reject` without running the operation; timeouts are already folded into
/// `failure`.
fn requests(stats: Stats) -> u64 {
    (u64::from(stats.success_count) + u64::from(stats.failure_count)).saturating_sub(u64::from(stats.reject_count))
}

fn success_ratio(stats: Stats, requests: u64) -> f64 {
    f64::from(stats.success_count) / requests as f64 * 100.0
}

/// Builds the failure handler that trips a breaker open once the success
/// ratio over the attached stats snapshot drops below the policy's floor.
///
/// Installed at the head of the failure chain for the closed and half-open
/// states. The trip is best-effort: another thread may have transitioned
/// first, and that error is swallowed.
pub(crate) fn opener<T: 'static>(core: Weak<Core<T>>, policy: TripPolicy) -> FailureHandler {
    Box::new(move |execution: &Execution, _error: &Error| {
        let requests = requests(execution.stats);
        if requests < u64::from(policy.min_requests) {
            return;
        }

        if success_ratio(execution.stats, requests) < policy.min_success_ratio {
            if let Some(core) = core.upgrade() {
                let _ = core.trip(State::Open, Some(Box::new(Error::FailureThresholdReached)));
            }
        }
    })
}

/// Builds the success handler that closes a half-open breaker once the
/// success ratio meets the policy's target.
///
/// Installed at the head of the success chain for the half-open state, with
/// the same best-effort trip semantics as [`opener`].
pub(crate) fn closer<T: 'static>(core: Weak<Core<T>>, policy: TripPolicy) -> SuccessHandler<T> {
    Box::new(move |execution: &Execution, _result: &T| {
        let requests = requests(execution.stats);
        if requests < u64::from(policy.min_requests) {
            return;
        }

        if success_ratio(execution.stats, requests) >= policy.min_success_ratio {
            if let Some(core) = core.upgrade() {
                let _ = core.trip(State::Closed, None);
            }
        }
    })
}
