// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::{BoxError, Error};

/// A pre-invocation gate that can block a call without affecting the
/// breaker's state.
///
/// Restrictors are consulted in declared order at the start of every
/// [`Breaker::run`][crate::Breaker::run]. A `check` that returns an error is
/// a rejection: the call is not dispatched, the `reject` metric is
/// incremented, and the failure handlers of the current state run with the
/// wrapped cause.
///
/// For every `check` that was entered, [`defer`][Self::defer] runs exactly
/// once when the call exits — on every path, in reverse declaration order —
/// so restrictors can pair acquire/release style accounting across the
/// invocation.
pub trait Restrictor: Send + Sync {
    /// Decides whether the invocation may proceed. An `Err` rejects the
    /// call and carries the reason.
    fn check(&self) -> Result<(), BoxError>;

    /// Runs the restrictor's exit rules after the invocation finished.
    fn defer(&self);
}

/// A restrictor that caps the number of concurrently running invocations.
///
/// Each entered [`check`][Restrictor::check] counts as one run until the
/// matching [`defer`][Restrictor::defer]; a check beyond the threshold is
/// rejected with [`ConcurrentRunThresholdError`].
#[derive(Debug)]
pub struct ConcurrentRunRestrictor {
    name: String,
    current: AtomicI64,
    threshold: i64,
}

impl ConcurrentRunRestrictor {
    /// Creates a restrictor that allows up to `threshold` concurrent runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] when `threshold` is zero.
    pub fn new(name: impl Into<String>, threshold: u32) -> Result<Self, Error> {
        if threshold < 1 {
            return Err(Error::InvalidOption {
                name: "concurrent run threshold",
                message: "must be a positive integer",
            });
        }

        Ok(Self {
            name: name.into(),
            current: AtomicI64::new(0),
            threshold: i64::from(threshold),
        })
    }
}

impl Restrictor for ConcurrentRunRestrictor {
    fn check(&self) -> Result<(), BoxError> {
        if self.current.fetch_add(1, Ordering::AcqRel) + 1 > self.threshold {
            return Err(Box::new(ConcurrentRunThresholdError {
                name: self.name.clone(),
                threshold: self.threshold,
            }));
        }

        Ok(())
    }

    fn defer(&self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The rejection produced by a [`ConcurrentRunRestrictor`] at capacity.
#[derive(Debug, thiserror::Error)]
#[error("concurrent run restriction({name}) threshold reached / runs: {threshold}")]
pub struct ConcurrentRunThresholdError {
    name: String,
    threshold: i64,
}
