// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An optioned circuit breaker for guarding remote or otherwise-fallible
//! operations on the call path of a concurrent service.
//!
//! A [`Breaker`] wraps each outbound invocation and, based on a rolling
//! window of recent outcomes, either executes the call under a deadline,
//! admits it in a trial capacity, or rejects it outright:
//!
//! - **Closed** — normal operation. Calls run under the invocation
//!   deadline; the opener policy trips the breaker open when the success
//!   ratio over recent requests drops below its floor.
//! - **Open** — refusing calls. Operations are never run; after the
//!   reset-timer delay the breaker moves to half-open on its own.
//! - **Half-Open** — probing recovery. Calls run again; the closer policy
//!   closes the breaker on sustained success, the half-open opener re-opens
//!   it on renewed failure.
//!
//! Every component is optional with defaults: the bucketed time-window
//! [`Counter`], the [`ResetTimer`] delay policy, the invocation deadline,
//! the auto-trip thresholds, [`Restrictor`]s such as
//! [`ConcurrentRunRestrictor`], and the failure / success / state-change
//! handler chains for observability.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use tripwire::{Breaker, BoxError, State};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker: Breaker<String> = Breaker::builder("tweets")
//!     .invocation_timeout(Duration::from_millis(250))
//!     .opener(State::Closed, 95.0, 20)
//!     .on_failure(State::Closed, |execution, error| {
//!         eprintln!("call failed in {}: {error} ({:?})", execution.state, execution.stats);
//!     })
//!     .build()
//!     .unwrap();
//!
//! match breaker.run(|| async { fetch_tweet(1).await }).await {
//!     Ok(tweet) => println!("{tweet}"),
//!     Err(error) => {
//!         // rejected, timed out, or failed; maybe serve a cached value
//!         let _ = error;
//!     }
//! }
//! # }
//!
//! async fn fetch_tweet(id: u64) -> Result<String, BoxError> {
//!     Ok(format!("tweet #{id}"))
//! }
//! ```
//!
//! # Concurrency
//!
//! [`Breaker`] is a cheap-to-clone handle; clones share all state, and a
//! breaker is expected to be shared across many concurrent callers. A call
//! runs under the state snapshot taken when it entered
//! [`run`][Breaker::run]; transitions landing mid-flight never re-route it.
//! Handler chains run synchronously on the calling thread in declared
//! order.
//!
//! # Runtime
//!
//! The open → half-open re-entry and the default counter's bucket rotation
//! are scheduled on background Tokio tasks, so breakers must be built and
//! used inside a Tokio runtime.

mod breaker;
mod builder;
mod counter;
mod error;
mod handler;
mod invoker;
mod policy;
mod reset_timer;
mod restrictor;
mod state;
mod stats;

pub use breaker::Breaker;
pub use builder::BreakerBuilder;
pub use counter::{Counter, TimeBucketCounter};
pub use error::{BoxError, Error};
pub use handler::Execution;
pub use reset_timer::{ConstantTimer, ResetTimer};
pub use restrictor::{ConcurrentRunRestrictor, ConcurrentRunThresholdError, Restrictor};
pub use state::State;
pub use stats::{METRIC_FAILURE, METRIC_REJECT, METRIC_SUCCESS, METRIC_TIMEOUT, Stats};
