// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

/// Metric name recorded for every successful invocation.
pub const METRIC_SUCCESS: &str = "success";

/// Metric name recorded for every failed invocation, including timeouts and
/// restrictor rejections.
pub const METRIC_FAILURE: &str = "failure";

/// Metric name recorded when the breaker-imposed deadline expires.
pub const METRIC_TIMEOUT: &str = "timeout";

/// Metric name recorded when a restrictor or the open-state invoker rejects
/// a call.
pub const METRIC_REJECT: &str = "reject";

/// A point-in-time view of the invocation metrics of a breaker.
///
/// Timeouts and rejections are folded into [`failure_count`][Self::failure_count]
/// as well as being tracked under their own counts, so
/// `success_count + failure_count` overcounts calls by `reject_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Successful invocations in the counter window.
    pub success_count: u32,
    /// Failed invocations in the counter window, timeouts and rejections
    /// included.
    pub failure_count: u32,
    /// Invocations that hit the breaker-imposed deadline.
    pub timeout_count: u32,
    /// Invocations rejected before the operation ran.
    pub reject_count: u32,
}

impl Stats {
    /// Builds a snapshot from a counter's metric map, treating absent
    /// metrics as zero.
    pub(crate) fn from_metrics(metrics: &HashMap<String, u32>) -> Self {
        let count = |name: &str| metrics.get(name).copied().unwrap_or(0);

        Self {
            success_count: count(METRIC_SUCCESS),
            failure_count: count(METRIC_FAILURE),
            timeout_count: count(METRIC_TIMEOUT),
            reject_count: count(METRIC_REJECT),
        }
    }
}
