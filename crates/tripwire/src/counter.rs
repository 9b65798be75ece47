// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::Error;

/// Records invocation metrics for a breaker.
///
/// The breaker increments the four metric names
/// ([`METRIC_SUCCESS`][crate::METRIC_SUCCESS] and friends) and reads them
/// back as a window total. Implementations decide
/// what "window" means; the default [`TimeBucketCounter`] keeps a sliding
/// time window so that old outcomes stop influencing trip decisions.
///
/// `increment`, `stats`, and `reset` may be called concurrently from many
/// threads; reads must observe a consistent total.
pub trait Counter: Send + Sync {
    /// Increments the named metric by one.
    fn increment(&self, metric: &str);

    /// Returns the current window totals for the given metric names.
    ///
    /// The returned map is an independent copy; later counter mutations do
    /// not affect it. Metrics that were never incremented report zero.
    fn stats(&self, metrics: &[&str]) -> HashMap<String, u32>;

    /// Zeroes all metrics and restarts any window schedule.
    fn reset(&self);
}

type Bucket = HashMap<String, u32>;

/// The ring of buckets plus the running aggregate across all of them.
#[derive(Debug, Default)]
struct Window {
    aggregate: Bucket,
    buckets: VecDeque<Bucket>,
}

impl Window {
    fn increment(&mut self, metric: &str) {
        let total = self.aggregate.entry(metric.to_owned()).or_insert(0);
        *total = total.saturating_add(1);

        if let Some(tail) = self.buckets.back_mut() {
            let count = tail.entry(metric.to_owned()).or_insert(0);
            *count = count.saturating_add(1);
        }
    }

    /// Drops the oldest bucket out of the aggregate, shifts the ring, and
    /// installs an empty tail bucket.
    fn rotate(&mut self) {
        if let Some(oldest) = self.buckets.pop_front() {
            for (metric, count) in oldest {
                if let Some(total) = self.aggregate.get_mut(&metric) {
                    *total = total.saturating_sub(count);
                }
            }
        }

        self.buckets.push_back(Bucket::new());
    }

    fn clear(&mut self, capacity: usize) {
        self.aggregate.clear();
        self.buckets.clear();
        self.buckets.extend(std::iter::repeat_with(Bucket::new).take(capacity));
    }
}

/// A capped bucket counter that drops stale buckets on a fixed cadence.
///
/// The counter keeps `capacity` buckets, each `duration` wide. Increments
/// land in the newest bucket and in a running aggregate; every `duration`
/// the oldest bucket is subtracted from the aggregate and discarded. A
/// metric recorded now therefore survives for at least
/// `(capacity - 1) * duration` and at most `capacity * duration`.
///
/// This is the breaker's default counter, configured as 10 buckets of one
/// second each.
///
/// # Runtime
///
/// The rotation schedule runs on a background task, so the counter must be
/// created inside a Tokio runtime. Dropping the counter stops the task.
#[derive(Debug)]
pub struct TimeBucketCounter {
    window: Arc<Mutex<Window>>,
    capacity: usize,
    duration: Duration,
    rotation: Mutex<Option<AbortHandle>>,
}

impl TimeBucketCounter {
    /// Creates a counter with `capacity` buckets of `duration` each and
    /// starts its rotation schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] when `capacity` is zero or
    /// `duration` is shorter than one second.
    pub fn new(capacity: usize, duration: Duration) -> Result<Self, Error> {
        if capacity < 1 {
            return Err(Error::InvalidOption {
                name: "time bucket counter capacity",
                message: "must be a positive integer",
            });
        }

        if duration < Duration::from_secs(1) {
            return Err(Error::InvalidOption {
                name: "time bucket counter duration",
                message: "must be at least one second",
            });
        }

        let counter = Self {
            window: Arc::new(Mutex::new(Window::default())),
            capacity,
            duration,
            rotation: Mutex::new(None),
        };
        counter.reset();

        Ok(counter)
    }

    /// Spawns the task that rotates the window once per bucket duration.
    /// Each fire arms the next one; the task unwinds itself once the window
    /// is gone.
    fn arm_rotation(&self) -> AbortHandle {
        let window: Weak<Mutex<Window>> = Arc::downgrade(&self.window);
        let period = self.duration;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;

                let Some(window) = window.upgrade() else {
                    break;
                };
                window.lock().rotate();
            }
        })
        .abort_handle()
    }
}

impl Counter for TimeBucketCounter {
    fn increment(&self, metric: &str) {
        self.window.lock().increment(metric);
    }

    fn stats(&self, metrics: &[&str]) -> HashMap<String, u32> {
        let window = self.window.lock();

        metrics
            .iter()
            .map(|metric| ((*metric).to_owned(), window.aggregate.get(*metric).copied().unwrap_or(0)))
            .collect()
    }

    fn reset(&self) {
        self.window.lock().clear(self.capacity);

        let mut rotation = self.rotation.lock();
        if let Some(task) = rotation.take() {
            task.abort();
        }
        *rotation = Some(self.arm_rotation());
    }
}

impl Drop for TimeBucketCounter {
    fn drop(&mut self) {
        if let Some(task) = self.rotation.lock().take() {
            task.abort();
        }
    }
}
