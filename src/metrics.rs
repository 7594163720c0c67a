//! Run metrics: named checks plus the built-in HTTP and iteration metrics
//! that thresholds are evaluated against.

use hdrhistogram::Histogram;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{LoadTestError, Result};

pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const CHECKS: &str = "checks";
pub const ITERATION_DURATION: &str = "iteration_duration";

/// Result of one request as seen by the load generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    /// `None` when the request never produced a response.
    pub status: Option<u16>,
    pub elapsed: Duration,
}

impl CallOutcome {
    pub fn status_is(&self, expected: u16) -> bool {
        self.status == Some(expected)
    }

    /// Failed for `http_req_failed`: transport error or a status outside 200-399.
    pub fn is_failed(&self) -> bool {
        !matches!(self.status, Some(200..=399))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

impl CheckCounts {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckSummary {
    pub name: String,
    pub counts: CheckCounts,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendStats {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub med_ms: f64,
    pub max_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Point-in-time copy of everything collected so far.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub elapsed: Duration,
    pub checks: Vec<CheckSummary>,
    pub http_reqs: u64,
    pub http_req_failed: u64,
    pub http_req_duration: TrendStats,
    pub iterations: u64,
    pub iteration_duration: TrendStats,
    // Raw histograms, kept for arbitrary percentiles in thresholds.
    pub(crate) http_histogram: Histogram<u64>,
    pub(crate) iteration_histogram: Histogram<u64>,
}

impl MetricsSnapshot {
    pub fn http_req_failed_rate(&self) -> f64 {
        ratio(self.http_req_failed, self.http_reqs)
    }

    pub fn checks_passed(&self) -> u64 {
        self.checks.iter().map(|c| c.counts.passes).sum()
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks.iter().map(|c| c.counts.fails).sum()
    }

    pub fn checks_rate(&self) -> f64 {
        let passed = self.checks_passed();
        ratio(passed, passed + self.checks_failed())
    }

    pub fn check(&self, name: &str) -> Option<&CheckCounts> {
        self.checks.iter().find(|c| c.name == name).map(|c| &c.counts)
    }

    /// Request duration at `percentile` (0-100), in milliseconds.
    pub fn http_req_duration_percentile(&self, percentile: f64) -> f64 {
        percentile_ms(&self.http_histogram, percentile)
    }

    pub(crate) fn trend_histogram(&self, metric: &str) -> Option<&Histogram<u64>> {
        match metric {
            HTTP_REQ_DURATION => Some(&self.http_histogram),
            ITERATION_DURATION => Some(&self.iteration_histogram),
            _ => None,
        }
    }

    pub fn iterations_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.iterations as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Default)]
struct Counters {
    checks: Vec<CheckSummary>,
    http_reqs: u64,
    http_req_failed: u64,
    iterations: u64,
}

/// Thread-safe collector shared by setup and every virtual user.
#[derive(Clone)]
pub struct MetricsCollector {
    counters: Arc<RwLock<Counters>>,
    http_durations: Arc<Mutex<Histogram<u64>>>,
    iteration_durations: Arc<Mutex<Histogram<u64>>>,
    start_time: Arc<Mutex<Instant>>,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            counters: Arc::new(RwLock::new(Counters::default())),
            http_durations: Arc::new(Mutex::new(new_histogram()?)),
            iteration_durations: Arc::new(Mutex::new(new_histogram()?)),
            start_time: Arc::new(Mutex::new(Instant::now())),
        })
    }

    /// Measure `elapsed` (and every per-second rate) from now on.
    pub fn restart_clock(&self) {
        *self.start_time.lock() = Instant::now();
    }

    /// Record a named check. Checks keep the order in which they first appear.
    pub fn record_check(&self, name: &str, passed: bool) {
        let mut counters = self.counters.write();
        let idx = match counters.checks.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                counters.checks.push(CheckSummary {
                    name: name.to_string(),
                    counts: CheckCounts::default(),
                });
                counters.checks.len() - 1
            }
        };
        let counts = &mut counters.checks[idx].counts;
        if passed {
            counts.passes += 1;
        } else {
            counts.fails += 1;
        }
    }

    pub fn record_request(&self, outcome: &CallOutcome) {
        {
            let mut counters = self.counters.write();
            counters.http_reqs += 1;
            if outcome.is_failed() {
                counters.http_req_failed += 1;
            }
        }
        // Auto-resizing; a failed record is dropped.
        let _ = self.http_durations.lock().record(as_micros(outcome.elapsed));
    }

    pub fn record_iteration(&self, elapsed: Duration) {
        self.counters.write().iterations += 1;
        let _ = self.iteration_durations.lock().record(as_micros(elapsed));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (checks, http_reqs, http_req_failed, iterations) = {
            let c = self.counters.read();
            (c.checks.clone(), c.http_reqs, c.http_req_failed, c.iterations)
        };
        let http_histogram = self.http_durations.lock().clone();
        let iteration_histogram = self.iteration_durations.lock().clone();
        MetricsSnapshot {
            elapsed: self.start_time.lock().elapsed(),
            checks,
            http_reqs,
            http_req_failed,
            http_req_duration: trend(&http_histogram),
            iterations,
            iteration_duration: trend(&iteration_histogram),
            http_histogram,
            iteration_histogram,
        }
    }
}

fn new_histogram() -> Result<Histogram<u64>> {
    // Auto-resizing, 3 significant digits.
    Histogram::new(3).map_err(|e| LoadTestError::Metrics(format!("{e:?}")))
}

fn trend(hist: &Histogram<u64>) -> TrendStats {
    if hist.is_empty() {
        return TrendStats::default();
    }
    TrendStats {
        count: hist.len(),
        avg_ms: hist.mean() / 1_000.0,
        min_ms: micros_to_ms(hist.min()),
        med_ms: micros_to_ms(hist.value_at_quantile(0.50)),
        max_ms: micros_to_ms(hist.max()),
        p90_ms: micros_to_ms(hist.value_at_quantile(0.90)),
        p95_ms: micros_to_ms(hist.value_at_quantile(0.95)),
        p99_ms: micros_to_ms(hist.value_at_quantile(0.99)),
    }
}

pub(crate) fn percentile_ms(hist: &Histogram<u64>, percentile: f64) -> f64 {
    if hist.is_empty() {
        return 0.0;
    }
    micros_to_ms(hist.value_at_percentile(percentile))
}

fn as_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

fn micros_to_ms(v: u64) -> f64 {
    v as f64 / 1_000.0
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
