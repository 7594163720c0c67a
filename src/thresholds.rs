//! Pass/fail thresholds evaluated once against the final metrics.
//!
//! Expressions use the familiar `<aggregation><op><value>` form, e.g.
//! `p(95)<300` on `http_req_duration` (milliseconds) or `rate<0.001` on
//! `http_req_failed`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LoadTestError, Result};
use crate::metrics::{
    percentile_ms, MetricsSnapshot, CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATION_DURATION,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Trend,
    Rate,
}

fn metric_kind(metric: &str) -> Option<MetricKind> {
    match metric {
        HTTP_REQ_DURATION | ITERATION_DURATION => Some(MetricKind::Trend),
        HTTP_REQ_FAILED | CHECKS => Some(MetricKind::Rate),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        write!(
            f,
            "{mark} {} {} (observed {:.4})",
            self.metric, self.expression, self.observed
        )
    }
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self> {
        let invalid = |reason: &str| LoadTestError::InvalidThreshold {
            metric: metric.to_string(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let kind = metric_kind(metric).ok_or_else(|| invalid("unknown metric"))?;
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

        let op_pos = compact
            .find(|c: char| c == '<' || c == '>')
            .ok_or_else(|| invalid("missing comparison operator"))?;
        let (lhs, rest) = compact.split_at(op_pos);
        let (comparison, rhs) = if let Some(v) = rest.strip_prefix("<=") {
            (Comparison::Le, v)
        } else if let Some(v) = rest.strip_prefix(">=") {
            (Comparison::Ge, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (Comparison::Lt, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (Comparison::Gt, v)
        } else {
            return Err(invalid("missing comparison operator"));
        };

        let aggregation = match lhs {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "rate" => Aggregation::Rate,
            _ => {
                let inner = lhs
                    .strip_prefix("p(")
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(|| invalid("unknown aggregation"))?;
                let p: f64 = inner.parse().map_err(|_| invalid("percentile is not a number"))?;
                if !(p > 0.0 && p <= 100.0) {
                    return Err(invalid("percentile must be in (0, 100]"));
                }
                Aggregation::Percentile(p)
            }
        };

        match (kind, aggregation) {
            (MetricKind::Rate, Aggregation::Rate) => {}
            (MetricKind::Rate, _) => return Err(invalid("rate metrics only support `rate`")),
            (MetricKind::Trend, Aggregation::Rate) => {
                return Err(invalid("`rate` is not defined for duration metrics"))
            }
            (MetricKind::Trend, _) => {}
        }

        let bound: f64 = rhs.parse().map_err(|_| invalid("bound is not a number"))?;
        if !bound.is_finite() {
            return Err(invalid("bound must be finite"));
        }

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            aggregation,
            comparison,
            bound,
        })
    }

    /// Metrics without samples evaluate as 0.
    pub fn observe(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self.aggregation {
            Aggregation::Rate => match self.metric.as_str() {
                HTTP_REQ_FAILED => snapshot.http_req_failed_rate(),
                CHECKS => snapshot.checks_rate(),
                _ => 0.0,
            },
            agg => {
                let Some(hist) = snapshot.trend_histogram(&self.metric) else {
                    return 0.0;
                };
                if hist.is_empty() {
                    return 0.0;
                }
                match agg {
                    Aggregation::Avg => hist.mean() / 1_000.0,
                    Aggregation::Min => hist.min() as f64 / 1_000.0,
                    Aggregation::Max => hist.max() as f64 / 1_000.0,
                    Aggregation::Med => percentile_ms(hist, 50.0),
                    Aggregation::Percentile(p) => percentile_ms(hist, p),
                    Aggregation::Rate => 0.0,
                }
            }
        }
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdResult {
        let observed = self.observe(snapshot);
        ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            observed,
            passed: self.comparison.holds(observed, self.bound),
        }
    }
}

/// Parse every configured expression; fails on the first invalid one.
pub fn parse_all(config: &BTreeMap<String, Vec<String>>) -> Result<Vec<Threshold>> {
    config
        .iter()
        .flat_map(|(metric, exprs)| exprs.iter().map(move |e| Threshold::parse(metric, e)))
        .collect()
}

/// Overall run verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub results: Vec<ThresholdResult>,
}

impl Verdict {
    pub fn evaluate(thresholds: &[Threshold], snapshot: &MetricsSnapshot) -> Self {
        Self {
            results: thresholds.iter().map(|t| t.evaluate(snapshot)).collect(),
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}
