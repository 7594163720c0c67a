//! End-of-run summary printed to stdout.

use std::fmt;

use crate::driver::RunSummary;
use crate::metrics::{CheckSummary, TrendStats};

/// Process exit status when the run completed but a threshold was crossed.
pub const THRESHOLDS_FAILED_EXIT: u8 = 99;

const LABEL_WIDTH: usize = 30;

fn label(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    write!(f, "     {:.<width$}: ", name, width = LABEL_WIDTH)
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn write_check(f: &mut fmt::Formatter<'_>, check: &CheckSummary) -> fmt::Result {
    let c = &check.counts;
    if c.fails == 0 {
        writeln!(f, "     ✓ {}", check.name)
    } else {
        writeln!(f, "     ✗ {}", check.name)?;
        writeln!(
            f,
            "      ↳  {:.0}% ✓ {} / ✗ {}",
            percent(c.passes, c.total()),
            c.passes,
            c.fails
        )
    }
}

fn write_trend(f: &mut fmt::Formatter<'_>, name: &str, t: &TrendStats) -> fmt::Result {
    label(f, name)?;
    writeln!(
        f,
        "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
        t.avg_ms, t.min_ms, t.med_ms, t.max_ms, t.p90_ms, t.p95_ms
    )
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        let secs = m.elapsed.as_secs_f64().max(f64::EPSILON);

        writeln!(f)?;
        writeln!(
            f,
            "  team: {}  vus: {}  elapsed: {:.1}s",
            self.team_name,
            self.vus,
            m.elapsed.as_secs_f64()
        )?;
        if self.interrupted {
            writeln!(f, "  run interrupted before the configured duration")?;
        }
        writeln!(f)?;

        for check in &m.checks {
            write_check(f, check)?;
        }
        writeln!(f)?;

        let passed = m.checks_passed();
        let failed = m.checks_failed();
        label(f, "checks")?;
        writeln!(f, "{:.2}% ✓ {} ✗ {}", percent(passed, passed + failed), passed, failed)?;

        write_trend(f, "http_req_duration", &m.http_req_duration)?;

        label(f, "http_req_failed")?;
        writeln!(
            f,
            "{:.2}% ✓ {} ✗ {}",
            m.http_req_failed_rate() * 100.0,
            m.http_req_failed,
            m.http_reqs - m.http_req_failed
        )?;

        label(f, "http_reqs")?;
        writeln!(f, "{} {:.2}/s", m.http_reqs, m.http_reqs as f64 / secs)?;

        write_trend(f, "iteration_duration", &m.iteration_duration)?;

        label(f, "iterations")?;
        writeln!(f, "{} {:.2}/s", m.iterations, m.iterations_per_second())?;

        if !self.verdict.results.is_empty() {
            writeln!(f)?;
            writeln!(f, "  thresholds")?;
            for result in &self.verdict.results {
                writeln!(f, "     {result}")?;
            }
        }

        writeln!(f)?;
        let verdict = if self.passed() { "PASSED" } else { "FAILED" };
        writeln!(f, "  verdict: {verdict}")
    }
}

#[cfg(test)]
mod tests {
    use crate::driver::RunSummary;
    use crate::metrics::{CallOutcome, MetricsCollector};
    use crate::thresholds::{Threshold, Verdict};
    use std::time::Duration;

    fn summary(status: u16) -> RunSummary {
        let metrics = MetricsCollector::new().unwrap();
        metrics.record_check("team created 201", true);
        metrics.record_check("create PR 201", status == 201);
        metrics.record_request(&CallOutcome {
            status: Some(status),
            elapsed: Duration::from_millis(40),
        });
        metrics.record_iteration(Duration::from_millis(1_040));
        let snap = metrics.snapshot();
        let thresholds = vec![Threshold::parse("http_req_failed", "rate<0.001").unwrap()];
        RunSummary {
            team_name: "loadtest-1".into(),
            vus: 1,
            verdict: Verdict::evaluate(&thresholds, &snap),
            metrics: snap,
            interrupted: false,
        }
    }

    #[test]
    fn renders_checks_metrics_and_verdict() {
        let text = summary(201).to_string();
        assert!(text.contains("✓ team created 201"));
        assert!(text.contains("✓ create PR 201"));
        assert!(text.contains("http_req_duration"));
        assert!(text.contains("iterations"));
        assert!(text.contains("✓ http_req_failed rate<0.001"));
        assert!(text.contains("verdict: PASSED"));
    }

    #[test]
    fn renders_failed_check_breakdown() {
        let text = summary(500).to_string();
        assert!(text.contains("✗ create PR 201"));
        assert!(text.contains("✓ 0 / ✗ 1"));
        assert!(text.contains("verdict: FAILED"));
    }
}
