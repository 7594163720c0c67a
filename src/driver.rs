use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{HttpReviewClient, ReviewService};
use crate::config::Config;
use crate::error::{LoadTestError, Result};
use crate::fixture::SetupData;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::scenario::PrFlow;
use crate::setup;
use crate::thresholds::{parse_all, Threshold, Verdict};

/// Everything a finished run reports.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub team_name: String,
    pub vus: usize,
    pub metrics: MetricsSnapshot,
    pub verdict: Verdict,
    /// Stopped by a shutdown signal before the configured duration.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

/// Setup once, then `vus` virtual users looping the PR flow until the
/// duration elapses.
pub struct LoadTest {
    cfg: Config,
    thresholds: Vec<Threshold>,
    metrics: MetricsCollector,
    api: Arc<dyn ReviewService>,
}

impl LoadTest {
    pub fn new(cfg: Config) -> Result<Self> {
        let metrics = MetricsCollector::new()?;
        let api = Arc::new(HttpReviewClient::new(cfg.target.clone(), metrics.clone())?);
        Self::with_service(cfg, api, metrics)
    }

    /// Run against any `ReviewService`; `metrics` must be the collector that
    /// service reports requests to, if any.
    pub fn with_service(
        cfg: Config,
        api: Arc<dyn ReviewService>,
        metrics: MetricsCollector,
    ) -> Result<Self> {
        cfg.validate()?;
        let thresholds = parse_all(&cfg.thresholds)?;
        Ok(Self {
            cfg,
            thresholds,
            metrics,
            api,
        })
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunSummary> {
        let load = &self.cfg.load;
        info!(
            base_url = %self.cfg.target.base_url,
            vus = load.vus,
            duration_seconds = load.duration_seconds,
            "starting load test"
        );

        // Setup completes before any virtual user is spawned.
        let data = Arc::new(setup::provision(self.api.as_ref(), &self.cfg.fixture, &self.metrics).await?);

        let flow = Arc::new(PrFlow::new(
            self.api.clone(),
            self.metrics.clone(),
            self.cfg.fixture.pull_request_name.clone(),
            load.pause(),
        ));

        let progress_stop = CancellationToken::new();
        let progress = (self.cfg.report.interval_seconds > 0).then(|| {
            tokio::spawn(report_progress(
                self.metrics.clone(),
                Duration::from_secs(self.cfg.report.interval_seconds),
                progress_stop.clone(),
            ))
        });

        // Rates are measured over the load phase only.
        self.metrics.restart_clock();
        let deadline = load.deadline_from(Instant::now()).ok_or_else(|| {
            LoadTestError::InvalidConfig(format!(
                "load.duration_seconds is out of range: {}",
                load.duration_seconds
            ))
        })?;
        let mut users = JoinSet::new();
        for vu in 1..=load.vus {
            users.spawn(virtual_user(
                vu,
                flow.clone(),
                data.clone(),
                deadline,
                shutdown.clone(),
            ));
        }

        let mut completed = 0u64;
        while let Some(joined) = users.join_next().await {
            match joined {
                Ok(iterations) => completed += iterations,
                Err(e) => warn!(error=%e, "virtual user task failed"),
            }
        }

        progress_stop.cancel();
        if let Some(handle) = progress {
            if let Err(e) = handle.await {
                warn!(error=%e, "progress reporter failed");
            }
        }

        let metrics = self.metrics.snapshot();
        let verdict = Verdict::evaluate(&self.thresholds, &metrics);
        for failed in verdict.failures() {
            warn!(
                metric = %failed.metric,
                threshold = %failed.expression,
                observed = failed.observed,
                "threshold crossed"
            );
        }
        info!(
            iterations = completed,
            http_reqs = metrics.http_reqs,
            checks_failed = metrics.checks_failed(),
            passed = verdict.passed(),
            "load test finished"
        );

        Ok(RunSummary {
            team_name: data.team_name.clone(),
            vus: load.vus,
            metrics,
            verdict,
            interrupted: shutdown.is_cancelled(),
        })
    }
}

/// Loop iterations until the deadline or shutdown. The deadline is only
/// checked between iterations, so an in-flight iteration always completes.
async fn virtual_user(
    vu: usize,
    flow: Arc<PrFlow<dyn ReviewService>>,
    data: Arc<SetupData>,
    deadline: Instant,
    shutdown: CancellationToken,
) -> u64 {
    if data.user_ids.is_empty() {
        warn!(vu, "fixture has no user ids, virtual user not started");
        return 0;
    }
    let mut rng = StdRng::from_entropy();
    let mut iterations = 0;
    while Instant::now() < deadline && !shutdown.is_cancelled() {
        flow.run_iteration(vu, &data, &mut rng, &shutdown).await;
        iterations += 1;
    }
    debug!(vu, iterations, "virtual user finished");
    iterations
}

async fn report_progress(metrics: MetricsCollector, every: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snap = metrics.snapshot();
                info!(
                    elapsed_seconds = snap.elapsed.as_secs(),
                    iterations = snap.iterations,
                    http_reqs = snap.http_reqs,
                    http_req_failed_rate = snap.http_req_failed_rate(),
                    p95_ms = snap.http_req_duration.p95_ms,
                    checks_failed = snap.checks_failed(),
                    "progress"
                );
            }
            _ = stop.cancelled() => break,
        }
    }
}
