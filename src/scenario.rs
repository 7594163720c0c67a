//! The per-iteration PR flow executed by every virtual user.

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::ReviewService;
use crate::fixture::SetupData;
use crate::metrics::MetricsCollector;
use crate::pull_request::{select_author, PullRequest};

pub const CHECK_CREATE_PR: &str = "create PR 201";
pub const CHECK_GET_REVIEW: &str = "getReview 200";
pub const CHECK_STATS: &str = "stats 200";

/// Create a PR, read the author's review queue, read reviewer stats, pause.
pub struct PrFlow<S: ?Sized> {
    api: Arc<S>,
    metrics: MetricsCollector,
    pull_request_name: String,
    pause: Duration,
}

impl<S: ReviewService + ?Sized> PrFlow<S> {
    pub fn new(
        api: Arc<S>,
        metrics: MetricsCollector,
        pull_request_name: String,
        pause: Duration,
    ) -> Self {
        Self {
            api,
            metrics,
            pull_request_name,
            pause,
        }
    }

    /// One iteration for virtual user `vu` (1-based).
    ///
    /// The three calls run in order and each is checked on its own; a failed
    /// step never skips the next one. Only `shutdown` cuts the pause short.
    pub async fn run_iteration<R: Rng + Send>(
        &self,
        vu: usize,
        data: &SetupData,
        rng: &mut R,
        shutdown: &CancellationToken,
    ) {
        let started = Instant::now();

        let Some(author_id) = select_author(&data.user_ids, rng) else {
            warn!(vu, "fixture has no user ids, skipping iteration");
            return;
        };
        let pr = PullRequest::new(vu, &self.pull_request_name, author_id, rng);

        let created = self.api.create_pull_request(&pr).await;
        self.metrics.record_check(CHECK_CREATE_PR, created.status_is(201));

        let review = self.api.get_review(author_id).await;
        self.metrics.record_check(CHECK_GET_REVIEW, review.status_is(200));

        let stats = self.api.reviewer_stats().await;
        self.metrics.record_check(CHECK_STATS, stats.status_is(200));

        debug!(
            vu,
            pull_request_id = %pr.pull_request_id,
            author_id,
            create_status = ?created.status,
            review_status = ?review.status,
            stats_status = ?stats.status,
            "iteration calls done"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.pause) => {}
            _ = shutdown.cancelled() => {}
        }

        self.metrics.record_iteration(started.elapsed());
    }
}
