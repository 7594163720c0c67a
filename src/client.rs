use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::TargetConfig;
use crate::error::Result;
use crate::fixture::TeamFixture;
use crate::metrics::{CallOutcome, MetricsCollector};
use crate::pull_request::PullRequest;

pub const TEAM_ADD_PATH: &str = "/team/add";
pub const PULL_REQUEST_CREATE_PATH: &str = "/pullRequest/create";
pub const GET_REVIEW_PATH: &str = "/users/getReview";
pub const STATS_REVIEWERS_PATH: &str = "/stats/reviewers";

/// The review assignment API as seen by setup and iterations.
///
/// Calls never fail: a transport error is reported as a `CallOutcome`
/// without a status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn add_team(&self, team: &TeamFixture) -> CallOutcome;
    async fn create_pull_request(&self, pr: &PullRequest) -> CallOutcome;
    async fn get_review(&self, user_id: &str) -> CallOutcome;
    async fn reviewer_stats(&self) -> CallOutcome;
}

/// reqwest-backed client. Every request feeds the HTTP metrics.
#[derive(Clone)]
pub struct HttpReviewClient {
    target: TargetConfig,
    client: reqwest::Client,
    metrics: MetricsCollector,
}

impl HttpReviewClient {
    pub fn new(target: TargetConfig, metrics: MetricsCollector) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pr-reviewer-loadtest/", env!("CARGO_PKG_VERSION"))),
        );
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = target.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            target,
            client: builder.build()?,
            metrics,
        })
    }

    async fn send(&self, name: &'static str, request: reqwest::RequestBuilder) -> CallOutcome {
        let start = Instant::now();
        let status = match request.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                // Read the body so timing covers the full response; contents are ignored.
                if let Err(e) = resp.bytes().await {
                    debug!(request = name, error = %e, "response body read failed");
                }
                Some(status)
            }
            Err(e) => {
                warn!(request = name, error = %e, "request failed");
                None
            }
        };
        let outcome = CallOutcome {
            status,
            elapsed: start.elapsed(),
        };
        self.metrics.record_request(&outcome);
        debug!(
            request = name,
            status = ?outcome.status,
            elapsed_ms = outcome.elapsed.as_secs_f64() * 1_000.0,
            "request completed"
        );
        outcome
    }
}

#[async_trait]
impl ReviewService for HttpReviewClient {
    async fn add_team(&self, team: &TeamFixture) -> CallOutcome {
        let req = self.client.post(self.target.url(TEAM_ADD_PATH)).json(team);
        self.send("team_add", req).await
    }

    async fn create_pull_request(&self, pr: &PullRequest) -> CallOutcome {
        let req = self
            .client
            .post(self.target.url(PULL_REQUEST_CREATE_PATH))
            .json(pr);
        self.send("pull_request_create", req).await
    }

    async fn get_review(&self, user_id: &str) -> CallOutcome {
        let req = self
            .client
            .get(self.target.url(GET_REVIEW_PATH))
            .query(&[("user_id", user_id)]);
        self.send("users_get_review", req).await
    }

    async fn reviewer_stats(&self) -> CallOutcome {
        let req = self.client.get(self.target.url(STATS_REVIEWERS_PATH));
        self.send("stats_reviewers", req).await
    }
}
