#![allow(dead_code)]
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use pr_reviewer_loadtest::client::{
    GET_REVIEW_PATH, PULL_REQUEST_CREATE_PATH, STATS_REVIEWERS_PATH, TEAM_ADD_PATH,
};
use pr_reviewer_loadtest::config::Config;

/// Status codes and latency the stub answers with.
pub struct StubBehaviour {
    pub team_add: u16,
    pub create: u16,
    pub get_review: u16,
    pub stats: u16,
    pub delay: Duration,
}

impl Default for StubBehaviour {
    fn default() -> Self {
        Self {
            team_add: 201,
            create: 201,
            get_review: 200,
            stats: 200,
            delay: Duration::ZERO,
        }
    }
}

/// Review API stub. `/team/add` must be hit exactly once per run.
pub async fn start(behaviour: StubBehaviour) -> MockServer {
    let server = MockServer::start().await;
    let respond = |status: u16| ResponseTemplate::new(status).set_delay(behaviour.delay);

    Mock::given(method("POST"))
        .and(path(TEAM_ADD_PATH))
        .respond_with(respond(behaviour.team_add))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PULL_REQUEST_CREATE_PATH))
        .respond_with(respond(behaviour.create))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(GET_REVIEW_PATH))
        .respond_with(respond(behaviour.get_review).set_body_string("{\"pull_requests\":[]}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(STATS_REVIEWERS_PATH))
        .respond_with(respond(behaviour.stats).set_body_string("[]"))
        .mount(&server)
        .await;

    server
}

pub fn config_for(server: &MockServer, vus: usize, duration_seconds: u64) -> Config {
    let mut cfg = Config::default();
    cfg.target.base_url = server.uri();
    cfg.load.vus = vus;
    cfg.load.duration_seconds = duration_seconds;
    cfg.report.interval_seconds = 1;
    cfg
}

pub async fn requests(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

pub fn query_value(req: &Request, key: &str) -> Option<String> {
    req.url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
