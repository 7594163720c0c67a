use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use pr_reviewer_loadtest::client::{
    GET_REVIEW_PATH, PULL_REQUEST_CREATE_PATH, STATS_REVIEWERS_PATH, TEAM_ADD_PATH,
};
use pr_reviewer_loadtest::scenario::{CHECK_CREATE_PR, CHECK_GET_REVIEW, CHECK_STATS};
use pr_reviewer_loadtest::setup::CHECK_TEAM_CREATED;
use pr_reviewer_loadtest::LoadTest;

use super::stub_api::{self, config_for, query_value, requests, StubBehaviour};

/// One virtual user for three seconds completes at least two paced
/// iterations and every check passes.
#[tokio::test]
async fn all_success_run_has_no_failed_checks() {
    let server = stub_api::start(StubBehaviour::default()).await;
    let summary = LoadTest::new(config_for(&server, 1, 3))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    let m = &summary.metrics;
    assert!(m.iterations >= 2, "only {} iterations", m.iterations);
    assert_eq!(m.checks_failed(), 0);
    assert_eq!(m.check(CHECK_TEAM_CREATED).map(|c| c.passes), Some(1));
    assert_eq!(m.http_req_failed, 0);
    assert_eq!(m.http_reqs, 1 + 3 * m.iterations);
    assert!(summary.passed(), "{summary}");
}

/// The team is created exactly once, before any pull request.
#[tokio::test]
async fn team_is_created_once_before_any_pull_request() {
    let server = stub_api::start(StubBehaviour::default()).await;
    let summary = LoadTest::new(config_for(&server, 3, 2))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    let received = requests(&server).await;
    let team_adds: Vec<_> = received
        .iter()
        .enumerate()
        .filter(|(_, r)| r.url.path() == TEAM_ADD_PATH)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(team_adds, vec![0]);

    let creates = received
        .iter()
        .filter(|r| r.url.path() == PULL_REQUEST_CREATE_PATH)
        .count() as u64;
    assert_eq!(creates, summary.metrics.iterations);
    assert!(creates >= 3, "each virtual user iterates at least once");
}

/// Authors come from the team sent in setup, the review lookup asks for
/// the same author, and pull request ids never repeat.
#[tokio::test]
async fn iterations_use_fixture_members() {
    let server = stub_api::start(StubBehaviour::default()).await;
    LoadTest::new(config_for(&server, 1, 3))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    let received = requests(&server).await;
    let team: serde_json::Value = received[0].body_json().unwrap();
    let team_name = team["team_name"].as_str().unwrap().to_string();
    let members: Vec<String> = team["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["user_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        members,
        (1..=5).map(|i| format!("{team_name}-u{i}")).collect::<Vec<_>>()
    );

    let mut pr_ids = HashSet::new();
    let flow: Vec<_> = received[1..].iter().collect();
    assert_eq!(flow.len() % 3, 0);
    for step in flow.chunks(3) {
        assert_eq!(step[0].url.path(), PULL_REQUEST_CREATE_PATH);
        assert_eq!(step[1].url.path(), GET_REVIEW_PATH);
        assert_eq!(step[2].url.path(), STATS_REVIEWERS_PATH);

        let pr: serde_json::Value = step[0].body_json().unwrap();
        let author = pr["author_id"].as_str().unwrap().to_string();
        assert!(members.contains(&author), "unknown author {author}");
        assert_eq!(pr["pull_request_name"], "loadtest-pr");
        assert!(pr_ids.insert(pr["pull_request_id"].as_str().unwrap().to_string()));
        assert_eq!(query_value(step[1], "user_id"), Some(author));
    }
}

/// A failing create is checked as failed every time while the review and
/// stats calls still run and pass.
#[tokio::test]
async fn failing_create_does_not_skip_review_or_stats() {
    let server = stub_api::start(StubBehaviour {
        create: 500,
        ..StubBehaviour::default()
    })
    .await;
    let summary = LoadTest::new(config_for(&server, 1, 3))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    let m = &summary.metrics;
    assert!(m.iterations >= 2);
    let create = m.check(CHECK_CREATE_PR).unwrap();
    assert_eq!((create.passes, create.fails), (0, m.iterations));
    let review = m.check(CHECK_GET_REVIEW).unwrap();
    assert_eq!((review.passes, review.fails), (m.iterations, 0));
    let stats = m.check(CHECK_STATS).unwrap();
    assert_eq!((stats.passes, stats.fails), (m.iterations, 0));

    assert_eq!(m.http_req_failed, m.iterations);
    assert!(!summary.passed());
    let failed: Vec<_> = summary.verdict.failures().map(|r| r.metric.as_str()).collect();
    assert_eq!(failed, ["http_req_failed"]);
}

/// Every response slower than 300ms fails the p(95) threshold even though
/// each check passes.
#[tokio::test]
async fn slow_responses_fail_latency_threshold() {
    let server = stub_api::start(StubBehaviour {
        delay: Duration::from_millis(350),
        ..StubBehaviour::default()
    })
    .await;
    let summary = LoadTest::new(config_for(&server, 1, 2))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    let m = &summary.metrics;
    assert_eq!(m.checks_failed(), 0);
    assert!(m.http_req_duration.p95_ms >= 350.0);
    assert!(!summary.passed());
    let failed: Vec<_> = summary.verdict.failures().map(|r| r.expression.as_str()).collect();
    assert_eq!(failed, ["p(95)<300"]);
}

/// A failed team creation is recorded and the run still iterates.
#[tokio::test]
async fn failed_setup_is_not_fatal_by_default() {
    let server = stub_api::start(StubBehaviour {
        team_add: 500,
        ..StubBehaviour::default()
    })
    .await;
    let summary = LoadTest::new(config_for(&server, 1, 1))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    let m = &summary.metrics;
    assert_eq!(m.check(CHECK_TEAM_CREATED).map(|c| c.fails), Some(1));
    assert!(m.iterations >= 1);
}

#[tokio::test]
async fn failed_setup_aborts_when_configured() {
    let server = stub_api::start(StubBehaviour {
        team_add: 500,
        ..StubBehaviour::default()
    })
    .await;
    let mut cfg = config_for(&server, 2, 1);
    cfg.fixture.abort_on_failure = true;

    let result = LoadTest::new(cfg).unwrap().run(CancellationToken::new()).await;
    assert!(result.is_err());
    let creates = requests(&server)
        .await
        .iter()
        .filter(|r| r.url.path() == PULL_REQUEST_CREATE_PATH)
        .count();
    assert_eq!(creates, 0);
}
