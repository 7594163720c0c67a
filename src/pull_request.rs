use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Body of `POST /pullRequest/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

impl PullRequest {
    pub fn new<R: Rng + ?Sized>(vu: usize, name: &str, author_id: &str, rng: &mut R) -> Self {
        Self {
            pull_request_id: pull_request_id(vu, Utc::now().timestamp_millis(), rng.gen()),
            pull_request_name: name.to_string(),
            author_id: author_id.to_string(),
        }
    }
}

/// `pr-<vu>-<unix millis>-<salt>`. Unique with high probability only.
pub fn pull_request_id(vu: usize, unix_millis: i64, salt: u64) -> String {
    format!("pr-{vu}-{unix_millis}-{salt}")
}

/// Uniform pick from the fixture ids; `None` only for an empty slice.
pub fn select_author<'a, R: Rng + ?Sized>(user_ids: &'a [String], rng: &mut R) -> Option<&'a str> {
    user_ids.choose(rng).map(String::as_str)
}
