use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{LoadTestError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONFIG_FILE: &str = "loadtest.toml";

/// Run configuration. Built once at process start and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub load: LoadConfig,
    pub fixture: FixtureConfig,
    /// Threshold expressions keyed by metric name.
    pub thresholds: BTreeMap<String, Vec<String>>,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_url: String,
    /// No timeout is applied when unset.
    pub request_timeout_seconds: Option<u64>,
}

impl TargetConfig {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    pub vus: usize,
    pub duration_seconds: u64,
    pub pause_millis: u64,
}

impl LoadConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_millis)
    }

    /// `None` when the duration does not fit in the clock.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        start.checked_add(self.duration())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    pub team_prefix: String,
    pub member_count: usize,
    pub pull_request_name: String,
    /// Stop before any virtual user starts when team creation is not 201.
    pub abort_on_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Progress log interval; 0 disables periodic progress.
    pub interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert("http_req_duration".to_string(), vec!["p(95)<300".to_string()]);
        thresholds.insert("http_req_failed".to_string(), vec!["rate<0.001".to_string()]);
        Self {
            target: TargetConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                request_timeout_seconds: None,
            },
            load: LoadConfig {
                vus: 5,
                duration_seconds: 60,
                pause_millis: 1000,
            },
            fixture: FixtureConfig {
                team_prefix: "loadtest-".to_string(),
                member_count: 5,
                pull_request_name: "loadtest-pr".to_string(),
                abort_on_failure: false,
            },
            thresholds,
            report: ReportConfig {
                interval_seconds: 10,
            },
        }
    }
}

impl Config {
    /// Defaults, then `loadtest.toml` (or `$LOADTEST_CONFIG`), then
    /// `LOADTEST__SECTION__KEY` variables, then `BASE_URL`.
    pub fn load() -> Result<Self> {
        let file = std::env::var("LOADTEST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::from_figment(Self::figment(&file))
    }

    pub fn figment(file: &str) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("LOADTEST__").split("__"));

        // An empty BASE_URL counts as unset.
        match std::env::var("BASE_URL") {
            Ok(url) if !url.trim().is_empty() => figment.merge(("target.base_url", url)),
            _ => figment,
        }
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment
            .extract()
            .map_err(|e| LoadTestError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.base_url.trim().is_empty() {
            return Err(LoadTestError::InvalidConfig("target.base_url is empty".into()));
        }
        if !self.target.base_url.starts_with("http://") && !self.target.base_url.starts_with("https://") {
            return Err(LoadTestError::InvalidConfig(format!(
                "target.base_url must be an http(s) URL, got `{}`",
                self.target.base_url
            )));
        }
        if self.load.vus == 0 {
            return Err(LoadTestError::InvalidConfig("load.vus must be at least 1".into()));
        }
        if self.load.duration_seconds == 0 {
            return Err(LoadTestError::InvalidConfig(
                "load.duration_seconds must be at least 1".into(),
            ));
        }
        if self.load.deadline_from(Instant::now()).is_none() {
            return Err(LoadTestError::InvalidConfig(format!(
                "load.duration_seconds is out of range: {}",
                self.load.duration_seconds
            )));
        }
        if self.fixture.member_count == 0 {
            return Err(LoadTestError::InvalidConfig(
                "fixture.member_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
