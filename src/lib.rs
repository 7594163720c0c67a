pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod metrics;
pub mod pull_request;
pub mod report;
pub mod scenario;
pub mod setup;
pub mod telemetry;
pub mod thresholds;

pub use driver::{LoadTest, RunSummary};
pub use error::LoadTestError;
