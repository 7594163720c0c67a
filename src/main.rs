use anyhow::{Context, Result};
use pr_reviewer_loadtest::{config, report, telemetry, LoadTest};
use config::Config;
use std::process::ExitCode;
use telemetry::init_tracing;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load().context("failed to load load test configuration")?;
    info!(
        base_url = %cfg.target.base_url,
        vus = cfg.load.vus,
        duration_seconds = cfg.load.duration_seconds,
        "configuration loaded"
    );

    let load_test = LoadTest::new(cfg).context("failed to prepare load test")?;
    let summary = load_test
        .run(telemetry::shutdown_token())
        .await
        .context("load test aborted")?;

    println!("{summary}");

    if summary.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("some thresholds have failed");
        Ok(ExitCode::from(report::THRESHOLDS_FAILED_EXIT))
    }
}
