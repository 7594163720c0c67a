use tracing::{info, warn};

use crate::client::ReviewService;
use crate::config::FixtureConfig;
use crate::error::{LoadTestError, Result};
use crate::fixture::{SetupData, TeamFixture};
use crate::metrics::MetricsCollector;

pub const CHECK_TEAM_CREATED: &str = "team created 201";

/// Create the shared team. Runs once, before any virtual user starts.
///
/// A non-201 answer is recorded as a failed check and the run proceeds with
/// the generated ids, unless `abort_on_failure` is set.
pub async fn provision<S: ReviewService + ?Sized>(
    api: &S,
    cfg: &FixtureConfig,
    metrics: &MetricsCollector,
) -> Result<SetupData> {
    let team = TeamFixture::generate(&cfg.team_prefix, cfg.member_count);
    provision_team(api, team, cfg.abort_on_failure, metrics).await
}

pub async fn provision_team<S: ReviewService + ?Sized>(
    api: &S,
    team: TeamFixture,
    abort_on_failure: bool,
    metrics: &MetricsCollector,
) -> Result<SetupData> {
    let outcome = api.add_team(&team).await;
    let created = outcome.status_is(201);
    metrics.record_check(CHECK_TEAM_CREATED, created);

    if created {
        info!(
            team_name = %team.team_name,
            members = team.members.len(),
            "team fixture created"
        );
    } else {
        let status = outcome
            .status
            .map_or_else(|| "no response".to_string(), |s| s.to_string());
        if abort_on_failure {
            return Err(LoadTestError::SetupFailed(status));
        }
        warn!(
            team_name = %team.team_name,
            %status,
            "team creation failed, continuing with generated member ids"
        );
    }

    Ok(SetupData::from(&team))
}
