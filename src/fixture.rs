//! Team fixture shared by every virtual user.
//!
//! The team is created once during setup. Member ids are derived from the
//! team name, so the same name always yields the same members.

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

/// Body of `POST /team/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamFixture {
    pub team_name: String,
    pub members: Vec<Member>,
}

impl TeamFixture {
    /// `<prefix><unix millis>` with `member_count` active members.
    pub fn generate(prefix: &str, member_count: usize) -> Self {
        Self::with_name(team_name(prefix, Utc::now().timestamp_millis()), member_count)
    }

    pub fn with_name(team_name: String, member_count: usize) -> Self {
        let members = (1..=member_count)
            .map(|i| Member {
                user_id: member_id(&team_name, i),
                username: format!("load-{i}"),
                is_active: true,
            })
            .collect();
        Self { team_name, members }
    }

    pub fn user_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.user_id.clone()).collect()
    }
}

pub fn team_name(prefix: &str, unix_millis: i64) -> String {
    format!("{prefix}{unix_millis}")
}

pub fn member_id(team_name: &str, index: usize) -> String {
    format!("{team_name}-u{index}")
}

/// What setup hands to every iteration. Never mutated after setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupData {
    pub team_name: String,
    pub user_ids: Vec<String>,
}

impl From<&TeamFixture> for SetupData {
    fn from(team: &TeamFixture) -> Self {
        Self {
            team_name: team.team_name.clone(),
            user_ids: team.user_ids(),
        }
    }
}
