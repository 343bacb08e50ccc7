//! DTOs for profile and leaderboard endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{LeaderboardEntity, ProfileEntity};

use super::format_system_time;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub current_streak: u32,
    pub highest_streak: u32,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<ProfileEntity> for ProfileResponse {
    fn from(profile: ProfileEntity) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            current_streak: profile.current_streak,
            highest_streak: profile.highest_streak,
            created_at: format_system_time(profile.created_at),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of entries to return (1 to 100, default 20).
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position on the board.
    pub rank: usize,
    pub id: Uuid,
    pub username: String,
    pub highest_streak: u32,
}

/// Number the rows in the order the store returned them.
pub fn ranked(rows: Vec<LeaderboardEntity>) -> Vec<LeaderboardEntry> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| LeaderboardEntry {
            rank: idx + 1,
            id: row.id,
            username: row.username,
            highest_streak: row.highest_streak,
        })
        .collect()
}
