use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Player profile row stored per authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntity {
    /// Identifier shared with the identity provider.
    pub id: Uuid,
    /// Public display name shown on the leaderboard.
    pub username: String,
    /// Number of correct answers in a row at the time of the last update.
    pub current_streak: u32,
    /// Best streak ever reached.
    pub highest_streak: u32,
    /// Account creation timestamp.
    pub created_at: SystemTime,
}

impl ProfileEntity {
    /// Fresh profile with both counters at zero.
    pub fn new(id: Uuid, username: String) -> Self {
        Self {
            id,
            username,
            current_streak: 0,
            highest_streak: 0,
            created_at: SystemTime::now(),
        }
    }

    /// Counters currently stored for this profile.
    pub fn streak(&self) -> StreakEntity {
        StreakEntity {
            current_streak: self.current_streak,
            highest_streak: self.highest_streak,
        }
    }
}

/// Streak counters as persisted by the stores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreakEntity {
    pub current_streak: u32,
    pub highest_streak: u32,
}

impl StreakEntity {
    /// Combine a submitted update with the stored counters: the current streak is
    /// overwritten while the best streak only ever grows.
    pub fn merged_with(self, stored: StreakEntity) -> StreakEntity {
        let highest_streak = self
            .highest_streak
            .max(stored.highest_streak)
            .max(self.current_streak);
        StreakEntity {
            current_streak: self.current_streak,
            highest_streak,
        }
    }
}

/// Leaderboard projection of a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntity {
    pub id: Uuid,
    pub username: String,
    pub highest_streak: u32,
}

impl From<ProfileEntity> for LeaderboardEntity {
    fn from(value: ProfileEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            highest_streak: value.highest_streak,
        }
    }
}

/// Order leaderboard rows by best streak (descending), then username, and keep the top `limit`.
pub fn rank_leaderboard(mut rows: Vec<LeaderboardEntity>, limit: usize) -> Vec<LeaderboardEntity> {
    rows.sort_by(|a, b| {
        b.highest_streak
            .cmp(&a.highest_streak)
            .then_with(|| a.username.cmp(&b.username))
    });
    rows.truncate(limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(username: &str, highest_streak: u32) -> LeaderboardEntity {
        LeaderboardEntity {
            id: Uuid::new_v4(),
            username: username.into(),
            highest_streak,
        }
    }

    #[test]
    fn merge_overwrites_current_and_keeps_best() {
        let stored = StreakEntity {
            current_streak: 4,
            highest_streak: 7,
        };
        let submitted = StreakEntity {
            current_streak: 0,
            highest_streak: 5,
        };
        assert_eq!(
            submitted.merged_with(stored),
            StreakEntity {
                current_streak: 0,
                highest_streak: 7
            }
        );
    }

    #[test]
    fn leaderboard_is_sorted_and_truncated() {
        let ranked = rank_leaderboard(
            vec![row("carol", 3), row("alice", 9), row("bob", 9), row("dave", 1)],
            3,
        );
        let names: Vec<_> = ranked.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }
}
