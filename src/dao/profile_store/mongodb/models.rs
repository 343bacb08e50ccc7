use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{LeaderboardEntity, ProfileEntity, StreakEntity};

use super::error::MongoDaoError;

/// Profile document; the identifier is stored as its hyphenated string form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProfileDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub current_streak: i64,
    pub highest_streak: i64,
    pub created_at: DateTime,
}

impl From<ProfileEntity> for MongoProfileDocument {
    fn from(value: ProfileEntity) -> Self {
        Self {
            id: value.id.to_string(),
            username: value.username,
            current_streak: i64::from(value.current_streak),
            highest_streak: i64::from(value.highest_streak),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoProfileDocument> for ProfileEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProfileDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|_| MongoDaoError::MalformedProfile {
            id: value.id.clone(),
            reason: "invalid UUID",
        })?;
        Ok(Self {
            id,
            username: value.username,
            current_streak: counter(value.current_streak),
            highest_streak: counter(value.highest_streak),
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl MongoProfileDocument {
    pub fn streak(&self) -> StreakEntity {
        StreakEntity {
            current_streak: counter(self.current_streak),
            highest_streak: counter(self.highest_streak),
        }
    }
}

impl TryFrom<MongoProfileDocument> for LeaderboardEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProfileDocument) -> Result<Self, Self::Error> {
        ProfileEntity::try_from(value).map(Into::into)
    }
}

/// Counters are written from `u32`; anything else is clamped back into range.
fn counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// `$set` the current streak and `$max` the best streak in a single atomic update.
pub fn streak_update(streak: StreakEntity) -> Document {
    doc! {
        "$set": { "current_streak": i64::from(streak.current_streak) },
        "$max": { "highest_streak": i64::from(streak.highest_streak.max(streak.current_streak)) },
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn streak_update_sets_current_and_raises_highest() {
        let update = streak_update(StreakEntity {
            current_streak: 5,
            highest_streak: 7,
        });
        assert_eq!(
            update,
            doc! {
                "$set": { "current_streak": 5_i64 },
                "$max": { "highest_streak": 7_i64 },
            }
        );
    }

    #[test]
    fn streak_update_never_asks_for_a_highest_below_current() {
        let update = streak_update(StreakEntity {
            current_streak: 9,
            highest_streak: 3,
        });
        assert_eq!(
            update.get_document("$max").unwrap().get_i64("highest_streak").unwrap(),
            9
        );
    }

    #[test]
    fn negative_counters_are_clamped_on_read() {
        let document = MongoProfileDocument {
            id: Uuid::new_v4().to_string(),
            username: "ada".into(),
            current_streak: -3,
            highest_streak: i64::from(u32::MAX) + 10,
            created_at: DateTime::from_system_time(SystemTime::now()),
        };
        let streak = document.streak();
        assert_eq!(streak.current_streak, 0);
        assert_eq!(streak.highest_streak, u32::MAX);
    }

    #[test]
    fn malformed_ids_are_reported() {
        let document = MongoProfileDocument {
            id: "not-a-uuid".into(),
            username: "ada".into(),
            current_streak: 0,
            highest_streak: 0,
            created_at: DateTime::now(),
        };
        assert!(matches!(
            ProfileEntity::try_from(document),
            Err(MongoDaoError::MalformedProfile { .. })
        ));
    }
}
