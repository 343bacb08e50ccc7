use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{LeaderboardEntity, ProfileEntity, StreakEntity},
    profile_store::couchdb::error::CouchDaoError,
};

pub const PROFILE_PREFIX: &str = "profile::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchProfileDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBody {
    pub username: String,
    pub current_streak: u32,
    pub highest_streak: u32,
    pub created_at: SystemTime,
}

impl From<(ProfileEntity, Option<String>)> for CouchProfileDocument {
    fn from((profile, rev): (ProfileEntity, Option<String>)) -> Self {
        Self {
            id: profile_doc_id(profile.id),
            rev,
            profile: ProfileBody {
                username: profile.username,
                current_streak: profile.current_streak,
                highest_streak: profile.highest_streak,
                created_at: profile.created_at,
            },
        }
    }
}

impl TryFrom<CouchProfileDocument> for ProfileEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchProfileDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            username: doc.profile.username,
            current_streak: doc.profile.current_streak,
            highest_streak: doc.profile.highest_streak,
            created_at: doc.profile.created_at,
        })
    }
}

impl TryFrom<CouchProfileDocument> for LeaderboardEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchProfileDocument) -> Result<Self, Self::Error> {
        ProfileEntity::try_from(doc).map(Into::into)
    }
}

impl CouchProfileDocument {
    pub fn streak(&self) -> StreakEntity {
        StreakEntity {
            current_streak: self.profile.current_streak,
            highest_streak: self.profile.highest_streak,
        }
    }
}

pub fn profile_doc_id(id: Uuid) -> String {
    format!("{}{}", PROFILE_PREFIX, id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let id = doc_id
        .strip_prefix(PROFILE_PREFIX)
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            reason: "missing `profile::` prefix",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        reason: "invalid UUID",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_round_trips_through_extract() {
        let id = Uuid::new_v4();
        assert_eq!(extract_uuid(&profile_doc_id(id)).unwrap(), id);
    }

    #[test]
    fn extract_rejects_malformed_ids() {
        assert!(matches!(
            extract_uuid("profile-1234"),
            Err(CouchDaoError::InvalidDocId {
                reason: "missing `profile::` prefix",
                ..
            })
        ));
        assert!(matches!(
            extract_uuid("profile::not-a-uuid"),
            Err(CouchDaoError::InvalidDocId {
                reason: "invalid UUID",
                ..
            })
        ));
    }
}
