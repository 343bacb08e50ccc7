use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to create profile `{id}`")]
    CreateProfile {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load profile `{id}`")]
    LoadProfile {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update streak of profile `{id}`")]
    UpdateStreak {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("profile `{id}` not found")]
    ProfileNotFound { id: Uuid },
    #[error("stored profile `{id}` is malformed: {reason}")]
    MalformedProfile { id: String, reason: &'static str },
    #[error("failed to query the leaderboard")]
    Leaderboard {
        #[source]
        source: MongoError,
    },
}
