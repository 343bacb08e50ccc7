use reqwest::StatusCode;
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures of the CouchDB profile backend, keyed by the database or
/// document they concern.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("`{var}` must be an http(s) URL, got `{value}`")]
    InvalidBaseUrl { var: &'static str, value: String },
    #[error("`{var}` must be a number of milliseconds, got `{value}`")]
    InvalidTimeout { var: &'static str, value: String },
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("profile database `{database}` is unreachable")]
    Unreachable {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// Existence check or creation of the profile database was refused.
    #[error("CouchDB answered {status} while preparing profile database `{database}`")]
    DatabaseRejected { database: String, status: StatusCode },
    #[error("request for `{doc_id}` could not be sent")]
    Transport {
        doc_id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for `{doc_id}`")]
    Status { doc_id: String, status: StatusCode },
    #[error("response body for `{doc_id}` is not valid JSON")]
    Body {
        doc_id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("`{doc_id}` is not a profile document")]
    NotAProfile {
        doc_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("document id `{doc_id}` does not name a profile: {reason}")]
    InvalidDocId { doc_id: String, reason: &'static str },
    /// Every optimistic update attempt lost against a concurrent writer.
    #[error("gave up updating `{doc_id}` after {attempts} revision conflicts")]
    ConflictRetriesExhausted { doc_id: String, attempts: u32 },
}

impl CouchDaoError {
    /// CouchDB rejected a write because the submitted `_rev` was stale, or
    /// because a document with that id already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CouchDaoError::Status { status, .. } if *status == StatusCode::CONFLICT
        )
    }
}
