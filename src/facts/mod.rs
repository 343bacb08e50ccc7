//! Fact acquisition: true facts from a provider, occasionally rewritten into fiction.

pub mod adapter;
pub mod gemini;
pub mod ninjas;
pub mod remote;

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use adapter::FactAdapter;
pub use gemini::GeminiFalsifier;
pub use ninjas::NinjasFactProvider;
pub use remote::RemoteFactSource;

/// A statement shown to the player, together with its truth value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    /// Statement displayed to the player.
    pub text: String,
    /// Whether `text` is the untouched true statement.
    pub is_true: bool,
    /// The true statement a falsified fact was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl Fact {
    /// A fact shown verbatim.
    pub fn truth(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_true: true,
            original_text: None,
        }
    }

    /// A falsified rewrite of `original`.
    pub fn fiction(text: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_true: false,
            original_text: Some(original.into()),
        }
    }
}

/// Anything able to hand out one fact per call.
pub trait FactSource: Send + Sync {
    fn fetch_fact(&self) -> BoxFuture<'static, Result<Fact, FactError>>;
}

/// Failures raised while obtaining or falsifying a fact.
#[derive(Debug, Error)]
pub enum FactError {
    /// The upstream could not be reached or the body could not be read.
    #[error("failed to reach fact provider at `{url}`")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The upstream answered with a non-success status.
    #[error("fact provider `{url}` responded with status {status}")]
    Status { url: String, status: StatusCode },
    /// The upstream answered successfully but without a usable fact.
    #[error("fact provider `{url}` returned no fact")]
    EmptyResult { url: String },
    /// The payload did not match the expected shape.
    #[error("failed to decode fact payload from `{url}`")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// The text generator failed or produced nothing usable.
    #[error("failed to falsify fact: {message}")]
    Falsify { message: String },
    /// The whole fetch exceeded its time budget.
    #[error("fact request timed out after {0:?}")]
    Timeout(Duration),
    #[error("missing fact source environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build fact source HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
}

/// Shared HTTP client for upstream fact services.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, FactError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| FactError::ClientBuilder { source })
}
