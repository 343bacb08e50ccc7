//! Google Gemini `generateContent` client used to turn true facts into fiction.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::FactError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const API_KEY_ENV: &str = "GOOGLE_GEMINI_API_KEY";

/// Rewrites a true statement into a believable but incorrect one.
pub trait Falsifier: Send + Sync {
    fn falsify(&self, true_fact: String) -> BoxFuture<'static, Result<String, FactError>>;
}

/// Prompt asking the model for a subtly wrong rewrite of `fact`.
pub fn falsify_prompt(fact: &str) -> String {
    format!(
        "I have a true fact: \"{fact}\"\n\n\
         Please create a false version of this fact that sounds believable but contains subtle inaccuracies.\n\
         The false version should be approximately the same length and style as the original.\n\
         Only return the modified fact text, nothing else."
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

#[derive(Clone)]
pub struct GeminiFalsifier {
    client: Client,
    base_url: Arc<str>,
    model: Arc<str>,
    api_key: Arc<str>,
}

impl GeminiFalsifier {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            model: Arc::from(DEFAULT_GEMINI_MODEL),
            api_key: Arc::from(api_key.into()),
        }
    }

    /// Read the API key from `GOOGLE_GEMINI_API_KEY`.
    pub fn from_env(client: Client, base_url: impl Into<String>) -> Result<Self, FactError> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| FactError::MissingEnvVar { var: API_KEY_ENV })?;
        Ok(Self::new(client, base_url, api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Arc::from(model.into());
        self
    }

    async fn generate(&self, true_fact: &str) -> Result<String, FactError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let prompt = falsify_prompt(true_fact);
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_ref())
            .json(&request)
            .send()
            .await
            .map_err(|err| FactError::Falsify {
                message: format!("request to `{url}` failed: {err}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FactError::Falsify {
                message: format!("`{url}` responded with status {status}"),
            });
        }

        let payload: GenerateResponse =
            response.json().await.map_err(|err| FactError::Falsify {
                message: format!("unreadable response from `{url}`: {err}"),
            })?;

        payload
            .text()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| FactError::Falsify {
                message: "text generator returned an empty rewrite".into(),
            })
    }
}

impl Falsifier for GeminiFalsifier {
    fn falsify(&self, true_fact: String) -> BoxFuture<'static, Result<String, FactError>> {
        let falsifier = self.clone();
        Box::pin(async move { falsifier.generate(&true_fact).await })
    }
}
