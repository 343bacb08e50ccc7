//! Client for the API Ninjas random facts endpoint.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;

use super::FactError;

/// Public endpoint serving one random true fact per call.
pub const DEFAULT_NINJAS_URL: &str = "https://api.api-ninjas.com/v1/facts";
const API_KEY_ENV: &str = "API_NINJAS_API_KEY";

/// Source of plain true statements.
pub trait TrueFactProvider: Send + Sync {
    fn true_fact(&self) -> BoxFuture<'static, Result<String, FactError>>;
}

#[derive(Debug, Deserialize)]
struct NinjasFact {
    fact: String,
}

#[derive(Clone)]
pub struct NinjasFactProvider {
    client: Client,
    url: Arc<str>,
    api_key: Arc<str>,
}

impl NinjasFactProvider {
    pub fn new(client: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: Arc::from(url.into()),
            api_key: Arc::from(api_key.into()),
        }
    }

    /// Read the API key from `API_NINJAS_API_KEY`.
    pub fn from_env(client: Client, url: impl Into<String>) -> Result<Self, FactError> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| FactError::MissingEnvVar { var: API_KEY_ENV })?;
        Ok(Self::new(client, url, api_key))
    }

    async fn fetch(&self) -> Result<String, FactError> {
        let url = self.url.to_string();
        let response = self
            .client
            .get(url.as_str())
            .header("X-Api-Key", self.api_key.as_ref())
            .send()
            .await
            .map_err(|source| FactError::Fetch {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FactError::Status { url, status });
        }

        let body = response.bytes().await.map_err(|source| FactError::Fetch {
            url: url.clone(),
            source,
        })?;
        let facts: Vec<NinjasFact> =
            serde_json::from_slice(&body).map_err(|source| FactError::Decode {
                url: url.clone(),
                source,
            })?;

        facts
            .into_iter()
            .next()
            .map(|entry| entry.fact.trim().to_string())
            .filter(|fact| !fact.is_empty())
            .ok_or(FactError::EmptyResult { url })
    }
}

impl TrueFactProvider for NinjasFactProvider {
    fn true_fact(&self) -> BoxFuture<'static, Result<String, FactError>> {
        let provider = self.clone();
        Box::pin(async move { provider.fetch().await })
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/facts")
    }

    fn provider(url: String) -> NinjasFactProvider {
        NinjasFactProvider::new(Client::new(), url, "secret")
    }

    #[tokio::test]
    async fn returns_first_fact_and_sends_api_key() {
        let router = Router::new().route(
            "/v1/facts",
            get(|headers: HeaderMap| async move {
                if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("secret") {
                    return (StatusCode::UNAUTHORIZED, Json(json!([])));
                }
                (
                    StatusCode::OK,
                    Json(json!([{"fact": "  Honey never spoils.  "}])),
                )
            }),
        );
        let url = serve(router).await;

        let fact = provider(url).true_fact().await.unwrap();
        assert_eq!(fact, "Honey never spoils.");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            "/v1/facts",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = serve(router).await;

        let err = provider(url).true_fact().await.unwrap_err();
        assert!(matches!(
            err,
            FactError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn empty_list_is_an_empty_result() {
        let router = Router::new().route("/v1/facts", get(|| async { Json(json!([])) }));
        let url = serve(router).await;

        let err = provider(url).true_fact().await.unwrap_err();
        assert!(matches!(err, FactError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_decode_error() {
        let router = Router::new().route(
            "/v1/facts",
            get(|| async { Json::<Value>(json!({"unexpected": true})) }),
        );
        let url = serve(router).await;

        let err = provider(url).true_fact().await.unwrap_err();
        assert!(matches!(err, FactError::Decode { .. }));
    }
}
