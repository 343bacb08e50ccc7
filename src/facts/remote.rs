//! Fact source consuming another service's fact endpoint.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;

use super::{Fact, FactError, FactSource};

/// Fetches ready-made facts from a URL answering with `Fact` JSON.
#[derive(Clone)]
pub struct RemoteFactSource {
    client: Client,
    url: Arc<str>,
}

impl RemoteFactSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: Arc::from(url.into()),
        }
    }

    async fn fetch(&self) -> Result<Fact, FactError> {
        let url = self.url.to_string();
        let response = self
            .client
            .get(url.as_str())
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
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FactError::EmptyResult { url });
        }

        let fact: Fact = serde_json::from_slice(&body).map_err(|source| FactError::Decode {
            url: url.clone(),
            source,
        })?;
        if fact.text.trim().is_empty() {
            return Err(FactError::EmptyResult { url });
        }

        Ok(fact)
    }
}

impl FactSource for RemoteFactSource {
    fn fetch_fact(&self) -> BoxFuture<'static, Result<Fact, FactError>> {
        let source = self.clone();
        Box::pin(async move { source.fetch().await })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(router: Router) -> RemoteFactSource {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        RemoteFactSource::new(Client::new(), format!("http://{addr}/facts/random"))
    }

    #[tokio::test]
    async fn decodes_a_falsified_fact() {
        let source = serve(Router::new().route(
            "/facts/random",
            get(|| async {
                Json(json!({
                    "text": "The Eiffel Tower is 500 m tall.",
                    "isTrue": false,
                    "originalText": "The Eiffel Tower is 330 m tall."
                }))
            }),
        ))
        .await;

        let fact = source.fetch_fact().await.unwrap();
        assert!(!fact.is_true);
        assert_eq!(
            fact.original_text.as_deref(),
            Some("The Eiffel Tower is 330 m tall.")
        );
    }

    #[tokio::test]
    async fn server_error_is_a_status_error() {
        let source = serve(Router::new().route(
            "/facts/random",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"message": "Failed to fetch or process fact"})),
                )
            }),
        ))
        .await;

        let err = source.fetch_fact().await.unwrap_err();
        assert!(matches!(err, FactError::Status { .. }));
    }

    #[tokio::test]
    async fn empty_body_and_blank_text_are_empty_results() {
        let empty = serve(Router::new().route("/facts/random", get(|| async { "" }))).await;
        assert!(matches!(
            empty.fetch_fact().await.unwrap_err(),
            FactError::EmptyResult { .. }
        ));

        let blank = serve(Router::new().route(
            "/facts/random",
            get(|| async { Json(json!({"text": "  ", "isTrue": true})) }),
        ))
        .await;
        assert!(matches!(
            blank.fetch_fact().await.unwrap_err(),
            FactError::EmptyResult { .. }
        ));
    }

    #[tokio::test]
    async fn missing_fields_are_decode_errors() {
        let source = serve(Router::new().route(
            "/facts/random",
            get(|| async { Json(json!({"text": "no truth flag"})) }),
        ))
        .await;

        assert!(matches!(
            source.fetch_fact().await.unwrap_err(),
            FactError::Decode { .. }
        ));
    }
}
