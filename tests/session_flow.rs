use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use fact_or_fiction_back::{
    auth::LocalIdentityProvider,
    config::AppConfig,
    dao::profile_store::memory::MemoryProfileStore,
    facts::{Fact, FactError, FactSource},
    routes,
    state::{AppState, SharedState},
};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Hands out queued facts in order; an exhausted queue fails like an empty upstream.
#[derive(Default)]
struct ScriptedFacts {
    queue: Mutex<VecDeque<Result<Fact, FactError>>>,
}

impl ScriptedFacts {
    fn new(script: impl IntoIterator<Item = Result<Fact, FactError>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(script.into_iter().collect()),
        })
    }
}

impl FactSource for ScriptedFacts {
    fn fetch_fact(&self) -> BoxFuture<'static, Result<Fact, FactError>> {
        let next = self.queue.lock().unwrap().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| {
                Err(FactError::EmptyResult {
                    url: "test://script".into(),
                })
            })
        })
    }
}

fn upstream_down() -> FactError {
    FactError::EmptyResult {
        url: "test://down".into(),
    }
}

struct TestServer {
    addr: SocketAddr,
    client: Client,
    state: SharedState,
}

impl TestServer {
    async fn start(facts: Arc<ScriptedFacts>, with_store: bool) -> Self {
        let config = AppConfig::from_json(r#"{"advance_delay_ms": null}"#).unwrap();
        let state = AppState::new(config, facts, Arc::new(LocalIdentityProvider::new()));
        if with_store {
            state
                .install_profile_store(Arc::new(MemoryProfileStore::new()))
                .await;
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.client.post(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

/// Poll the session until its streak write has landed.
async fn saved_view(server: &TestServer, view: &Value) -> Value {
    for _ in 0..100 {
        let (_, current) = server.get(&session_path(view, ""), None).await;
        if current["saving"] == false {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("streak write never settled");
}

fn session_path(view: &Value, suffix: &str) -> String {
    format!("/sessions/{}{}", view["session_id"].as_str().unwrap(), suffix)
}

#[tokio::test]
async fn anonymous_round_hides_the_truth_until_scored() {
    let server = TestServer::start(
        ScriptedFacts::new([
            Ok(Fact::fiction("Octopuses have two hearts.", "Octopuses have three hearts.")),
            Ok(Fact::truth("Honey never spoils.")),
        ]),
        true,
    )
    .await;

    let (status, view) = server.post("/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "awaiting_answer");
    assert_eq!(view["authenticated"], false);
    assert_eq!(view["fact"]["text"], "Octopuses have two hearts.");
    assert!(view["fact"].get("is_true").is_none());
    assert!(view["fact"].get("original_text").is_none());

    let (status, scored) = server
        .post(&session_path(&view, "/answer"), None, Some(json!({"guess": false})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scored["phase"], "scored");
    assert_eq!(scored["result"]["correct"], true);
    assert_eq!(scored["fact"]["is_true"], false);
    assert_eq!(scored["fact"]["original_text"], "Octopuses have three hearts.");
    assert_eq!(scored["streak"]["current"], 1);

    let (status, _) = server
        .post(&session_path(&view, "/answer"), None, Some(json!({"guess": true})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, next) = server.post(&session_path(&view, "/next"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next["round"], 2);
    assert_eq!(next["phase"], "awaiting_answer");
    assert_eq!(next["fact"]["text"], "Honey never spoils.");
    assert!(next.get("result").is_none());
}

#[tokio::test]
async fn signed_in_streak_reaches_profile_and_leaderboard() {
    let server = TestServer::start(
        ScriptedFacts::new([Ok(Fact::truth("Bananas are berries."))]),
        true,
    )
    .await;

    let (status, account) = server
        .post(
            "/auth/sign-up",
            None,
            Some(json!({
                "email": "ada@example.com",
                "password": "analytical",
                "username": "ada"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = account["token"].as_str().unwrap().to_owned();

    let (status, view) = server.post("/sessions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["authenticated"], true);
    assert_eq!(view["username"], "ada");

    let (_, scored) = server
        .post(&session_path(&view, "/answer"), Some(&token), Some(json!({"guess": true})))
        .await;
    assert_eq!(scored["answering"], false);
    assert_eq!(scored["streak"], json!({"current": 1, "highest": 1}));

    let saved = saved_view(&server, &view).await;
    assert!(saved.get("notice").is_none());
    assert!(saved["revision"].as_u64().unwrap() > scored["revision"].as_u64().unwrap());

    let (status, profile) = server.get("/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["current_streak"], 1);
    assert_eq!(profile["highest_streak"], 1);

    let (status, board) = server.get("/leaderboard?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["username"], "ada");
    assert_eq!(board[0]["highest_streak"], 1);

    let (status, _) = server.post("/auth/sign-out", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = server.get(&session_path(&view, ""), None).await;
    assert_eq!(after["authenticated"], false);
    assert_eq!(after["streak"], json!({"current": 0, "highest": 0}));

    let (status, _) = server.get("/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_fact_load_can_be_retried() {
    let server = TestServer::start(
        ScriptedFacts::new([Err(upstream_down()), Ok(Fact::truth("Venus spins backwards."))]),
        true,
    )
    .await;

    let (status, view) = server.post("/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "idle");
    assert_eq!(view["notice"]["kind"], "fact_unavailable");

    let (status, retried) = server.post(&session_path(&view, "/round"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retried["phase"], "awaiting_answer");
    assert!(retried.get("notice").is_none());
}

#[tokio::test]
async fn degraded_mode_reports_and_rejects_profile_reads() {
    let server = TestServer::start(ScriptedFacts::new([]), false).await;

    let (status, health) = server.get("/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");

    let (status, body) = server.get("/leaderboard", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn closed_sessions_are_gone() {
    let server = TestServer::start(
        ScriptedFacts::new([Ok(Fact::truth("Sharks predate trees."))]),
        true,
    )
    .await;

    let (_, view) = server.post("/sessions", None, None).await;
    assert_eq!(server.state.sessions().len(), 1);

    let response = server
        .client
        .delete(server.url(&session_path(&view, "")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.state.sessions().is_empty());

    let (status, _) = server.get(&session_path(&view, ""), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_sign_up_is_a_bad_request() {
    let server = TestServer::start(ScriptedFacts::new([]), true).await;

    let (status, _) = server
        .post(
            "/auth/sign-up",
            None,
            Some(json!({"email": "not-an-email", "password": "pw", "username": "  "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
