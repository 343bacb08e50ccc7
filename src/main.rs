//! Fact or Fiction Back binary entrypoint wiring REST, SSE, fact sources and the profile store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fact_or_fiction_back::{
    auth::LocalIdentityProvider,
    config::AppConfig,
    dao::{
        profile_store::{ProfileStore, memory::MemoryProfileStore},
        storage::StorageError,
    },
    facts::{
        FactAdapter, FactSource, GeminiFalsifier, NinjasFactProvider, RemoteFactSource,
        adapter::RandomCoin, build_http_client,
    },
    routes,
    services::{session_sweeper, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let facts = build_fact_source(&config)?;
    let app_state = AppState::new(config, facts, Arc::new(LocalIdentityProvider::new()));

    spawn_storage_supervisor(app_state.clone()).await?;
    tokio::spawn(session_sweeper::run(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// `FACT_SOURCE_URL` selects a remote fact endpoint; otherwise facts come from
/// API Ninjas and fiction from Gemini.
fn build_fact_source(config: &AppConfig) -> anyhow::Result<Arc<dyn FactSource>> {
    let client = build_http_client(config.call_timeout()).context("building HTTP client")?;

    if let Some(url) = env::var("FACT_SOURCE_URL").ok().filter(|url| !url.is_empty()) {
        info!(%url, "using remote fact source");
        return Ok(Arc::new(RemoteFactSource::new(client, url)));
    }

    let provider = NinjasFactProvider::from_env(client.clone(), config.ninjas_url())
        .context("configuring API Ninjas fact provider")?;
    let falsifier = GeminiFalsifier::from_env(client, config.gemini_base_url())
        .context("configuring Gemini falsifier")?
        .with_model(config.gemini_model());

    info!(
        model = config.gemini_model(),
        falsify_probability = config.falsify_probability(),
        "using API Ninjas + Gemini fact source"
    );
    Ok(Arc::new(
        FactAdapter::new(Arc::new(provider), Arc::new(falsifier))
            .with_coin(Arc::new(RandomCoin::new(config.falsify_probability()))),
    ))
}

/// Start the storage supervisor for the backend named by `STORE_BACKEND`
/// (`memory` by default).
async fn spawn_storage_supervisor(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
    info!(%backend, "selecting profile store backend");

    match backend.as_str() {
        "memory" => {
            let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use fact_or_fiction_back::dao::profile_store::mongodb::{
                MongoConfig, MongoProfileStore,
            };

            let config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = MongoProfileStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ProfileStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use fact_or_fiction_back::dao::profile_store::couchdb::{
                CouchConfig, CouchProfileStore,
            };

            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = CouchProfileStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ProfileStore>)
                }
            }));
        }
        other => bail!("unsupported STORE_BACKEND `{other}`"),
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler; using Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
