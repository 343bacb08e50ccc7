use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{profile_store::ProfileStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the profile store and keep the shared state in degraded mode while it is unavailable.
///
/// A healthy store is polled every few seconds. When a health check fails the
/// existing handle gets a few reconnect attempts before it is dropped and a
/// brand-new connection is negotiated through `connect`.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ProfileStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_profile_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                while watch_store(&state, store.as_ref()).await {
                    sleep(HEALTH_POLL_INTERVAL).await;
                }

                warn!("exhausted storage reconnect attempts; dropping store");
                state.clear_profile_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// One health poll. Returns `false` once the store should be abandoned.
async fn watch_store(state: &SharedState, store: &dyn ProfileStore) -> bool {
    match store.health_check().await {
        Ok(()) => {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            true
        }
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            let mut reconnect_delay = INITIAL_DELAY;

            for attempt in 0..MAX_RECONNECT_ATTEMPTS {
                match store.try_reconnect().await {
                    Ok(()) => {
                        info!(attempt, "storage reconnection succeeded after health check failure");
                        state.update_degraded(false);
                        return true;
                    }
                    Err(reconnect_err) => {
                        if attempt == 0 {
                            warn!(
                                attempt, error = %reconnect_err,
                                "storage reconnect first attempt failed; entering degraded mode"
                            );
                            state.update_degraded(true);
                        } else {
                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                        }
                        sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                    }
                }
            }

            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        auth::LocalIdentityProvider,
        config::AppConfig,
        dao::profile_store::memory::MemoryProfileStore,
        facts::{Fact, FactError, FactSource},
        state::AppState,
    };

    struct NoFacts;

    impl FactSource for NoFacts {
        fn fetch_fact(&self) -> BoxFuture<'static, Result<Fact, FactError>> {
            Box::pin(async {
                Err(FactError::EmptyResult {
                    url: "test://none".into(),
                })
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_a_store_connects() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(NoFacts),
            Arc::new(LocalIdentityProvider::new()),
        );
        let attempts = Arc::new(AtomicUsize::new(0));

        let supervisor = tokio::spawn(run(state.clone(), {
            let attempts = attempts.clone();
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(StorageError::Degraded)
                    } else {
                        Ok(Arc::new(MemoryProfileStore::new()) as Arc<dyn ProfileStore>)
                    }
                }
            }
        }));

        let mut watcher = state.degraded_watcher();
        while *watcher.borrow_and_update() {
            watcher.changed().await.unwrap();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(state.profile_store().await.is_some());
        supervisor.abort();
    }
}
