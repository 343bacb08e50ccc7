pub mod controller;
pub mod round_machine;
pub mod streak;

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    auth::{IdentityProvider, token_digest},
    config::AppConfig,
    dao::{
        models::{LeaderboardEntity, ProfileEntity, StreakEntity},
        profile_store::ProfileStore,
        storage::{StorageError, StorageResult},
    },
    facts::FactSource,
};

use self::controller::{ControllerSettings, GameRoundController};

pub type SharedState = Arc<AppState>;

/// Swappable handle on the active profile store.
///
/// Controllers hold the slot rather than a concrete backend so that a store
/// installed (or dropped) by the storage supervisor is picked up on the next
/// call. While empty, every operation fails with [`StorageError::Degraded`].
#[derive(Clone, Default)]
pub struct ProfileStoreSlot {
    store: Arc<RwLock<Option<Arc<dyn ProfileStore>>>>,
}

impl ProfileStoreSlot {
    pub async fn current(&self) -> Option<Arc<dyn ProfileStore>> {
        self.store.read().await.as_ref().cloned()
    }

    async fn require(&self) -> StorageResult<Arc<dyn ProfileStore>> {
        self.current().await.ok_or(StorageError::Degraded)
    }

    async fn replace(&self, store: Option<Arc<dyn ProfileStore>>) {
        *self.store.write().await = store;
    }
}

impl ProfileStore for ProfileStoreSlot {
    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let slot = self.clone();
        Box::pin(async move { slot.require().await?.create_profile(profile).await })
    }

    fn find_profile(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let slot = self.clone();
        Box::pin(async move { slot.require().await?.find_profile(id).await })
    }

    fn update_streak(
        &self,
        id: Uuid,
        streak: StreakEntity,
    ) -> BoxFuture<'static, StorageResult<StreakEntity>> {
        let slot = self.clone();
        Box::pin(async move { slot.require().await?.update_streak(id, streak).await })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let slot = self.clone();
        Box::pin(async move { slot.require().await?.leaderboard(limit).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let slot = self.clone();
        Box::pin(async move { slot.require().await?.health_check().await })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let slot = self.clone();
        Box::pin(async move { slot.require().await?.try_reconnect().await })
    }
}

/// Central application state: collaborators, live game sessions and the degraded flag.
pub struct AppState {
    config: AppConfig,
    profiles: ProfileStoreSlot,
    facts: Arc<dyn FactSource>,
    identity: Arc<dyn IdentityProvider>,
    sessions: DashMap<Uuid, GameRoundController>,
    /// Session id to the digest of the bearer token that signed it in.
    bindings: DashMap<Uuid, String>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a profile store is installed.
    pub fn new(
        config: AppConfig,
        facts: Arc<dyn FactSource>,
        identity: Arc<dyn IdentityProvider>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            profiles: ProfileStoreSlot::default(),
            facts,
            identity,
            sessions: DashMap::new(),
            bindings: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store handle shared with controllers; follows installs and removals.
    pub fn profiles(&self) -> Arc<dyn ProfileStore> {
        Arc::new(self.profiles.clone())
    }

    /// Currently installed backend, if any.
    pub async fn profile_store(&self) -> Option<Arc<dyn ProfileStore>> {
        self.profiles.current().await
    }

    pub fn facts(&self) -> Arc<dyn FactSource> {
        self.facts.clone()
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Install a new profile store implementation and leave degraded mode.
    pub async fn install_profile_store(&self, store: Arc<dyn ProfileStore>) {
        self.profiles.replace(Some(store)).await;
        self.update_degraded(false);
    }

    /// Remove the current profile store and enter degraded mode.
    pub async fn clear_profile_store(&self) {
        self.profiles.replace(None).await;
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Settings applied to every new game session.
    pub fn controller_settings(&self) -> ControllerSettings {
        self.config.controller_settings()
    }

    /// Registry of live game sessions keyed by their identifier.
    pub fn sessions(&self) -> &DashMap<Uuid, GameRoundController> {
        &self.sessions
    }

    pub fn session(&self, id: Uuid) -> Option<GameRoundController> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop a session from the registry together with its token binding.
    pub fn remove_session(&self, id: Uuid) -> Option<GameRoundController> {
        self.bindings.remove(&id);
        self.sessions.remove(&id).map(|(_, controller)| controller)
    }

    /// Remember that `token` signed the session in.
    pub fn bind_session(&self, id: Uuid, token: &str) {
        self.bindings.insert(id, token_digest(token));
    }

    /// Sessions signed in through `token`, unbinding them on the way out.
    pub fn take_sessions_bound_to(&self, token: &str) -> Vec<GameRoundController> {
        let digest = token_digest(token);
        let ids: Vec<Uuid> = self
            .bindings
            .iter()
            .filter(|entry| *entry.value() == digest)
            .map(|entry| *entry.key())
            .collect();

        ids.into_iter()
            .filter_map(|id| {
                self.bindings.remove(&id);
                self.session(id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::LocalIdentityProvider, dao::profile_store::memory::MemoryProfileStore,
        facts::{Fact, FactError},
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

    fn state() -> SharedState {
        AppState::new(
            AppConfig::default(),
            Arc::new(NoFacts),
            Arc::new(LocalIdentityProvider::new()),
        )
    }

    #[tokio::test]
    async fn starts_degraded_and_follows_installs() {
        let state = state();
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());

        let profiles = state.profiles();
        assert!(matches!(
            profiles.leaderboard(5).await,
            Err(StorageError::Degraded)
        ));

        state
            .install_profile_store(Arc::new(MemoryProfileStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(profiles.leaderboard(5).await.unwrap().is_empty());

        state.clear_profile_store().await;
        assert!(state.is_degraded());
        assert!(profiles.health_check().await.is_err());
    }

    #[tokio::test]
    async fn repeated_flag_updates_do_not_notify() {
        let state = state();
        let watcher = state.degraded_watcher();
        state.update_degraded(true);
        assert!(!watcher.has_changed().unwrap());
    }

    #[tokio::test]
    async fn bindings_follow_the_token_that_signed_in() {
        let state = state();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            let controller = GameRoundController::new(
                *id,
                state.facts(),
                state.profiles(),
                state.controller_settings(),
                None,
            );
            state.sessions().insert(*id, controller);
        }
        state.bind_session(ids[0], "token-a");
        state.bind_session(ids[1], "token-b");
        state.bind_session(ids[2], "token-a");

        let mut taken: Vec<Uuid> = state
            .take_sessions_bound_to("token-a")
            .iter()
            .map(GameRoundController::session_id)
            .collect();
        taken.sort();
        let mut expected = vec![ids[0], ids[2]];
        expected.sort();
        assert_eq!(taken, expected);
        assert!(state.take_sessions_bound_to("token-a").is_empty());

        assert!(state.remove_session(ids[1]).is_some());
        assert!(state.take_sessions_bound_to("token-b").is_empty());
        assert_eq!(state.sessions().len(), 2);
    }
}
