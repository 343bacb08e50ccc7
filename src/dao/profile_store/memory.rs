//! Process-local profile store used for development and tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{LeaderboardEntity, ProfileEntity, StreakEntity, rank_leaderboard},
    profile_store::ProfileStore,
    storage::{StorageError, StorageResult},
};

/// Profile store backed by a concurrent map. Data is lost on restart.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<DashMap<Uuid, ProfileEntity>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let profiles = self.profiles.clone();
        Box::pin(async move {
            match profiles.entry(profile.id) {
                Entry::Occupied(_) => Err(StorageError::ProfileExists { id: profile.id }),
                Entry::Vacant(slot) => {
                    slot.insert(profile);
                    Ok(())
                }
            }
        })
    }

    fn find_profile(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let profiles = self.profiles.clone();
        Box::pin(async move { Ok(profiles.get(&id).map(|entry| entry.value().clone())) })
    }

    fn update_streak(
        &self,
        id: Uuid,
        streak: StreakEntity,
    ) -> BoxFuture<'static, StorageResult<StreakEntity>> {
        let profiles = self.profiles.clone();
        Box::pin(async move {
            // The shard lock held by `get_mut` makes the read-compare-write atomic.
            let mut entry = profiles
                .get_mut(&id)
                .ok_or(StorageError::ProfileNotFound { id })?;
            let merged = streak.merged_with(entry.streak());
            entry.current_streak = merged.current_streak;
            entry.highest_streak = merged.highest_streak;
            Ok(merged)
        })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let profiles = self.profiles.clone();
        Box::pin(async move {
            let rows = profiles
                .iter()
                .map(|entry| LeaderboardEntity::from(entry.value().clone()))
                .collect();
            Ok(rank_leaderboard(rows, limit))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
