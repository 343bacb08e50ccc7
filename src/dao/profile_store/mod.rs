#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{LeaderboardEntity, ProfileEntity, StreakEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for player profiles and the leaderboard.
pub trait ProfileStore: Send + Sync {
    /// Insert a brand-new profile; fails with `ProfileExists` when the id is taken.
    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_profile(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>>;
    /// Atomically overwrite `current_streak` and raise `highest_streak` to the
    /// larger of the stored and submitted values. Returns the stored counters.
    fn update_streak(
        &self,
        id: Uuid,
        streak: StreakEntity,
    ) -> BoxFuture<'static, StorageResult<StreakEntity>>;
    /// Top `limit` profiles ordered by `highest_streak` descending.
    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
