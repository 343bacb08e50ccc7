use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoProfileDocument, doc_id, streak_update},
};
use crate::dao::{
    models::{LeaderboardEntity, ProfileEntity, StreakEntity},
    profile_store::ProfileStore,
    storage::{StorageError, StorageResult},
};

const PROFILE_COLLECTION_NAME: &str = "profiles";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoProfileStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = self.config.open().await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoProfileStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"highest_streak": -1, "username": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("leaderboard_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PROFILE_COLLECTION_NAME,
                index: "highest_streak,username",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoProfileDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoProfileDocument>(PROFILE_COLLECTION_NAME)
    }

    async fn create_profile(&self, profile: ProfileEntity) -> StorageResult<()> {
        let id = profile.id;
        let document: MongoProfileDocument = profile.into();
        let collection = self.collection().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::ProfileExists { id }),
            Err(source) => Err(MongoDaoError::CreateProfile { id, source }.into()),
        }
    }

    async fn find_profile(&self, id: Uuid) -> MongoResult<Option<ProfileEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadProfile { id, source })?;

        document.map(ProfileEntity::try_from).transpose()
    }

    async fn update_streak(&self, id: Uuid, streak: StreakEntity) -> MongoResult<StreakEntity> {
        let collection = self.collection().await;

        let updated = collection
            .find_one_and_update(doc_id(id), streak_update(streak))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateStreak { id, source })?
            .ok_or(MongoDaoError::ProfileNotFound { id })?;

        Ok(updated.streak())
    }

    async fn leaderboard(&self, limit: usize) -> MongoResult<Vec<LeaderboardEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoProfileDocument> = collection
            .find(doc! {})
            .sort(doc! {"highest_streak": -1, "username": 1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?;

        documents
            .into_iter()
            .map(LeaderboardEntity::try_from)
            .collect()
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl ProfileStore for MongoProfileStore {
    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_profile(profile).await })
    }

    fn find_profile(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profile(id).await.map_err(Into::into) })
    }

    fn update_streak(
        &self,
        id: Uuid,
        streak: StreakEntity,
    ) -> BoxFuture<'static, StorageResult<StreakEntity>> {
        let store = self.clone();
        Box::pin(async move { store.update_streak(id, streak).await.map_err(Into::into) })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard(limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
