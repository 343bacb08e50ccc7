use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{LeaderboardEntity, ProfileEntity, StreakEntity, rank_leaderboard},
    profile_store::ProfileStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{AllDocsResponse, CouchProfileDocument, END_SUFFIX, PROFILE_PREFIX, profile_doc_id},
};

/// Number of optimistic attempts before a streak update gives up on `_rev` conflicts.
const MAX_CONFLICT_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct CouchProfileStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchProfileStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Unreachable {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Unreachable {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseRejected {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseRejected {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                doc_id: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::Body {
                        doc_id: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::Status {
                doc_id: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                doc_id: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::Status {
                doc_id: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                doc_id: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::Status {
                doc_id: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::Body {
                doc_id: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::NotAProfile {
                    doc_id: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Read-modify-write guarded by `_rev`: a concurrent writer makes CouchDB answer
    /// 409 and the update is replayed against the fresh revision.
    async fn update_streak(&self, id: Uuid, streak: StreakEntity) -> StorageResult<StreakEntity> {
        let doc_id = profile_doc_id(id);

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let Some(mut doc) = self.get_document::<CouchProfileDocument>(&doc_id).await? else {
                return Err(StorageError::ProfileNotFound { id });
            };

            let merged = streak.merged_with(doc.streak());
            doc.profile.current_streak = merged.current_streak;
            doc.profile.highest_streak = merged.highest_streak;

            match self.put_document(&doc_id, &doc).await {
                Ok(()) => return Ok(merged),
                Err(err) if err.is_conflict() => {
                    debug!(%id, attempt, "profile revision conflict; retrying streak update");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CouchDaoError::ConflictRetriesExhausted {
            doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        }
        .into())
    }
}

impl ProfileStore for CouchProfileStore {
    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = profile.id;
            let doc_id = profile_doc_id(id);
            let doc = CouchProfileDocument::from((profile, None));
            match store.put_document(&doc_id, &doc).await {
                Ok(()) => Ok(()),
                Err(err) if err.is_conflict() => Err(StorageError::ProfileExists { id }),
                Err(err) => Err(err.into()),
            }
        })
    }

    fn find_profile(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = profile_doc_id(id);
            let maybe_doc = store
                .get_document::<CouchProfileDocument>(&doc_id)
                .await?;
            maybe_doc
                .map(ProfileEntity::try_from)
                .transpose()
                .map_err(Into::into)
        })
    }

    fn update_streak(
        &self,
        id: Uuid,
        streak: StreakEntity,
    ) -> BoxFuture<'static, StorageResult<StreakEntity>> {
        let store = self.clone();
        Box::pin(async move { store.update_streak(id, streak).await })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchProfileDocument>(PROFILE_PREFIX)
                .await?;
            let rows = docs
                .into_iter()
                .map(LeaderboardEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rank_leaderboard(rows, limit))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::Transport {
                    doc_id: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::Status {
                    doc_id: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
