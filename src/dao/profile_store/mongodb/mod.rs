mod config;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoProfileStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::ProfileNotFound { id } => StorageError::ProfileNotFound { id },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
