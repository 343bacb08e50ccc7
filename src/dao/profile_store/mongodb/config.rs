use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "fact_or_fiction";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Server selection bound so a dead cluster fails a ping instead of hanging it.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection settings for the profile database.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// Pings tried by [`MongoConfig::open`] before giving up.
    pub connect_attempts: u32,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);
        options.app_name.get_or_insert_with(|| "fact-or-fiction-back".into());

        Ok(Self {
            options,
            database_name: db_name.unwrap_or(DEFAULT_DATABASE).to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// Read `MONGO_URI` (required), `MONGO_DB` and `MONGO_CONNECT_ATTEMPTS`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok().filter(|db| !db.is_empty());
        let mut config = Self::from_uri(&uri, db.as_deref()).await?;
        if let Some(attempts) = std::env::var("MONGO_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
        {
            config.connect_attempts = attempts.max(1);
        }
        Ok(config)
    }

    /// Build a client and ping the profile database until it answers, backing
    /// off between attempts.
    pub async fn open(&self) -> MongoResult<Database> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut delay = FIRST_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(database),
                Err(source) if attempt >= self.connect_attempts => {
                    return Err(MongoDaoError::InitialPing {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    debug!(
                        attempt,
                        database = %self.database_name,
                        error = %err,
                        "profile database ping failed; retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uri_without_timeout_gets_a_bounded_server_selection() {
        let config = MongoConfig::from_uri("mongodb://localhost:27017", None)
            .await
            .unwrap();
        assert_eq!(config.database_name, "fact_or_fiction");
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(
            config.options.server_selection_timeout,
            Some(SERVER_SELECTION_TIMEOUT)
        );
    }

    #[tokio::test]
    async fn explicit_uri_timeout_is_kept() {
        let config = MongoConfig::from_uri(
            "mongodb://localhost:27017/?serverSelectionTimeoutMS=1500",
            Some("trivia"),
        )
        .await
        .unwrap();
        assert_eq!(config.database_name, "trivia");
        assert_eq!(
            config.options.server_selection_timeout,
            Some(Duration::from_millis(1_500))
        );
    }

    #[tokio::test]
    async fn garbage_uri_is_rejected() {
        assert!(matches!(
            MongoConfig::from_uri("not a uri", None).await,
            Err(MongoDaoError::InvalidUri { .. })
        ));
    }
}
