//! In-process identity provider: argon2 password hashes and opaque bearer
//! tokens, all held in memory.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use rand::Rng;
use tokio::task::spawn_blocking;
use tracing::info;
use uuid::Uuid;

use super::{AuthError, AuthSession, Identity, IdentityProvider, token_digest};

const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

struct Account {
    identity: Identity,
    /// PHC string produced by argon2.
    password_hash: String,
}

#[derive(Clone, Default)]
pub struct LocalIdentityProvider {
    /// Keyed by normalised (lowercase) email.
    accounts: Arc<DashMap<String, Account>>,
    /// Keyed by the SHA-256 of the bearer token; raw tokens are never stored.
    sessions: Arc<DashMap<String, Identity>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_session(&self, identity: Identity) -> AuthSession {
        let token = random_hex(TOKEN_LEN);
        self.sessions.insert(token_digest(&token), identity.clone());
        AuthSession { token, identity }
    }

    async fn register(
        &self,
        email: String,
        password: String,
        username: String,
    ) -> Result<AuthSession, AuthError> {
        let key = normalise_email(&email);
        if self.accounts.contains_key(&key) {
            return Err(AuthError::EmailTaken { email });
        }

        let password_hash = blocking(move || hash_password(&password)).await??;

        let identity = match self.accounts.entry(key.clone()) {
            Entry::Occupied(_) => return Err(AuthError::EmailTaken { email }),
            Entry::Vacant(slot) => {
                let identity = Identity {
                    id: Uuid::new_v4(),
                    username,
                    email: key,
                };
                slot.insert(Account {
                    identity: identity.clone(),
                    password_hash,
                });
                identity
            }
        };
        info!(user_id = %identity.id, "account registered");
        Ok(self.open_session(identity))
    }

    async fn authenticate(&self, email: &str, password: String) -> Result<AuthSession, AuthError> {
        let (identity, password_hash) = self
            .accounts
            .get(&normalise_email(email))
            .map(|account| (account.identity.clone(), account.password_hash.clone()))
            .ok_or(AuthError::InvalidCredentials)?;

        if !blocking(move || verify_password(&password_hash, &password)).await? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.open_session(identity))
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn sign_up(
        &self,
        email: String,
        password: String,
        username: String,
    ) -> BoxFuture<'static, Result<AuthSession, AuthError>> {
        let provider = self.clone();
        Box::pin(async move { provider.register(email, password, username).await })
    }

    fn sign_in(
        &self,
        email: String,
        password: String,
    ) -> BoxFuture<'static, Result<AuthSession, AuthError>> {
        let provider = self.clone();
        Box::pin(async move { provider.authenticate(&email, password).await })
    }

    fn sign_out(&self, token: String) -> BoxFuture<'static, Result<Identity, AuthError>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            sessions
                .remove(&token_digest(&token))
                .map(|(_, identity)| identity)
                .ok_or(AuthError::InvalidToken)
        })
    }

    fn identify(&self, token: String) -> BoxFuture<'static, Result<Identity, AuthError>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            sessions
                .get(&token_digest(&token))
                .map(|entry| entry.value().clone())
                .ok_or(AuthError::InvalidToken)
        })
    }

    fn discard(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let provider = self.clone();
        Box::pin(async move {
            provider.accounts.retain(|_, account| account.identity.id != id);
            provider.sessions.retain(|_, identity| identity.id != id);
        })
    }
}

/// Run CPU-heavy argon2 work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(work)
        .await
        .map_err(|err| AuthError::Unavailable {
            message: format!("password worker failed: {err}"),
        })
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|err| AuthError::Unavailable {
        message: format!("password salt: {err}"),
    })?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Unavailable {
            message: format!("password hashing: {err}"),
        })
}

/// Constant-time check of `password` against a stored PHC string. An
/// unparsable hash never verifies.
fn verify_password(password_hash: &str, password: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn signed_up(provider: &LocalIdentityProvider) -> AuthSession {
        provider
            .sign_up("Ada@Example.com".into(), "hunter22".into(), "ada".into())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sign_up_then_identify() {
        let provider = LocalIdentityProvider::new();
        let session = signed_up(&provider).await;

        let identity = provider.identify(session.token.clone()).await.unwrap();
        assert_eq!(identity, session.identity);
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(session.token.len(), TOKEN_LEN * 2);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let provider = LocalIdentityProvider::new();
        signed_up(&provider).await;

        let err = provider
            .sign_up("ada@example.COM".into(), "other".into(), "ada2".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken { .. }));
    }

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let provider = LocalIdentityProvider::new();
        let first = signed_up(&provider).await;

        let err = provider
            .sign_in("ada@example.com".into(), "wrong".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = provider
            .sign_in("nobody@example.com".into(), "hunter22".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let second = provider
            .sign_in("ada@example.com".into(), "hunter22".into())
            .await
            .unwrap();
        assert_eq!(second.identity.id, first.identity.id);
        assert_ne!(second.token, first.token);
    }

    #[tokio::test]
    async fn sign_out_invalidates_only_that_token() {
        let provider = LocalIdentityProvider::new();
        let first = signed_up(&provider).await;
        let second = provider
            .sign_in("ada@example.com".into(), "hunter22".into())
            .await
            .unwrap();

        let identity = provider.sign_out(first.token.clone()).await.unwrap();
        assert_eq!(identity.id, first.identity.id);
        assert!(matches!(
            provider.identify(first.token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(provider.identify(second.token).await.is_ok());
    }

    #[tokio::test]
    async fn discard_removes_account_and_sessions() {
        let provider = LocalIdentityProvider::new();
        let session = signed_up(&provider).await;

        provider.discard(session.identity.id).await;

        assert!(provider.identify(session.token).await.is_err());
        assert!(provider
            .sign_up("ada@example.com".into(), "hunter22".into(), "ada".into())
            .await
            .is_ok());
    }

    #[test]
    fn stored_hashes_are_salted_argon2() {
        let first = hash_password("pw-123456").unwrap();
        let second = hash_password("pw-123456").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password(&first, "pw-123456"));
        assert!(verify_password(&second, "pw-123456"));
        assert!(!verify_password(&first, "pw-654321"));
        assert!(!verify_password("not a phc string", "pw-123456"));
    }

    #[test]
    fn raw_tokens_are_not_the_map_keys() {
        let provider = LocalIdentityProvider::new();
        let session = provider.open_session(Identity {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
        });

        assert!(!provider.sessions.contains_key(&session.token));
        assert!(provider.sessions.contains_key(&token_digest(&session.token)));
    }
}
