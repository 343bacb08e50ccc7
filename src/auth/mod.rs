//! Account sessions: who is playing, if anyone.

pub mod local;

use futures::future::BoxFuture;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

pub use local::LocalIdentityProvider;

/// Authenticated user as seen by the rest of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Bearer token handed out on sign-up / sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub identity: Identity,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account already exists for `{email}`")]
    EmailTaken { email: String },
    #[error("invalid or expired session token")]
    InvalidToken,
    /// The account was created but its profile row could not be stored.
    #[error("failed to create profile: {message}")]
    ProfileCreation { message: String },
    #[error("identity provider unavailable: {message}")]
    Unavailable { message: String },
}

/// Hex SHA-256 of a bearer token. Tokens are only ever kept in this form.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Sign-up, sign-in and token resolution.
pub trait IdentityProvider: Send + Sync {
    fn sign_up(
        &self,
        email: String,
        password: String,
        username: String,
    ) -> BoxFuture<'static, Result<AuthSession, AuthError>>;
    fn sign_in(
        &self,
        email: String,
        password: String,
    ) -> BoxFuture<'static, Result<AuthSession, AuthError>>;
    /// Invalidate `token`, returning the identity it belonged to.
    fn sign_out(&self, token: String) -> BoxFuture<'static, Result<Identity, AuthError>>;
    fn identify(&self, token: String) -> BoxFuture<'static, Result<Identity, AuthError>>;
    /// Remove an account whose sign-up could not be completed.
    fn discard(&self, id: Uuid) -> BoxFuture<'static, ()>;
}
