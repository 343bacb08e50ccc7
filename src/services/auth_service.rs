use tracing::{info, warn};

use crate::{
    auth::{AuthError, Identity},
    dao::models::ProfileEntity,
    dto::auth::{SessionResponse, SignInRequest, SignUpRequest},
    error::ServiceError,
    state::SharedState,
};

/// Create the account, then its profile row. A failed profile insert rolls the account back.
pub async fn sign_up(
    state: &SharedState,
    request: SignUpRequest,
) -> Result<SessionResponse, ServiceError> {
    let session = state
        .identity()
        .sign_up(request.email, request.password, request.username)
        .await?;
    let identity = &session.identity;

    let profile = ProfileEntity::new(identity.id, identity.username.clone());
    if let Err(err) = state.profiles().create_profile(profile).await {
        warn!(user_id = %identity.id, error = %err, "profile creation failed; discarding account");
        state.identity().discard(identity.id).await;
        return Err(AuthError::ProfileCreation {
            message: err.to_string(),
        }
        .into());
    }

    info!(user_id = %identity.id, "user signed up");
    Ok(session.into())
}

pub async fn sign_in(
    state: &SharedState,
    request: SignInRequest,
) -> Result<SessionResponse, ServiceError> {
    let session = state
        .identity()
        .sign_in(request.email, request.password)
        .await?;
    info!(user_id = %session.identity.id, "user signed in");
    Ok(session.into())
}

/// End the session behind `token`. Game sessions signed in with that token
/// become anonymous with a fresh streak; other devices of the same user keep
/// playing.
pub async fn sign_out(state: &SharedState, token: String) -> Result<Identity, ServiceError> {
    let identity = state.identity().sign_out(token.clone()).await?;

    for controller in state.take_sessions_bound_to(&token) {
        controller.set_identity(None).await;
    }

    info!(user_id = %identity.id, "user signed out");
    Ok(identity)
}

pub async fn identify(state: &SharedState, token: String) -> Result<Identity, ServiceError> {
    Ok(state.identity().identify(token).await?)
}
