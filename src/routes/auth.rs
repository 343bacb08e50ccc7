use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::{
        auth::{SessionResponse, SignInRequest, SignUpRequest},
        common::ActionResponse,
    },
    error::AppError,
    routes::require_bearer,
    services::auth_service,
    state::SharedState,
};

/// Account routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
}

/// Create an account and its profile, returning a bearer token.
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already registered"),
        (status = 503, description = "Profile could not be created")
    )
)]
pub async fn sign_up(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SignUpRequest>>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(auth_service::sign_up(&state, payload).await?))
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn sign_in(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SignInRequest>>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(auth_service::sign_in(&state, payload).await?))
}

/// Invalidate the bearer token. Game sessions played as this user become anonymous.
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tag = "auth",
    params(("Authorization" = String, Header, description = "Bearer token")),
    responses(
        (status = 200, description = "Signed out", body = ActionResponse),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn sign_out(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, AppError> {
    let token = require_bearer(&headers)?;
    let identity = auth_service::sign_out(&state, token).await?;
    Ok(Json(ActionResponse::new(format!(
        "signed out {}",
        identity.username
    ))))
}
