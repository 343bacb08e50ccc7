use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::profile::{LeaderboardEntry, LeaderboardQuery, ProfileResponse},
    error::AppError,
    routes::require_bearer,
    services::profile_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/leaderboard", get(get_leaderboard))
}

/// Profile and streak counters of the signed-in user.
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    params(("Authorization" = String, Header, description = "Bearer token")),
    responses(
        (status = 200, description = "Profile of the caller", body = ProfileResponse),
        (status = 401, description = "Missing or unknown token"),
        (status = 503, description = "Profile store unavailable")
    )
)]
pub async fn get_profile(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    let token = require_bearer(&headers)?;
    Ok(Json(profile_service::profile(&state, token).await?))
}

/// Top players ordered by best streak.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "profile",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard", body = [LeaderboardEntry]),
        (status = 400, description = "Limit out of range"),
        (status = 503, description = "Profile store unavailable")
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<LeaderboardQuery>>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(profile_service::leaderboard(&state, query).await?))
}
