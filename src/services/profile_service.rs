use tracing::warn;

use crate::{
    dto::profile::{LeaderboardEntry, LeaderboardQuery, ProfileResponse, ranked},
    error::ServiceError,
    services::auth_service,
    state::SharedState,
};

/// Profile of the user owning `token`.
pub async fn profile(state: &SharedState, token: String) -> Result<ProfileResponse, ServiceError> {
    let identity = auth_service::identify(state, token).await?;
    let profile = state
        .profiles()
        .find_profile(identity.id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %identity.id, "authenticated user has no profile");
            ServiceError::NotFound(format!("profile `{}` not found", identity.id))
        })?;
    Ok(profile.into())
}

/// Top players by best streak.
pub async fn leaderboard(
    state: &SharedState,
    query: LeaderboardQuery,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let limit = query
        .limit
        .unwrap_or_else(|| state.config().leaderboard_default_limit());
    let rows = state.profiles().leaderboard(limit).await?;
    Ok(ranked(rows))
}
