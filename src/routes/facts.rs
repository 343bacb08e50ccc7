use axum::{Json, Router, extract::State, routing::get};

use crate::{error::AppError, facts::Fact, services::fact_service, state::SharedState};

/// Fact endpoint consumed by remote fact sources.
pub fn router() -> Router<SharedState> {
    Router::new().route("/facts/random", get(random_fact))
}

/// Return a random fact, true or falsified with equal odds.
#[utoipa::path(
    get,
    path = "/facts/random",
    tag = "facts",
    responses(
        (status = 200, description = "A fact to guess", body = Fact),
        (status = 500, description = "Failed to fetch or process fact")
    )
)]
pub async fn random_fact(State(state): State<SharedState>) -> Result<Json<Fact>, AppError> {
    Ok(Json(fact_service::random_fact(&state).await?))
}
