use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        common::ActionResponse,
        round::{AnswerRequest, RoundView},
    },
    error::AppError,
    routes::{bearer_token, require_bearer},
    services::session_service,
    state::SharedState,
};

/// Game session lifecycle and player intents.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(close_session))
        .route("/sessions/{id}/round", post(start_round))
        .route("/sessions/{id}/answer", post(submit_answer))
        .route("/sessions/{id}/next", post(advance_round))
        .route("/sessions/{id}/identity", post(attach_identity))
}

/// Open a game session and load its first fact.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("Authorization" = Option<String>, Header, description = "Optional bearer token")),
    responses(
        (status = 200, description = "Session created", body = RoundView),
        (status = 401, description = "Unknown token")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<RoundView>, AppError> {
    let view = session_service::create_session(&state, bearer_token(&headers)).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Game session identifier")),
    responses(
        (status = 200, description = "Current snapshot", body = RoundView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoundView>, AppError> {
    Ok(Json(session_service::snapshot(&state, id).await?))
}

/// Start a round from idle, e.g. after a failed fact load.
#[utoipa::path(
    post,
    path = "/sessions/{id}/round",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Game session identifier")),
    responses(
        (status = 200, description = "Round started; fact loaded or notice set", body = RoundView),
        (status = 409, description = "A round is already live")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoundView>, AppError> {
    Ok(Json(session_service::start_round(&state, id).await?))
}

/// Answer the live fact: `true` for fact, `false` for fiction.
#[utoipa::path(
    post,
    path = "/sessions/{id}/answer",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Game session identifier")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = RoundView),
        (status = 409, description = "No answer expected right now")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<RoundView>, AppError> {
    Ok(Json(
        session_service::submit_answer(&state, id, payload.guess).await?,
    ))
}

/// Move on to the next fact.
#[utoipa::path(
    post,
    path = "/sessions/{id}/next",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Game session identifier")),
    responses(
        (status = 200, description = "Next round started", body = RoundView),
        (status = 409, description = "Current round not scored yet")
    )
)]
pub async fn advance_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoundView>, AppError> {
    Ok(Json(session_service::advance_round(&state, id).await?))
}

/// Bind the session to the signed-in user and load their stored streak.
#[utoipa::path(
    post,
    path = "/sessions/{id}/identity",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Game session identifier"),
        ("Authorization" = String, Header, description = "Bearer token")
    ),
    responses(
        (status = 200, description = "Session now plays as the caller", body = RoundView),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn attach_identity(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<RoundView>, AppError> {
    let token = require_bearer(&headers)?;
    Ok(Json(
        session_service::attach_identity(&state, id, token).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Game session identifier")),
    responses(
        (status = 200, description = "Session closed", body = ActionResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn close_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::close_session(&state, id).await?;
    Ok(Json(ActionResponse::new(format!("game session {id} closed"))))
}
