use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::round::RoundView,
    error::ServiceError,
    services::auth_service,
    state::{
        SharedState,
        controller::{AnswerOutcome, GameRoundController, RoundSnapshot},
    },
};

fn controller(state: &SharedState, id: Uuid) -> Result<GameRoundController, ServiceError> {
    state
        .session(id)
        .ok_or_else(|| ServiceError::NotFound(format!("game session `{id}` not found")))
}

/// Open a game session, optionally bound to the user behind `token`.
///
/// The first fact load and the stored streak read run concurrently; the
/// returned snapshot reflects both.
pub async fn create_session(
    state: &SharedState,
    token: Option<String>,
) -> Result<RoundView, ServiceError> {
    let identity = match token.as_deref() {
        Some(token) => Some(auth_service::identify(state, token.to_owned()).await?),
        None => None,
    };

    let id = Uuid::new_v4();
    let controller = GameRoundController::new(
        id,
        state.facts(),
        state.profiles(),
        state.controller_settings(),
        identity,
    );
    state.sessions().insert(id, controller.clone());
    if let Some(token) = token.as_deref() {
        state.bind_session(id, token);
    }
    info!(session_id = %id, "game session created");

    let (started, _) = tokio::join!(controller.start_round(), controller.load_initial_streak());
    started?;

    Ok(controller.snapshot().await.into())
}

pub async fn snapshot(state: &SharedState, id: Uuid) -> Result<RoundView, ServiceError> {
    Ok(controller(state, id)?.snapshot().await.into())
}

/// Start a round from `Idle`, typically to retry after a failed fact load.
pub async fn start_round(state: &SharedState, id: Uuid) -> Result<RoundView, ServiceError> {
    Ok(controller(state, id)?.start_round().await?.into())
}

pub async fn submit_answer(
    state: &SharedState,
    id: Uuid,
    guess: bool,
) -> Result<RoundView, ServiceError> {
    match controller(state, id)?.submit_answer(guess).await? {
        AnswerOutcome::Scored(snapshot) => Ok(snapshot.into()),
        AnswerOutcome::Ignored(snapshot) => Err(ServiceError::InvalidState(format!(
            "no answer expected in phase {:?}",
            snapshot.phase
        ))),
    }
}

pub async fn advance_round(state: &SharedState, id: Uuid) -> Result<RoundView, ServiceError> {
    Ok(controller(state, id)?.advance_round().await?.into())
}

/// Bind the session to the user behind `token` and load their stored streak.
pub async fn attach_identity(
    state: &SharedState,
    id: Uuid,
    token: String,
) -> Result<RoundView, ServiceError> {
    let controller = controller(state, id)?;
    let identity = auth_service::identify(state, token.clone()).await?;
    state.bind_session(id, &token);
    controller.set_identity(Some(identity)).await;
    Ok(controller.load_initial_streak().await.into())
}

pub async fn close_session(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let controller = state
        .remove_session(id)
        .ok_or_else(|| ServiceError::NotFound(format!("game session `{id}` not found")))?;
    controller.shutdown().await;
    Ok(())
}

/// Current snapshot plus a receiver for every later one.
pub async fn subscribe(
    state: &SharedState,
    id: Uuid,
) -> Result<(RoundSnapshot, broadcast::Receiver<RoundSnapshot>), ServiceError> {
    let controller = controller(state, id)?;
    let receiver = controller.subscribe();
    let current = controller.snapshot().await;
    Ok((current, receiver))
}
