use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        round::RoundView,
        sse::{ServerEvent, SystemStatus},
    },
    state::controller::RoundSnapshot,
};

const ROUND_EVENT: &str = "round";
const SYSTEM_STATUS_EVENT: &str = "system_status";

fn round_event(snapshot: RoundSnapshot) -> Option<ServerEvent> {
    ServerEvent::json(Some(ROUND_EVENT.to_string()), &RoundView::from(snapshot))
        .inspect_err(|err| warn!(error = %err, "failed to serialise round snapshot"))
        .ok()
}

fn status_event(degraded: bool) -> Option<ServerEvent> {
    ServerEvent::json(
        Some(SYSTEM_STATUS_EVENT.to_string()),
        &SystemStatus { degraded },
    )
    .ok()
}

fn into_sse(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Stream a session's snapshots to one client: the current snapshot first,
/// then every later change, plus degraded-mode changes. The stream ends
/// when the session is closed.
pub fn to_sse_stream(
    session_id: Uuid,
    initial: RoundSnapshot,
    mut receiver: broadcast::Receiver<RoundSnapshot>,
    mut degraded: watch::Receiver<bool>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut last_revision = initial.revision;
        let opening = [
            round_event(initial),
            status_event(*degraded.borrow_and_update()),
        ];
        for payload in opening.into_iter().flatten() {
            if tx.send(Ok(into_sse(payload))).await.is_err() {
                return;
            }
        }

        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => match recv_result {
                    // Subscribed before the initial snapshot was taken; skip overlap.
                    Ok(snapshot) if snapshot.revision <= last_revision => continue,
                    Ok(snapshot) => {
                        last_revision = snapshot.revision;
                        round_event(snapshot)
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%session_id, skipped, "SSE subscriber lagged behind");
                        continue;
                    }
                },
                changed = degraded.changed() => match changed {
                    Ok(()) => status_event(*degraded.borrow_and_update()),
                    Err(_) => break,
                },
            };

            if let Some(payload) = payload {
                if tx.send(Ok(into_sse(payload))).await.is_err() {
                    break;
                }
            }
        }

        info!(%session_id, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::response::IntoResponse;
    use futures::{StreamExt, future::BoxFuture};

    use super::*;
    use crate::{
        auth::Identity,
        dao::profile_store::memory::MemoryProfileStore,
        facts::{Fact, FactError, FactSource},
        state::controller::{AdvancePolicy, ControllerSettings, GameRoundController},
    };

    struct AlwaysTrue;

    impl FactSource for AlwaysTrue {
        fn fetch_fact(&self) -> BoxFuture<'static, Result<Fact, FactError>> {
            Box::pin(async { Ok(Fact::truth("Octopuses have three hearts.")) })
        }
    }

    /// A signed-in session whose store has no profile for the player, so
    /// every streak write fails.
    fn unsaveable_session() -> GameRoundController {
        GameRoundController::new(
            Uuid::new_v4(),
            Arc::new(AlwaysTrue),
            Arc::new(MemoryProfileStore::new()),
            ControllerSettings {
                advance: AdvancePolicy::Manual,
                call_timeout: Duration::from_secs(1),
            },
            Some(Identity {
                id: Uuid::new_v4(),
                username: "ada".into(),
                email: "ada@example.com".into(),
            }),
        )
    }

    /// Collect the response body until `needle` shows up.
    async fn read_until(
        body: &mut (impl Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin),
        needle: &str,
    ) -> String {
        let mut seen = String::new();
        let read = async {
            while !seen.contains(needle) {
                match body.next().await {
                    Some(Ok(chunk)) => seen.push_str(&String::from_utf8_lossy(&chunk)),
                    _ => break,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .expect("SSE stream stalled");
        seen
    }

    #[tokio::test]
    async fn opening_frames_carry_the_round_and_system_status() {
        let ctrl = unsaveable_session();
        let (_degraded_tx, degraded_rx) = watch::channel(true);
        let response = to_sse_stream(
            ctrl.session_id(),
            ctrl.snapshot().await,
            ctrl.subscribe(),
            degraded_rx,
        )
        .into_response();
        let mut body = response.into_body().into_data_stream();

        let text = read_until(&mut body, "system_status").await;

        assert!(text.contains("event: round"));
        assert!(text.contains("\"phase\":\"idle\""));
        assert!(text.contains("event: system_status"));
        assert!(text.contains("\"degraded\":true"));
    }

    #[tokio::test]
    async fn failed_streak_write_reaches_the_client() {
        let ctrl = unsaveable_session();
        let (_degraded_tx, degraded_rx) = watch::channel(false);
        let response = to_sse_stream(
            ctrl.session_id(),
            ctrl.snapshot().await,
            ctrl.subscribe(),
            degraded_rx,
        )
        .into_response();
        let mut body = response.into_body().into_data_stream();
        read_until(&mut body, "system_status").await;

        ctrl.start_round().await.unwrap();
        ctrl.submit_answer(true).await.unwrap();

        let text = read_until(&mut body, "streak_not_saved").await;
        assert!(text.contains("\"phase\":\"scored\""));
        assert!(text.contains("\"saving\":false"));
    }
}
