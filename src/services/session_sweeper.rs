use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::state::SharedState;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Close game sessions nobody has touched for the configured idle TTL.
///
/// A session with an open SSE stream is never swept, however quiet it is.
pub async fn run(state: SharedState) {
    let ttl = state.config().session_idle_ttl();
    let mut ticker = interval((ttl / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = sweep(&state, ttl).await;
        if removed > 0 {
            debug!(removed, remaining = state.sessions().len(), "session sweep done");
        }
    }
}

/// One pass over the registry. Returns how many sessions were closed.
pub async fn sweep(state: &SharedState, ttl: Duration) -> usize {
    let candidates: Vec<_> = state
        .sessions()
        .iter()
        .filter(|entry| entry.value().watchers() == 0)
        .map(|entry| entry.value().clone())
        .collect();

    let mut removed = 0;
    for controller in candidates {
        let idle = controller.idle_for().await;
        if idle < ttl || controller.watchers() > 0 {
            continue;
        }
        let id = controller.session_id();
        if state.remove_session(id).is_some() {
            controller.shutdown().await;
            info!(session_id = %id, idle_secs = idle.as_secs(), "idle game session swept");
            removed += 1;
        }
    }
    removed
}
