use tokio::time::timeout;

use crate::{
    error::ServiceError,
    facts::{Fact, FactError},
    state::SharedState,
};

/// Produce one fact (true or falsified) within the configured time budget.
pub async fn random_fact(state: &SharedState) -> Result<Fact, ServiceError> {
    let limit = state.config().call_timeout();
    let fact = timeout(limit, state.facts().fetch_fact())
        .await
        .unwrap_or(Err(FactError::Timeout(limit)))?;
    Ok(fact)
}
