//! Liveness and readiness probes.

use crate::{AppState, errors::Result};
use axum::extract::State;

/// Liveness: the process is serving requests. Never touches the database.
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness: the database answers through the shared pool.
#[tracing::instrument(skip_all)]
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str> {
    state.pools.ping().await?;
    Ok("OK")
}
