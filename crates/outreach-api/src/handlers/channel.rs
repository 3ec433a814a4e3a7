//! Channel status handlers

use axum::{extract::State, Json};
use outreach_core::{ChannelStatus, DeliveryOutcome};
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// GET /api/v1/channel/status
pub async fn channel_status(State(state): State<Arc<AppState>>) -> Json<ChannelStatus> {
    Json(state.adapter.status().await)
}

/// POST /api/v1/channel/logout
pub async fn channel_logout(State(state): State<Arc<AppState>>) -> Json<DeliveryOutcome> {
    let outcome = state.adapter.logout().await;
    info!(backend = state.adapter.name(), ok = outcome.ok, "Channel logout requested");
    Json(outcome)
}
