//! Contact handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use outreach_common::Error;
use outreach_storage::models::{Contact, CreateContact};
use outreach_storage::repository::ContactRepository;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/v1/contacts
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateContact>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    if input.name.trim().is_empty() {
        return Err(Error::Validation("Contact name is required".to_string()).into());
    }

    let repo = ContactRepository::new(state.db_pool.clone());
    let contact = repo.create(input, &state.default_country_code).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/v1/contacts/:contact_id
pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Contact>> {
    let repo = ContactRepository::new(state.db_pool.clone());
    let contact = repo
        .get(contact_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Contact {} not found", contact_id)))?;
    Ok(Json(contact))
}

/// POST /api/v1/contacts/:contact_id/opt-in
pub async fn opt_in(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Contact>> {
    set_opt_in(&state, contact_id, true).await
}

/// POST /api/v1/contacts/:contact_id/opt-out
pub async fn opt_out(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<Json<Contact>> {
    set_opt_in(&state, contact_id, false).await
}

async fn set_opt_in(state: &AppState, contact_id: Uuid, opt_in: bool) -> ApiResult<Json<Contact>> {
    let repo = ContactRepository::new(state.db_pool.clone());
    repo.set_opt_in(contact_id, opt_in).await?;
    let contact = repo
        .get(contact_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Contact {} not found", contact_id)))?;
    info!(contact_id = %contact_id, opt_in, "Contact opt-in changed");
    Ok(Json(contact))
}
