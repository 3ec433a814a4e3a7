//! Auto-reply rule handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveTime;
use outreach_common::types::normalize_phone;
use outreach_common::Error;
use outreach_storage::models::{CreateRule, Rule};
use outreach_storage::repository::{ContactRepository, RuleRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// Inbound message to evaluate
#[derive(Debug, Serialize, Deserialize)]
pub struct MatchRequest {
    pub text: String,
    /// Sender; a known contact gets its last interaction updated
    pub phone: Option<String>,
    /// Evaluate at this local time instead of now
    pub at: Option<NaiveTime>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matched: bool,
    pub rule_id: Option<Uuid>,
    pub rule_name: Option<String>,
    pub response: Option<String>,
}

impl From<Option<Rule>> for MatchResponse {
    fn from(rule: Option<Rule>) -> Self {
        match rule {
            Some(rule) => Self {
                matched: true,
                rule_id: Some(rule.id),
                rule_name: Some(rule.name),
                response: Some(rule.response),
            },
            None => Self {
                matched: false,
                rule_id: None,
                rule_name: None,
                response: None,
            },
        }
    }
}

/// GET /api/v1/rules
pub async fn list_rules(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Rule>>> {
    let repo = RuleRepository::new(state.db_pool.clone());
    Ok(Json(repo.list_active().await?))
}

/// POST /api/v1/rules
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateRule>,
) -> ApiResult<(StatusCode, Json<Rule>)> {
    if input.name.trim().is_empty() {
        return Err(Error::Validation("Rule name is required".to_string()).into());
    }

    let repo = RuleRepository::new(state.db_pool.clone());
    Ok((StatusCode::CREATED, Json(repo.create(input).await?)))
}

/// POST /api/v1/rules/:rule_id/enable
pub async fn enable_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
) -> ApiResult<Json<Rule>> {
    set_active(&state, rule_id, true).await
}

/// POST /api/v1/rules/:rule_id/disable
pub async fn disable_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
) -> ApiResult<Json<Rule>> {
    set_active(&state, rule_id, false).await
}

async fn set_active(state: &AppState, rule_id: Uuid, active: bool) -> ApiResult<Json<Rule>> {
    let repo = RuleRepository::new(state.db_pool.clone());
    repo.set_active(rule_id, active).await?;
    let rule = repo
        .get(rule_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Rule {} not found", rule_id)))?;
    Ok(Json(rule))
}

/// POST /api/v1/rules/match
pub async fn match_rule(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MatchRequest>,
) -> ApiResult<Json<MatchResponse>> {
    if let Some(phone) = request.phone.as_deref() {
        let contacts = ContactRepository::new(state.db_pool.clone());
        let phone = normalize_phone(phone, &state.default_country_code);
        if let Some(contact) = contacts.get_by_phone(&phone).await? {
            contacts.touch_interaction(contact.id).await?;
        } else {
            debug!(phone = %phone, "Inbound message from unknown contact");
        }
    }

    let rule = match request.at {
        Some(at) => state.responder.find_match_at(&request.text, at).await?,
        None => state.responder.find_match(&request.text).await?,
    };
    Ok(Json(rule.into()))
}
