//! Template handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use outreach_common::Error;
use outreach_storage::models::{CreateTemplate, Template, UpdateTemplate};
use outreach_storage::repository::TemplateRepository;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// GET /api/v1/templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTemplatesQuery>,
) -> ApiResult<Json<Vec<Template>>> {
    let repo = TemplateRepository::new(state.db_pool.clone());
    Ok(Json(repo.list(query.active_only).await?))
}

/// POST /api/v1/templates
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateTemplate>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    if input.name.trim().is_empty() {
        return Err(Error::Validation("Template name is required".to_string()).into());
    }
    if input.content.trim().is_empty() {
        return Err(Error::Validation("Template content is required".to_string()).into());
    }

    let repo = TemplateRepository::new(state.db_pool.clone());
    Ok((StatusCode::CREATED, Json(repo.create(input).await?)))
}

/// GET /api/v1/templates/:template_id
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<Json<Template>> {
    let repo = TemplateRepository::new(state.db_pool.clone());
    let template = repo
        .get(template_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Template {} not found", template_id)))?;
    Ok(Json(template))
}

/// PUT /api/v1/templates/:template_id
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    Json(input): Json<UpdateTemplate>,
) -> ApiResult<Json<Template>> {
    let repo = TemplateRepository::new(state.db_pool.clone());
    Ok(Json(repo.update(template_id, input).await?))
}

/// DELETE /api/v1/templates/:template_id
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let repo = TemplateRepository::new(state.db_pool.clone());
    repo.delete(template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
