//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use outreach_common::Error;
use outreach_core::campaign::EnqueueSummary;
use outreach_core::EnqueueRequest;
use outreach_storage::models::{Campaign, CampaignStats, CampaignStatus, CreateCampaign};
use outreach_storage::repository::outgoing_messages::PurgeSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
}

/// Campaign list response
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub total: usize,
}

/// Campaign with its derived rates
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignResponse {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub success_rate: f64,
    pub progress_percentage: f64,
}

impl From<Campaign> for CampaignResponse {
    fn from(campaign: Campaign) -> Self {
        Self {
            success_rate: campaign.success_rate(),
            progress_percentage: campaign.progress_percentage(),
            campaign,
        }
    }
}

/// Cancel response
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub campaign: CampaignResponse,
    pub cancelled_messages: u64,
}

/// Requeue response
#[derive(Debug, Serialize, Deserialize)]
pub struct RequeueResponse {
    pub requeued: u64,
}

/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCampaignsQuery>,
) -> ApiResult<Json<CampaignListResponse>> {
    let status = query
        .status
        .map(|s| s.parse::<CampaignStatus>().map_err(Error::Validation))
        .transpose()?;

    let campaigns = state.campaigns.list_campaigns(status).await?;
    let data: Vec<CampaignResponse> = campaigns.into_iter().map(CampaignResponse::from).collect();

    Ok(Json(CampaignListResponse {
        total: data.len(),
        data,
    }))
}

/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateCampaign>,
) -> ApiResult<(StatusCode, Json<CampaignResponse>)> {
    let campaign = state.campaigns.create_campaign(input).await?;
    Ok((StatusCode::CREATED, Json(campaign.into())))
}

/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    let campaign = state.campaigns.get_campaign(campaign_id).await?;
    Ok(Json(campaign.into()))
}

/// GET /api/v1/campaigns/:campaign_id/stats
pub async fn get_campaign_stats(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignStats>> {
    Ok(Json(state.campaigns.stats(campaign_id).await?))
}

/// POST /api/v1/campaigns/:campaign_id/enqueue
pub async fn enqueue_messages(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<Json<EnqueueSummary>> {
    Ok(Json(state.campaigns.enqueue(campaign_id, request).await?))
}

/// POST /api/v1/campaigns/:campaign_id/ready
pub async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    Ok(Json(state.campaigns.mark_ready(campaign_id).await?.into()))
}

/// POST /api/v1/campaigns/:campaign_id/start
pub async fn start_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    Ok(Json(state.campaigns.start(campaign_id).await?.into()))
}

/// POST /api/v1/campaigns/:campaign_id/pause
pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    Ok(Json(state.campaigns.pause(campaign_id).await?.into()))
}

/// POST /api/v1/campaigns/:campaign_id/resume
pub async fn resume_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    Ok(Json(state.campaigns.resume(campaign_id).await?.into()))
}

/// POST /api/v1/campaigns/:campaign_id/fail
pub async fn fail_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    Ok(Json(state.campaigns.fail(campaign_id).await?.into()))
}

/// POST /api/v1/campaigns/:campaign_id/cancel
pub async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    let (campaign, cancelled_messages) = state.campaigns.cancel(campaign_id).await?;
    Ok(Json(CancelResponse {
        campaign: campaign.into(),
        cancelled_messages,
    }))
}

/// POST /api/v1/campaigns/:campaign_id/requeue
pub async fn requeue_failed(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<RequeueResponse>> {
    let requeued = state.campaigns.requeue_failed(campaign_id).await?;
    Ok(Json(RequeueResponse { requeued }))
}

/// POST /api/v1/campaigns/:campaign_id/cleanup
pub async fn cleanup_messages(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<PurgeSummary>> {
    Ok(Json(
        state
            .campaigns
            .purge_cancelled_and_failed(campaign_id)
            .await?,
    ))
}
