//! API routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{campaigns, channel, contacts, health, rules, templates};
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    // Health check routes
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    // Channel routes
    let channel_routes = Router::new()
        .route("/status", get(channel::channel_status))
        .route("/logout", post(channel::channel_logout));

    // Campaign routes
    let campaign_routes = Router::new()
        .route(
            "/",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/:campaign_id", get(campaigns::get_campaign))
        .route("/:campaign_id/stats", get(campaigns::get_campaign_stats))
        .route("/:campaign_id/enqueue", post(campaigns::enqueue_messages))
        .route("/:campaign_id/ready", post(campaigns::mark_ready))
        .route("/:campaign_id/start", post(campaigns::start_campaign))
        .route("/:campaign_id/pause", post(campaigns::pause_campaign))
        .route("/:campaign_id/resume", post(campaigns::resume_campaign))
        .route("/:campaign_id/fail", post(campaigns::fail_campaign))
        .route("/:campaign_id/cancel", post(campaigns::cancel_campaign))
        .route("/:campaign_id/requeue", post(campaigns::requeue_failed))
        .route("/:campaign_id/cleanup", post(campaigns::cleanup_messages));

    // Contact routes
    let contact_routes = Router::new()
        .route("/", post(contacts::create_contact))
        .route("/:contact_id", get(contacts::get_contact))
        .route("/:contact_id/opt-in", post(contacts::opt_in))
        .route("/:contact_id/opt-out", post(contacts::opt_out));

    // Template routes
    let template_routes = Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/:template_id",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        );

    // Rule routes
    let rule_routes = Router::new()
        .route("/", get(rules::list_rules).post(rules::create_rule))
        .route("/match", post(rules::match_rule))
        .route("/:rule_id/enable", post(rules::enable_rule))
        .route("/:rule_id/disable", post(rules::disable_rule));

    let api_v1 = Router::new()
        .nest("/channel", channel_routes)
        .nest("/campaigns", campaign_routes)
        .nest("/contacts", contact_routes)
        .nest("/templates", template_routes)
        .nest("/rules", rule_routes);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorResponse;
    use crate::handlers::campaigns::{CampaignResponse, CancelResponse, RequeueResponse};
    use crate::handlers::rules::MatchResponse;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use outreach_core::campaign::EnqueueSummary;
    use outreach_core::SimulatedAdapter;
    use outreach_storage::models::{CampaignStats, Contact, Template};
    use outreach_storage::repository::outgoing_messages::PurgeSummary;
    use outreach_storage::DatabasePool;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    async fn server() -> TestServer {
        let db = DatabasePool::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let adapter = Arc::new(SimulatedAdapter::with_latency(Duration::ZERO));
        let state = AppState::new(db, adapter, "+593");
        TestServer::new(create_router(state)).unwrap()
    }

    async fn create_contact(server: &TestServer, phone: &str, name: &str) -> Contact {
        let response = server
            .post("/api/v1/contacts")
            .json(&json!({ "phone": phone, "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Contact>()
    }

    async fn create_template(server: &TestServer, content: &str) -> Template {
        let response = server
            .post("/api/v1/templates")
            .json(&json!({ "name": "Bienvenida", "content": content }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Template>()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let server = server().await;

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["status"], "healthy");

        server.get("/health/live").await.assert_status_ok();
        server.get("/health/ready").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_campaign_lifecycle() {
        let server = server().await;
        create_contact(&server, "+593987654321", "Juan").await;
        create_contact(&server, "+593987654322", "Ana").await;
        let template = create_template(&server, "Hola {nombre}").await;

        let response = server
            .post("/api/v1/campaigns")
            .json(&json!({ "name": "Retiro", "template_id": template.id }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let campaign = response.json::<CampaignResponse>().campaign;
        assert_eq!(campaign.status, "draft");
        let base = format!("/api/v1/campaigns/{}", campaign.id);

        let summary = server
            .post(&format!("{}/enqueue", base))
            .json(&json!({}))
            .await
            .json::<EnqueueSummary>();
        assert_eq!(summary.contacts, 2);
        assert_eq!(summary.messages, 2);

        let started = server.post(&format!("{}/start", base)).await;
        started.assert_status_ok();
        assert_eq!(started.json::<CampaignResponse>().campaign.status, "sending");

        let stats = server
            .get(&format!("{}/stats", base))
            .await
            .json::<CampaignStats>();
        assert_eq!(stats.total_contacts, 2);
        assert_eq!(stats.messages.pending, 2);

        let paused = server.post(&format!("{}/pause", base)).await;
        assert_eq!(paused.json::<CampaignResponse>().campaign.status, "paused");
        let resumed = server.post(&format!("{}/resume", base)).await;
        assert_eq!(resumed.json::<CampaignResponse>().campaign.status, "sending");

        let cancelled = server
            .post(&format!("{}/cancel", base))
            .await
            .json::<CancelResponse>();
        assert_eq!(cancelled.campaign.campaign.status, "cancelled");
        assert_eq!(cancelled.cancelled_messages, 2);

        let restart = server.post(&format!("{}/start", base)).await;
        restart.assert_status(StatusCode::CONFLICT);
        assert_eq!(restart.json::<ErrorResponse>().error, "INVALID_TRANSITION");

        let purged = server
            .post(&format!("{}/cleanup", base))
            .await
            .json::<PurgeSummary>();
        assert_eq!(purged, PurgeSummary { cancelled: 2, failed: 0 });
    }

    #[tokio::test]
    async fn test_requeue_without_failures() {
        let server = server().await;
        let response = server
            .post("/api/v1/campaigns")
            .json(&json!({ "name": "Aviso" }))
            .await;
        let campaign = response.json::<CampaignResponse>().campaign;

        let requeued = server
            .post(&format!("/api/v1/campaigns/{}/requeue", campaign.id))
            .await
            .json::<RequeueResponse>();
        assert_eq!(requeued.requeued, 0);
    }

    #[tokio::test]
    async fn test_enqueue_without_body_or_template_is_rejected() {
        let server = server().await;
        let campaign = server
            .post("/api/v1/campaigns")
            .json(&json!({ "name": "Sin plantilla" }))
            .await
            .json::<CampaignResponse>()
            .campaign;

        let response = server
            .post(&format!("/api/v1/campaigns/{}/enqueue", campaign.id))
            .json(&json!({ "mode": "multi_line" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_campaign_rejects_huge_delay() {
        let server = server().await;
        let response = server
            .post("/api/v1/campaigns")
            .json(&json!({ "name": "Lenta", "delay_between_messages": 1e20 }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<ErrorResponse>().error, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_not_found() {
        let server = server().await;
        let response = server
            .get(&format!("/api/v1/campaigns/{}", uuid::Uuid::now_v7()))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<ErrorResponse>().error, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_campaigns_rejects_unknown_status() {
        let server = server().await;
        let response = server
            .get("/api/v1/campaigns")
            .add_query_param("status", "archived")
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_duplicate_contact_conflicts() {
        let server = server().await;
        create_contact(&server, "+593987654321", "Juan").await;

        let response = server
            .post("/api/v1/contacts")
            .json(&json!({ "phone": "+593987654321", "name": "Juan Carlos" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_opt_out_excludes_contact_from_enqueue() {
        let server = server().await;
        let juan = create_contact(&server, "+593987654321", "Juan").await;
        create_contact(&server, "+593987654322", "Ana").await;

        let contact = server
            .post(&format!("/api/v1/contacts/{}/opt-out", juan.id))
            .await
            .json::<Contact>();
        assert!(!contact.opt_in);

        let campaign = server
            .post("/api/v1/campaigns")
            .json(&json!({ "name": "Aviso" }))
            .await
            .json::<CampaignResponse>()
            .campaign;

        let summary = server
            .post(&format!("/api/v1/campaigns/{}/enqueue", campaign.id))
            .json(&json!({ "body": "Hola {nombre}" }))
            .await
            .json::<EnqueueSummary>();
        assert_eq!(summary.contacts, 1);
    }

    #[tokio::test]
    async fn test_template_in_use_cannot_be_deleted() {
        let server = server().await;
        let template = create_template(&server, "Hola {nombre}, {saludo}").await;
        assert_eq!(template.variables(), vec!["nombre", "saludo"]);

        server
            .post("/api/v1/campaigns")
            .json(&json!({ "name": "Retiro", "template_id": template.id }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .delete(&format!("/api/v1/templates/{}", template.id))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rule_match_and_interaction() {
        let server = server().await;
        let contact = create_contact(&server, "+593987654321", "Juan").await;

        server
            .post("/api/v1/rules")
            .json(&json!({
                "name": "horario",
                "conditions": [{ "type": "contains", "value": "horario" }],
                "response": "Atendemos de 9 a 18",
                "schedule_start": "09:00:00",
                "schedule_end": "18:00:00"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let matched = server
            .post("/api/v1/rules/match")
            .json(&json!({ "text": "Cual es el HORARIO?", "phone": "+593987654321", "at": "10:00:00" }))
            .await
            .json::<MatchResponse>();
        assert!(matched.matched);
        assert_eq!(matched.response.as_deref(), Some("Atendemos de 9 a 18"));

        let outside = server
            .post("/api/v1/rules/match")
            .json(&json!({ "text": "horario", "at": "20:00:00" }))
            .await
            .json::<MatchResponse>();
        assert!(!outside.matched);

        let contact = server
            .get(&format!("/api/v1/contacts/{}", contact.id))
            .await
            .json::<Contact>();
        assert!(contact.last_interaction.is_some());
    }

    #[tokio::test]
    async fn test_channel_status_and_logout() {
        let server = server().await;

        let status = server
            .get("/api/v1/channel/status")
            .await
            .json::<outreach_core::ChannelStatus>();
        assert!(status.connected);
        assert_eq!(status.status, "simulated");

        let logout = server
            .post("/api/v1/channel/logout")
            .await
            .json::<outreach_core::DeliveryOutcome>();
        assert!(logout.ok);
    }
}
