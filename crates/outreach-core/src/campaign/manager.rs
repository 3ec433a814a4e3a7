//! Campaign Manager - Campaign lifecycle and queue population

use super::template::TemplateRenderer;
use chrono::Utc;
use outreach_common::types::{Attachment, CampaignId};
use outreach_common::{Error, Result};
use outreach_storage::models::{
    Campaign, CampaignStats, CampaignStatus, ContactFilter, CreateCampaign, NewOutgoingMessage,
};
use outreach_storage::repository::outgoing_messages::PurgeSummary;
use outreach_storage::repository::{
    CampaignRepository, ContactRepository, OutgoingMessageRepository, TemplateRepository,
};
use outreach_storage::DatabasePool;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How a rendered payload is turned into queue rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// One message per contact
    #[default]
    Single,
    /// One segment per non-blank line, linked to a parent record
    MultiLine,
}

/// Bulk "render against N contacts" request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub contacts: ContactFilter,
    #[serde(default)]
    pub mode: SendMode,
    /// Body to render; defaults to the campaign's template content
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
}

/// Result of a bulk enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueSummary {
    pub contacts: usize,
    pub messages: usize,
}

/// Campaign Manager - Manages campaign lifecycle for external collaborators
pub struct CampaignManager {
    campaign_repo: CampaignRepository,
    contact_repo: ContactRepository,
    template_repo: TemplateRepository,
    message_repo: OutgoingMessageRepository,
    renderer: TemplateRenderer,
}

impl CampaignManager {
    /// Create a new campaign manager
    pub fn new(db_pool: DatabasePool) -> Self {
        Self {
            campaign_repo: CampaignRepository::new(db_pool.clone()),
            contact_repo: ContactRepository::new(db_pool.clone()),
            template_repo: TemplateRepository::new(db_pool.clone()),
            message_repo: OutgoingMessageRepository::new(db_pool),
            renderer: TemplateRenderer::new(),
        }
    }

    /// Create a campaign in `draft`
    pub async fn create_campaign(&self, input: CreateCampaign) -> Result<Campaign> {
        if input.name.trim().is_empty() {
            return Err(Error::Validation("Campaign name is required".to_string()));
        }
        input.validate_pacing().map_err(Error::Validation)?;

        if let Some(template_id) = input.template_id {
            if self.template_repo.get(template_id).await?.is_none() {
                return Err(Error::NotFound(format!("Template {} not found", template_id)));
            }
        }

        let campaign = self.campaign_repo.create(input).await?;
        info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
        Ok(campaign)
    }

    /// Get a campaign or fail with `NotFound`
    pub async fn get_campaign(&self, id: CampaignId) -> Result<Campaign> {
        self.campaign_repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", id)))
    }

    pub async fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        self.campaign_repo.list(status).await
    }

    /// Render the body against the selected contacts and enqueue the result
    pub async fn enqueue(&self, id: CampaignId, request: EnqueueRequest) -> Result<EnqueueSummary> {
        let campaign = self.get_campaign(id).await?;
        let status = current_status(&campaign)?;
        if status.is_terminal() {
            return Err(Error::Conflict(format!(
                "Campaign {} is {} and accepts no new messages",
                id, status
            )));
        }

        let body = match (request.body, campaign.template_id) {
            (Some(body), _) => body,
            (None, Some(template_id)) => {
                self.template_repo
                    .get(template_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Template {} not found", template_id)))?
                    .content
            }
            (None, None) => {
                return Err(Error::Validation(
                    "A message body is required when the campaign has no template".to_string(),
                ))
            }
        };

        if body.trim().is_empty() && request.attachment.is_none() {
            return Err(Error::Validation("Message body is empty".to_string()));
        }

        let contacts = self.contact_repo.list_opted_in(&request.contacts).await?;
        if contacts.is_empty() {
            warn!(campaign_id = %id, "No opted-in contacts matched, nothing enqueued");
            return Ok(EnqueueSummary {
                contacts: 0,
                messages: 0,
            });
        }

        let now = Utc::now();
        let mut rows = Vec::new();
        for contact in &contacts {
            let payload = self.renderer.render_for_contact(&body, contact);
            match request.mode {
                SendMode::Single => rows.push(NewOutgoingMessage::single(
                    id,
                    contact.id,
                    payload,
                    request.attachment.clone(),
                    now,
                )),
                SendMode::MultiLine => rows.extend(NewOutgoingMessage::multi_line(
                    id,
                    contact.id,
                    payload,
                    request.attachment.clone(),
                    now,
                )),
            }
        }

        self.message_repo
            .enqueue(id, &rows, contacts.len() as i32)
            .await?;

        info!(
            campaign_id = %id,
            contacts = contacts.len(),
            messages = rows.len(),
            mode = ?request.mode,
            "Messages enqueued"
        );

        Ok(EnqueueSummary {
            contacts: contacts.len(),
            messages: rows.len(),
        })
    }

    /// `draft -> ready`
    pub async fn mark_ready(&self, id: CampaignId) -> Result<Campaign> {
        self.transition(id, &[CampaignStatus::Draft], CampaignStatus::Ready)
            .await
    }

    /// `draft | ready -> sending`; the worker picks it up on its next scan
    pub async fn start(&self, id: CampaignId) -> Result<Campaign> {
        self.transition(
            id,
            &[CampaignStatus::Draft, CampaignStatus::Ready],
            CampaignStatus::Sending,
        )
        .await
    }

    /// `sending -> paused`
    pub async fn pause(&self, id: CampaignId) -> Result<Campaign> {
        self.transition(id, &[CampaignStatus::Sending], CampaignStatus::Paused)
            .await
    }

    /// `paused -> sending`
    pub async fn resume(&self, id: CampaignId) -> Result<Campaign> {
        self.transition(id, &[CampaignStatus::Paused], CampaignStatus::Sending)
            .await
    }

    /// `sending | paused -> failed`
    pub async fn fail(&self, id: CampaignId) -> Result<Campaign> {
        self.transition(
            id,
            &[CampaignStatus::Sending, CampaignStatus::Paused],
            CampaignStatus::Failed,
        )
        .await
    }

    /// Cancel a non-terminal campaign and its pending messages atomically.
    ///
    /// Messages already in flight keep their eventual outcome.
    pub async fn cancel(&self, id: CampaignId) -> Result<(Campaign, u64)> {
        let campaign = self.get_campaign(id).await?;
        let from = current_status(&campaign)?;
        ensure_transition(from, CampaignStatus::Cancelled)?;

        match self.campaign_repo.cancel(id, from).await? {
            Some((campaign, cancelled)) => {
                info!(campaign_id = %id, cancelled, "Campaign cancelled");
                Ok((campaign, cancelled))
            }
            None => Err(self.stale_transition(id, CampaignStatus::Cancelled).await),
        }
    }

    /// Reset failed messages to pending. A completed campaign is reopened
    /// as `paused` so the operator can resume it.
    pub async fn requeue_failed(&self, id: CampaignId) -> Result<u64> {
        let campaign = self.get_campaign(id).await?;
        let status = current_status(&campaign)?;
        if matches!(status, CampaignStatus::Cancelled | CampaignStatus::Failed) {
            return Err(Error::Conflict(format!(
                "Campaign {} is {}; failed messages cannot be requeued",
                id, status
            )));
        }

        let requeued = self.message_repo.requeue_failed(id).await?;
        if requeued > 0 && status == CampaignStatus::Completed {
            self.campaign_repo.reopen(id).await?;
        }

        info!(campaign_id = %id, requeued, "Failed messages requeued");
        Ok(requeued)
    }

    /// Delete cancelled and failed message records
    pub async fn purge_cancelled_and_failed(&self, id: CampaignId) -> Result<PurgeSummary> {
        self.get_campaign(id).await?;
        let summary = self.message_repo.purge_cancelled_and_failed(id).await?;
        info!(
            campaign_id = %id,
            cancelled = summary.cancelled,
            failed = summary.failed,
            "Campaign messages purged"
        );
        Ok(summary)
    }

    /// Counters, rates and per-status message counts
    pub async fn stats(&self, id: CampaignId) -> Result<CampaignStats> {
        let campaign = self.get_campaign(id).await?;
        let messages = self.campaign_repo.message_counts(id).await?;

        Ok(CampaignStats {
            campaign_id: campaign.id,
            status: campaign.status.clone(),
            total_contacts: campaign.total_contacts,
            sent_count: campaign.sent_count,
            failed_count: campaign.failed_count,
            success_rate: campaign.success_rate(),
            progress_percentage: campaign.progress_percentage(),
            messages,
        })
    }

    async fn transition(
        &self,
        id: CampaignId,
        allowed_from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Campaign> {
        let campaign = self.get_campaign(id).await?;
        let from = current_status(&campaign)?;
        if !allowed_from.contains(&from) {
            return Err(invalid(from, to));
        }
        ensure_transition(from, to)?;

        match self.campaign_repo.update_status(id, from, to).await? {
            Some(updated) => {
                info!(campaign_id = %id, from = %from, to = %to, "Campaign status changed");
                Ok(updated)
            }
            None => Err(self.stale_transition(id, to).await),
        }
    }

    /// Error for a transition that lost a race with another writer
    async fn stale_transition(&self, id: CampaignId, to: CampaignStatus) -> Error {
        match self.get_campaign(id).await {
            Ok(campaign) => Error::InvalidTransition {
                from: campaign.status,
                to: to.to_string(),
            },
            Err(e) => e,
        }
    }
}

fn current_status(campaign: &Campaign) -> Result<CampaignStatus> {
    campaign.status_enum().ok_or_else(|| {
        Error::Internal(format!(
            "Campaign {} has unknown status {}",
            campaign.id, campaign.status
        ))
    })
}

fn invalid(from: CampaignStatus, to: CampaignStatus) -> Error {
    Error::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn ensure_transition(from: CampaignStatus, to: CampaignStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_common::types::AttachmentKind;
    use outreach_storage::models::{CreateContact, CreateTemplate, OutgoingMessageStatus};
    use pretty_assertions::assert_eq;

    async fn setup() -> (DatabasePool, CampaignManager) {
        let db = DatabasePool::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let manager = CampaignManager::new(db.clone());
        (db, manager)
    }

    async fn add_contact(db: &DatabasePool, phone: &str, name: &str, group: &str) {
        ContactRepository::new(db.clone())
            .create(
                CreateContact {
                    phone: phone.to_string(),
                    name: name.to_string(),
                    group_name: Some(group.to_string()),
                    ..Default::default()
                },
                "+593",
            )
            .await
            .unwrap();
    }

    fn named(name: &str) -> CreateCampaign {
        CreateCampaign {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enqueue_renders_template_per_contact() {
        let (db, manager) = setup().await;
        add_contact(&db, "+593987654321", "Juan", "General").await;
        add_contact(&db, "+593987654322", "Maria", "Coro").await;

        let template = TemplateRepository::new(db.clone())
            .create(CreateTemplate {
                name: "Saludo".to_string(),
                content: "Hola {nombre}".to_string(),
                category: None,
                active: None,
            })
            .await
            .unwrap();

        let campaign = manager
            .create_campaign(CreateCampaign {
                name: "Domingo".to_string(),
                template_id: Some(template.id),
                ..Default::default()
            })
            .await
            .unwrap();

        let summary = manager
            .enqueue(campaign.id, EnqueueRequest::default())
            .await
            .unwrap();
        assert_eq!(summary, EnqueueSummary { contacts: 2, messages: 2 });

        let mut payloads: Vec<String> = OutgoingMessageRepository::new(db.clone())
            .list_for_campaign(campaign.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.payload)
            .collect();
        payloads.sort();
        assert_eq!(payloads, vec!["Hola Juan", "Hola Maria"]);

        let reloaded = manager.get_campaign(campaign.id).await.unwrap();
        assert_eq!(reloaded.total_contacts, 2);
    }

    #[tokio::test]
    async fn test_enqueue_multi_line_with_attachment() {
        let (db, manager) = setup().await;
        add_contact(&db, "+593987654321", "Juan", "Coro").await;
        add_contact(&db, "+593987654322", "Maria", "General").await;

        let campaign = manager.create_campaign(named("Ensayo")).await.unwrap();
        let summary = manager
            .enqueue(
                campaign.id,
                EnqueueRequest {
                    contacts: ContactFilter::Groups(vec!["Coro".to_string()]),
                    mode: SendMode::MultiLine,
                    body: Some("{nombre}:\nEnsayo a las 7\n\nTraer partituras".to_string()),
                    attachment: Some(Attachment {
                        path: "partitura.pdf".to_string(),
                        kind: AttachmentKind::Document,
                        caption: None,
                    }),
                },
            )
            .await
            .unwrap();
        assert_eq!(summary, EnqueueSummary { contacts: 1, messages: 4 });

        let rows = OutgoingMessageRepository::new(db.clone())
            .list_for_campaign(campaign.id)
            .await
            .unwrap();
        let lines: Vec<(i32, &str, bool)> = rows
            .iter()
            .map(|m| (m.line_number, m.payload.as_str(), m.attachment().is_some()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (0, "Juan:\nEnsayo a las 7\n\nTraer partituras", true),
                (1, "Juan:", true),
                (2, "Ensayo a las 7", false),
                (3, "Traer partituras", false),
            ]
        );
    }

    #[tokio::test]
    async fn test_enqueue_without_body_or_template_rejected() {
        let (_db, manager) = setup().await;
        let campaign = manager.create_campaign(named("Vacia")).await.unwrap();
        let err = manager
            .enqueue(campaign.id, EnqueueRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unbounded_delays() {
        let (_db, manager) = setup().await;
        for delay in [1e20, f64::INFINITY, f64::NAN, -1.0] {
            let err = manager
                .create_campaign(CreateCampaign {
                    delay_between_messages: Some(delay),
                    ..named("Lenta")
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "delay {}", delay);
        }

        let err = manager
            .create_campaign(CreateCampaign {
                delay_between_batches: Some(i64::MAX),
                ..named("Lenta")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let accepted = manager
            .create_campaign(CreateCampaign {
                delay_between_messages: Some(0.0),
                ..named("Rapida")
            })
            .await
            .unwrap();
        assert_eq!(accepted.message_delay(), std::time::Duration::ZERO);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let (_db, manager) = setup().await;
        let campaign = manager.create_campaign(named("Ciclo")).await.unwrap();

        let err = manager.pause(campaign.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        assert_eq!(manager.mark_ready(campaign.id).await.unwrap().status, "ready");
        assert_eq!(manager.start(campaign.id).await.unwrap().status, "sending");
        assert_eq!(manager.pause(campaign.id).await.unwrap().status, "paused");

        let err = manager.start(campaign.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        assert_eq!(manager.resume(campaign.id).await.unwrap().status, "sending");
        let (cancelled, count) = manager.cancel(campaign.id).await.unwrap();
        assert_eq!(cancelled.status, "cancelled");
        assert_eq!(count, 0);

        let err = manager.resume(campaign.id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition: cancelled -> sending"
        );
        assert!(manager.cancel(campaign.id).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_five_pending_two_sent() {
        let (db, manager) = setup().await;
        for i in 1..=7 {
            add_contact(&db, &format!("+59390000000{}", i), &format!("C{}", i), "General").await;
        }
        let campaign = manager.create_campaign(named("Cancelar")).await.unwrap();
        manager
            .enqueue(
                campaign.id,
                EnqueueRequest {
                    body: Some("Hola {nombre}".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        manager.start(campaign.id).await.unwrap();

        let messages = OutgoingMessageRepository::new(db.clone());
        let rows = messages.list_for_campaign(campaign.id).await.unwrap();
        for row in &rows[..2] {
            deliver(&db, row.id).await;
        }

        let (cancelled, count) = manager.cancel(campaign.id).await.unwrap();
        assert_eq!(count, 5);
        assert_eq!(cancelled.status, "cancelled");

        let statuses: Vec<_> = messages
            .list_for_campaign(campaign.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.status_enum().unwrap())
            .collect();
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == OutgoingMessageStatus::Sent)
                .count(),
            2
        );
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == OutgoingMessageStatus::Cancelled)
                .count(),
            5
        );

        let stats = manager.stats(campaign.id).await.unwrap();
        assert_eq!(stats.messages.cancelled, 5);
        assert_eq!(stats.messages.sent, 2);
        assert_eq!(stats.total_contacts, 7);
    }

    #[tokio::test]
    async fn test_stats_on_empty_campaign() {
        let (_db, manager) = setup().await;
        let campaign = manager.create_campaign(named("Nada")).await.unwrap();
        let stats = manager.stats(campaign.id).await.unwrap();
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.progress_percentage, 0.0);
    }

    async fn deliver(db: &DatabasePool, id: uuid::Uuid) {
        use outreach_storage::{CampaignQueue, DbCampaignQueue};

        let queue = DbCampaignQueue::new(db.clone());
        assert!(queue.mark_attempt_start(id).await.unwrap());
        let message = OutgoingMessageRepository::new(db.clone())
            .get(id)
            .await
            .unwrap()
            .unwrap();
        queue.mark_outcome(&message, true, "ok").await.unwrap();
    }
}
