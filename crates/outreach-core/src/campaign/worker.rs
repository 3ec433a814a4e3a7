//! Send Worker - Drains sending campaigns through the delivery adapter

use super::pacing::{BatchPause, PacingPolicy};
use crate::delivery::{DeliveryAdapter, DeliveryOutcome};
use outreach_common::Result;
use outreach_storage::models::{Campaign, QueuedMessage};
use outreach_storage::CampaignQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Single scheduling loop over every campaign in `sending`.
///
/// All progress is persisted per message through the queue, so the worker
/// holds no state between iterations and can stop at any suspension point.
pub struct SendWorker<Q: CampaignQueue> {
    queue: Q,
    adapter: Arc<dyn DeliveryAdapter>,
    pacing: PacingPolicy,
    shutdown: CancellationToken,
}

impl<Q: CampaignQueue> SendWorker<Q> {
    /// Create a new send worker
    pub fn new(
        queue: Q,
        adapter: Arc<dyn DeliveryAdapter>,
        pacing: PacingPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            adapter,
            pacing,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(&self) {
        info!(
            adapter = self.adapter.name(),
            idle_ms = self.pacing.idle_interval.as_millis() as u64,
            "Send worker started"
        );

        while !self.shutdown.is_cancelled() {
            match self.run_once().await {
                Ok(0) => {
                    if !self.suspend(self.pacing.idle_interval).await {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error scanning active campaigns: {}", e);
                    if !self.suspend(self.pacing.idle_interval).await {
                        break;
                    }
                }
            }
        }

        info!("Send worker stopped");
    }

    /// One pass over the active campaigns. Returns how many were visited.
    pub async fn run_once(&self) -> Result<usize> {
        let campaigns = self.queue.active_campaigns().await?;
        if campaigns.is_empty() {
            return Ok(0);
        }

        debug!("Processing {} active campaigns", campaigns.len());

        for campaign in &campaigns {
            if self.shutdown.is_cancelled() {
                break;
            }

            let pause = match self.process_campaign(campaign).await {
                Ok(Some(pause)) => pause,
                Ok(None) => continue,
                Err(e) => {
                    error!(campaign_id = %campaign.id, "Error processing campaign: {}", e);
                    BatchPause::Short(self.pacing.short_pause)
                }
            };

            debug!(campaign_id = %campaign.id, pause = ?pause, "Batch finished");
            if !self.suspend(pause.duration()).await {
                break;
            }
        }

        Ok(campaigns.len())
    }

    /// Process one batch of `campaign`.
    ///
    /// Returns the pause to take before returning to the campaign, or `None`
    /// when it had no pending work left and was completed.
    pub async fn process_campaign(&self, campaign: &Campaign) -> Result<Option<BatchPause>> {
        let batch = self
            .queue
            .next_batch(campaign.id, campaign.batch_limit())
            .await?;

        if batch.is_empty() {
            if self.queue.mark_campaign_completed(campaign.id).await? {
                info!(
                    campaign_id = %campaign.id,
                    name = %campaign.name,
                    "Campaign completed"
                );
            }
            return Ok(None);
        }

        let mut processed = 0usize;
        for queued in &batch {
            if self.shutdown.is_cancelled() {
                break;
            }

            if !self.process_message(queued).await {
                continue;
            }
            processed += 1;

            let delay = self
                .pacing
                .message_delay(campaign, queued.message.line_number);
            if !self.suspend(delay).await {
                break;
            }
        }

        Ok(Some(self.pacing.after_batch(campaign, processed)))
    }

    /// Attempt one message and record its outcome. Never fails the batch.
    ///
    /// Returns false when the message was skipped without reaching the adapter.
    async fn process_message(&self, queued: &QueuedMessage) -> bool {
        let message = &queued.message;

        match self.queue.mark_attempt_start(message.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(message_id = %message.id, "Message left pending before dispatch, skipping");
                return false;
            }
            Err(e) => {
                error!(message_id = %message.id, "Failed to mark attempt start: {}", e);
                return false;
            }
        }

        let outcome = self.dispatch(queued).await;
        let annotation = message
            .attachment()
            .map(|a| format!(" with {} {}", a.kind, a.path))
            .unwrap_or_default();

        if outcome.ok {
            info!(
                campaign_id = %message.campaign_id,
                contact = %queued.contact_name,
                phone = %queued.contact_phone,
                line = message.line_number,
                "Message sent{}",
                annotation
            );
        } else {
            warn!(
                campaign_id = %message.campaign_id,
                contact = %queued.contact_name,
                phone = %queued.contact_phone,
                line = message.line_number,
                reason = %outcome.info,
                "Message failed{}",
                annotation
            );
        }

        if let Err(e) = self
            .queue
            .mark_outcome(message, outcome.ok, &outcome.info)
            .await
        {
            error!(message_id = %message.id, "Failed to record delivery outcome: {}", e);
        }
        true
    }

    /// Call the adapter in its own task so a panic or hang becomes a failure
    async fn dispatch(&self, queued: &QueuedMessage) -> DeliveryOutcome {
        let adapter = Arc::clone(&self.adapter);
        let phone = queued.contact_phone.clone();
        let text = queued.message.payload.clone();
        let attachment = queued.message.attachment();

        let mut handle =
            tokio::spawn(async move { adapter.send(&phone, &text, attachment.as_ref()).await });

        match tokio::time::timeout(self.pacing.send_timeout, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => DeliveryOutcome::failed(format!("Adapter panicked: {}", e)),
            Err(_) => {
                handle.abort();
                DeliveryOutcome::failed(format!(
                    "Send timed out after {}s",
                    self.pacing.send_timeout.as_secs_f64()
                ))
            }
        }
    }

    /// Sleep unless shutdown is requested first. Returns false on shutdown.
    async fn suspend(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.shutdown.is_cancelled();
        }

        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
