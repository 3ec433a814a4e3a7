//! Campaign repository

use crate::db::{db_err, DatabasePool};
use crate::models::{Campaign, CampaignMessageCounts, CampaignStatus, CreateCampaign};
use chrono::Utc;
use outreach_common::types::CampaignId;
use outreach_common::{Error, Result};
use uuid::Uuid;

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: DatabasePool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a new campaign in `draft`
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let (send_speed, delay_between_messages, batch_size, delay_between_batches) =
            input.resolved_pacing();

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, name, template_id, status, scheduled_for, created_by,
                send_speed, batch_size, delay_between_batches, delay_between_messages,
                created_at, updated_at
            )
            VALUES (?, ?, ?, 'draft', ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.template_id)
        .bind(input.scheduled_for)
        .bind(input.created_by.unwrap_or_else(|| "admin".to_string()))
        .bind(send_speed)
        .bind(batch_size)
        .bind(delay_between_batches)
        .bind(delay_between_messages)
        .bind(now)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Error::NotFound("Template not found".to_string())
            }
            other => db_err(other),
        })?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create campaign".to_string()))
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// List campaigns, newest first
    pub async fn list(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                "SELECT * FROM campaigns WHERE status = ? ORDER BY created_at DESC, id DESC",
            )
            .bind(status.to_string())
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_err)
        } else {
            sqlx::query_as::<_, Campaign>(
                "SELECT * FROM campaigns ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_err)
        }
    }

    /// Move a campaign from `from` to `to`.
    ///
    /// Returns `None` when the campaign is no longer in `from`.
    pub async fn update_status(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        let now = Utc::now();
        let started_at = (to == CampaignStatus::Sending).then_some(now);
        let completed_at = to.is_terminal().then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = ?,
                started_at = COALESCE(started_at, ?),
                completed_at = COALESCE(?, completed_at),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.to_string())
        .bind(started_at)
        .bind(completed_at)
        .bind(now)
        .bind(id)
        .bind(from.to_string())
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Cancel a campaign and every still-pending message in one transaction.
    ///
    /// Returns `None` when the campaign is no longer in `from`; otherwise
    /// the updated campaign and the number of messages cancelled.
    pub async fn cancel(
        &self,
        id: CampaignId,
        from: CampaignStatus,
    ) -> Result<Option<(Campaign, u64)>> {
        let now = Utc::now();
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'cancelled',
                completed_at = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(from.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(None);
        }

        let cancelled = sqlx::query(
            "UPDATE outgoing_messages SET status = 'cancelled' WHERE campaign_id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        tx.commit().await.map_err(db_err)?;

        let campaign = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", id)))?;
        Ok(Some((campaign, cancelled)))
    }

    /// Put a completed campaign back in `paused` so requeued work can be resumed
    pub async fn reopen(&self, id: CampaignId) -> Result<Option<Campaign>> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET status = 'paused', completed_at = NULL, updated_at = ?
            WHERE id = ? AND status = 'completed'
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Count the campaign's messages by status
    pub async fn message_counts(&self, id: CampaignId) -> Result<CampaignMessageCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM outgoing_messages WHERE campaign_id = ? GROUP BY status",
        )
        .bind(id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)?;

        let mut counts = CampaignMessageCounts::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => counts.pending = count,
                "sending" => counts.sending = count,
                "sent" => counts.sent = count,
                "failed" => counts.failed = count,
                "cancelled" => counts.cancelled = count,
                _ => {}
            }
        }
        Ok(counts)
    }
}
