//! Outgoing message repository

use crate::db::{db_err, DatabasePool};
use crate::models::{NewOutgoingMessage, OutgoingMessage};
use chrono::Utc;
use outreach_common::types::{CampaignId, OutgoingMessageId};
use outreach_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Records removed by a cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub cancelled: u64,
    pub failed: u64,
}

/// Outgoing message repository
#[derive(Clone)]
pub struct OutgoingMessageRepository {
    pool: DatabasePool,
}

impl OutgoingMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Insert rows for `campaign_id` in the given order and grow its
    /// `total_contacts` by `contacts`, all in one transaction
    pub async fn enqueue(
        &self,
        campaign_id: CampaignId,
        rows: &[NewOutgoingMessage],
        contacts: i32,
    ) -> Result<()> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        for row in rows {
            let attachment = row.attachment.as_ref();
            sqlx::query(
                r#"
                INSERT INTO outgoing_messages (
                    id, campaign_id, contact_id, payload, status, created_at,
                    attachment_path, attachment_type, attachment_caption,
                    line_number, parent_id
                )
                VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.id)
            .bind(row.campaign_id)
            .bind(row.contact_id)
            .bind(&row.payload)
            .bind(row.created_at)
            .bind(attachment.map(|a| a.path.clone()))
            .bind(attachment.map(|a| a.kind.to_string()))
            .bind(attachment.and_then(|a| a.caption.clone()))
            .bind(row.line_number)
            .bind(row.parent_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let updated = sqlx::query(
            "UPDATE campaigns SET total_contacts = total_contacts + ?, updated_at = ? WHERE id = ?",
        )
        .bind(contacts)
        .bind(Utc::now())
        .bind(campaign_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Campaign {} not found", campaign_id)));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    pub async fn get(&self, id: OutgoingMessageId) -> Result<Option<OutgoingMessage>> {
        sqlx::query_as::<_, OutgoingMessage>("SELECT * FROM outgoing_messages WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// All messages of a campaign in queue order, parents included
    pub async fn list_for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<OutgoingMessage>> {
        sqlx::query_as::<_, OutgoingMessage>(
            r#"
            SELECT * FROM outgoing_messages
            WHERE campaign_id = ?
            ORDER BY created_at ASC, COALESCE(parent_id, id) ASC, line_number ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    /// Reset failed messages to pending and take them off the failure counter.
    ///
    /// Multi-line parents that rolled up to `failed` are reset too but do not
    /// count, since only dispatched messages are counted.
    pub async fn requeue_failed(&self, campaign_id: CampaignId) -> Result<u64> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        let (dispatched,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM outgoing_messages m
            WHERE m.campaign_id = ? AND m.status = 'failed'
              AND NOT EXISTS (SELECT 1 FROM outgoing_messages s WHERE s.parent_id = m.id)
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            UPDATE outgoing_messages SET status = 'pending', last_error = NULL
            WHERE campaign_id = ? AND status = 'failed'
            "#,
        )
        .bind(campaign_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "UPDATE campaigns SET failed_count = MAX(failed_count - ?, 0), updated_at = ? WHERE id = ?",
        )
        .bind(dispatched)
        .bind(Utc::now())
        .bind(campaign_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(dispatched as u64)
    }

    /// Delete cancelled and failed records.
    ///
    /// Segments go first; a parent is only removed once none of its
    /// segments remain, so delivered segments are never cascaded away.
    pub async fn purge_cancelled_and_failed(&self, campaign_id: CampaignId) -> Result<PurgeSummary> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;
        let mut summary = PurgeSummary::default();

        for status in ["cancelled", "failed"] {
            let removed = sqlx::query(
                "DELETE FROM outgoing_messages WHERE campaign_id = ? AND status = ? AND line_number > 0",
            )
            .bind(campaign_id)
            .bind(status)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
            summary.add(status, removed);
        }

        for status in ["cancelled", "failed"] {
            let removed = sqlx::query(
                r#"
                DELETE FROM outgoing_messages
                WHERE campaign_id = ? AND status = ? AND line_number = 0
                  AND NOT EXISTS (
                      SELECT 1 FROM outgoing_messages s
                      WHERE s.parent_id = outgoing_messages.id
                  )
                "#,
            )
            .bind(campaign_id)
            .bind(status)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
            summary.add(status, removed);
        }

        tx.commit().await.map_err(db_err)?;
        Ok(summary)
    }
}

impl PurgeSummary {
    fn add(&mut self, status: &str, count: u64) {
        match status {
            "cancelled" => self.cancelled += count,
            _ => self.failed += count,
        }
    }
}
