//! Campaign queue: the persistence contract the send worker drains

use crate::db::{db_err, DatabasePool};
use crate::models::{Campaign, OutgoingMessage, QueuedMessage};
use async_trait::async_trait;
use chrono::Utc;
use outreach_common::types::{CampaignId, OutgoingMessageId};
use outreach_common::Result;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

/// Queue operations used by the send worker
#[async_trait]
pub trait CampaignQueue: Send + Sync {
    /// Campaigns currently in `sending`
    async fn active_campaigns(&self) -> Result<Vec<Campaign>>;

    /// Up to `limit` dispatchable pending messages in queue order
    async fn next_batch(&self, campaign_id: CampaignId, limit: i64) -> Result<Vec<QueuedMessage>>;

    /// `pending -> sending`, bumping attempts. Returns false when the message
    /// left `pending` in the meantime (e.g. its campaign was cancelled).
    async fn mark_attempt_start(&self, message_id: OutgoingMessageId) -> Result<bool>;

    /// Record the delivery result and the campaign counter as one unit
    async fn mark_outcome(&self, message: &OutgoingMessage, ok: bool, info: &str) -> Result<()>;

    /// `sending -> completed` once nothing dispatchable is pending.
    /// Returns whether the campaign was completed.
    async fn mark_campaign_completed(&self, campaign_id: CampaignId) -> Result<bool>;
}

/// SQLite-backed campaign queue
#[derive(Clone)]
pub struct DbCampaignQueue {
    pool: DatabasePool,
}

impl DbCampaignQueue {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Resolve a multi-line parent once its last segment has an outcome
    async fn roll_up_parent(
        tx: &mut Transaction<'_, Sqlite>,
        parent_id: OutgoingMessageId,
    ) -> Result<()> {
        let (outstanding, sent, total): (Option<i64>, Option<i64>, i64) = sqlx::query_as(
            r#"
            SELECT
                SUM(status IN ('pending', 'sending')),
                SUM(status = 'sent'),
                COUNT(*)
            FROM outgoing_messages
            WHERE parent_id = ?
            "#,
        )
        .bind(parent_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(db_err)?;

        if outstanding.unwrap_or(0) > 0 {
            return Ok(());
        }

        if sent.unwrap_or(0) == total {
            sqlx::query(
                "UPDATE outgoing_messages SET status = 'sent', sent_at = ?, last_error = NULL WHERE id = ? AND status = 'pending'",
            )
            .bind(Utc::now())
            .bind(parent_id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        } else {
            let first_error: Option<(Option<String>,)> = sqlx::query_as(
                r#"
                SELECT last_error FROM outgoing_messages
                WHERE parent_id = ? AND status = 'failed'
                ORDER BY line_number ASC
                LIMIT 1
                "#,
            )
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;

            sqlx::query(
                "UPDATE outgoing_messages SET status = 'failed', last_error = ? WHERE id = ? AND status = 'pending'",
            )
            .bind(first_error.and_then(|(e,)| e))
            .bind(parent_id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        }

        debug!(parent_id = %parent_id, "Multi-line parent resolved");
        Ok(())
    }
}

#[async_trait]
impl CampaignQueue for DbCampaignQueue {
    async fn active_campaigns(&self) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE status = 'sending' ORDER BY started_at ASC, id ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn next_batch(&self, campaign_id: CampaignId, limit: i64) -> Result<Vec<QueuedMessage>> {
        // Segments of one parent share created_at; grouping on the parent keeps them adjacent.
        // Parents hold the joined text for the record only and are never dispatched themselves.
        sqlx::query_as::<_, QueuedMessage>(
            r#"
            SELECT m.*, c.name AS contact_name, c.phone AS contact_phone
            FROM outgoing_messages m
            JOIN contacts c ON c.id = m.contact_id
            WHERE m.campaign_id = ? AND m.status = 'pending'
              AND NOT EXISTS (SELECT 1 FROM outgoing_messages s WHERE s.parent_id = m.id)
            ORDER BY m.created_at ASC, COALESCE(m.parent_id, m.id) ASC, m.line_number ASC
            LIMIT ?
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn mark_attempt_start(&self, message_id: OutgoingMessageId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE outgoing_messages SET status = 'sending', attempts = attempts + 1 WHERE id = ? AND status = 'pending'",
        )
        .bind(message_id)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_outcome(&self, message: &OutgoingMessage, ok: bool, info: &str) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        let updated = if ok {
            sqlx::query(
                r#"
                UPDATE outgoing_messages SET
                    status = 'sent', sent_at = ?, last_error = NULL, provider_message_id = ?
                WHERE id = ? AND status = 'sending'
                "#,
            )
            .bind(now)
            .bind(info)
            .bind(message.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
        } else {
            sqlx::query(
                "UPDATE outgoing_messages SET status = 'failed', last_error = ? WHERE id = ? AND status = 'sending'",
            )
            .bind(info)
            .bind(message.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
        };

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(());
        }

        let counter_sql = if ok {
            "UPDATE campaigns SET sent_count = sent_count + 1, updated_at = ? WHERE id = ?"
        } else {
            "UPDATE campaigns SET failed_count = failed_count + 1, updated_at = ? WHERE id = ?"
        };
        sqlx::query(counter_sql)
            .bind(now)
            .bind(message.campaign_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if let Some(parent_id) = message.parent_id {
            Self::roll_up_parent(&mut tx, parent_id).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn mark_campaign_completed(&self, campaign_id: CampaignId) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET status = 'completed', completed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'sending'
              AND NOT EXISTS (
                  SELECT 1 FROM outgoing_messages m
                  WHERE m.campaign_id = campaigns.id AND m.status = 'pending'
                    AND NOT EXISTS (SELECT 1 FROM outgoing_messages s WHERE s.parent_id = m.id)
              )
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(campaign_id)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CampaignStatus, NewOutgoingMessage};
    use crate::repository::test_support::{campaign, contact, test_db};
    use crate::repository::{CampaignRepository, OutgoingMessageRepository};
    use pretty_assertions::assert_eq;

    async fn sending_campaign(db: &DatabasePool) -> Campaign {
        let camp = campaign(db, "Cuaresma").await;
        CampaignRepository::new(db.clone())
            .update_status(camp.id, CampaignStatus::Draft, CampaignStatus::Sending)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_order_keeps_segments_together() {
        let db = test_db().await;
        let queue = DbCampaignQueue::new(db.clone());
        let camp = sending_campaign(&db).await;
        let ana = contact(&db, "+593900000001", "Ana").await;
        let beto = contact(&db, "+593900000002", "Beto").await;

        let now = Utc::now();
        let mut rows = NewOutgoingMessage::multi_line(
            camp.id,
            ana.id,
            "uno\ndos\ntres".to_string(),
            None,
            now,
        );
        rows.extend(NewOutgoingMessage::multi_line(
            camp.id,
            beto.id,
            "a\nb".to_string(),
            None,
            now,
        ));
        OutgoingMessageRepository::new(db.clone())
            .enqueue(camp.id, &rows, 0)
            .await
            .unwrap();

        let batch = queue.next_batch(camp.id, 50).await.unwrap();
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|q| q.message.line_number > 0));

        let ana_lines: Vec<i32> = batch
            .iter()
            .filter(|q| q.contact_name == "Ana")
            .map(|q| q.message.line_number)
            .collect();
        assert_eq!(ana_lines, vec![1, 2, 3]);

        // each contact's segments are contiguous
        let owners: Vec<&str> = batch.iter().map(|q| q.contact_name.as_str()).collect();
        let switches = owners.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(switches, 1);

        assert_eq!(queue.next_batch(camp.id, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_outcome_updates_counters_and_parent() {
        let db = test_db().await;
        let queue = DbCampaignQueue::new(db.clone());
        let messages = OutgoingMessageRepository::new(db.clone());
        let camp = sending_campaign(&db).await;
        let juan = contact(&db, "+593987654321", "Juan").await;

        let rows = NewOutgoingMessage::multi_line(
            camp.id,
            juan.id,
            "Hola Juan\nBendiciones".to_string(),
            None,
            Utc::now(),
        );
        messages.enqueue(camp.id, &rows, 0).await.unwrap();

        let batch = queue.next_batch(camp.id, 10).await.unwrap();
        assert_eq!(batch.len(), 2);

        assert!(queue.mark_attempt_start(batch[0].message.id).await.unwrap());
        queue
            .mark_outcome(&batch[0].message, true, "wamid.1")
            .await
            .unwrap();

        let parent = messages.get(rows[0].id).await.unwrap().unwrap();
        assert_eq!(parent.status, "pending");

        assert!(queue.mark_attempt_start(batch[1].message.id).await.unwrap());
        queue
            .mark_outcome(&batch[1].message, false, "HTTP 500: boom")
            .await
            .unwrap();

        let first = messages.get(batch[0].message.id).await.unwrap().unwrap();
        assert_eq!(first.status, "sent");
        assert_eq!(first.attempts, 1);
        assert_eq!(first.provider_message_id.as_deref(), Some("wamid.1"));
        assert!(first.sent_at.is_some());

        let parent = messages.get(rows[0].id).await.unwrap().unwrap();
        assert_eq!(parent.status, "failed");
        assert_eq!(parent.last_error.as_deref(), Some("HTTP 500: boom"));

        let reloaded = CampaignRepository::new(db.clone())
            .get(camp.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((reloaded.sent_count, reloaded.failed_count), (1, 1));

        assert!(queue.next_batch(camp.id, 10).await.unwrap().is_empty());
        assert!(queue.mark_campaign_completed(camp.id).await.unwrap());
        let done = CampaignRepository::new(db).get(camp.id).await.unwrap().unwrap();
        assert_eq!(done.status, "completed");
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_message_is_not_started() {
        let db = test_db().await;
        let queue = DbCampaignQueue::new(db.clone());
        let camp = sending_campaign(&db).await;
        let ana = contact(&db, "+593900000001", "Ana").await;

        let row = NewOutgoingMessage::single(camp.id, ana.id, "Hola".to_string(), None, Utc::now());
        OutgoingMessageRepository::new(db.clone())
            .enqueue(camp.id, std::slice::from_ref(&row), 1)
            .await
            .unwrap();

        CampaignRepository::new(db.clone())
            .cancel(camp.id, CampaignStatus::Sending)
            .await
            .unwrap()
            .unwrap();

        assert!(!queue.mark_attempt_start(row.id).await.unwrap());
        assert!(queue.active_campaigns().await.unwrap().is_empty());
        assert!(!queue.mark_campaign_completed(camp.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_in_flight_send_survives_cancel() {
        let db = test_db().await;
        let queue = DbCampaignQueue::new(db.clone());
        let campaigns = CampaignRepository::new(db.clone());
        let messages = OutgoingMessageRepository::new(db.clone());
        let camp = sending_campaign(&db).await;
        let ana = contact(&db, "+593900000001", "Ana").await;

        let row = NewOutgoingMessage::single(camp.id, ana.id, "Hola".to_string(), None, Utc::now());
        messages
            .enqueue(camp.id, std::slice::from_ref(&row), 1)
            .await
            .unwrap();

        assert!(queue.mark_attempt_start(row.id).await.unwrap());
        let (_, cancelled) = campaigns
            .cancel(camp.id, CampaignStatus::Sending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled, 0);

        let started = messages.get(row.id).await.unwrap().unwrap();
        queue.mark_outcome(&started, true, "wamid.9").await.unwrap();

        let sent = messages.get(row.id).await.unwrap().unwrap();
        assert_eq!(sent.status, "sent");
        let reloaded = campaigns.get(camp.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, "cancelled");
        assert_eq!(reloaded.sent_count, 1);
    }

    #[tokio::test]
    async fn test_in_flight_segment_leaves_cancelled_parent() {
        let db = test_db().await;
        let queue = DbCampaignQueue::new(db.clone());
        let campaigns = CampaignRepository::new(db.clone());
        let messages = OutgoingMessageRepository::new(db.clone());
        let camp = sending_campaign(&db).await;
        let juan = contact(&db, "+593987654321", "Juan").await;

        let rows = NewOutgoingMessage::multi_line(
            camp.id,
            juan.id,
            "Hola Juan\nBendiciones".to_string(),
            None,
            Utc::now(),
        );
        messages.enqueue(camp.id, &rows, 1).await.unwrap();

        let batch = queue.next_batch(camp.id, 10).await.unwrap();
        let first = &batch[0].message;
        assert!(queue.mark_attempt_start(first.id).await.unwrap());

        let (_, cancelled) = campaigns
            .cancel(camp.id, CampaignStatus::Sending)
            .await
            .unwrap()
            .unwrap();
        // parent and the untouched second segment
        assert_eq!(cancelled, 2);

        queue.mark_outcome(first, true, "wamid.1").await.unwrap();

        let statuses: Vec<String> = row_statuses(&messages, &rows).await;
        assert_eq!(statuses, vec!["cancelled", "sent", "cancelled"]);
        let reloaded = campaigns.get(camp.id).await.unwrap().unwrap();
        assert_eq!((reloaded.sent_count, reloaded.failed_count), (1, 0));
    }

    async fn row_statuses(
        messages: &OutgoingMessageRepository,
        rows: &[NewOutgoingMessage],
    ) -> Vec<String> {
        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            statuses.push(messages.get(row.id).await.unwrap().unwrap().status);
        }
        statuses
    }

    #[tokio::test]
    async fn test_completion_waits_for_pending() {
        let db = test_db().await;
        let queue = DbCampaignQueue::new(db.clone());
        let camp = sending_campaign(&db).await;
        let ana = contact(&db, "+593900000001", "Ana").await;

        let row = NewOutgoingMessage::single(camp.id, ana.id, "Hola".to_string(), None, Utc::now());
        OutgoingMessageRepository::new(db.clone())
            .enqueue(camp.id, std::slice::from_ref(&row), 1)
            .await
            .unwrap();

        assert!(!queue.mark_campaign_completed(camp.id).await.unwrap());
        assert_eq!(queue.active_campaigns().await.unwrap().len(), 1);
    }
}
