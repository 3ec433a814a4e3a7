//! Auto-reply rule repository

use crate::db::{db_err, DatabasePool};
use crate::models::{CreateRule, Rule};
use chrono::{NaiveTime, Utc};
use outreach_common::types::RuleId;
use outreach_common::{Error, Result};
use uuid::Uuid;

/// Rule repository
#[derive(Clone)]
pub struct RuleRepository {
    pool: DatabasePool,
}

impl RuleRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a rule; conditions arrive typed, so only valid kinds are stored
    pub async fn create(&self, input: CreateRule) -> Result<Rule> {
        if input.response.trim().is_empty() {
            return Err(Error::Validation("Rule response is required".to_string()));
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let conditions = serde_json::to_value(&input.conditions)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let start = input.schedule_start.unwrap_or(NaiveTime::MIN);
        let end = input
            .schedule_end
            .or_else(|| NaiveTime::from_hms_opt(23, 59, 59))
            .unwrap_or(NaiveTime::MIN);

        sqlx::query(
            r#"
            INSERT INTO rules (
                id, name, priority, active, conditions, response,
                schedule_start, schedule_end, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.priority.unwrap_or(999))
        .bind(input.active.unwrap_or(true))
        .bind(&conditions)
        .bind(&input.response)
        .bind(start)
        .bind(end)
        .bind(now)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create rule".to_string()))
    }

    pub async fn get(&self, id: RuleId) -> Result<Option<Rule>> {
        sqlx::query_as::<_, Rule>("SELECT * FROM rules WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// Active rules in evaluation order
    pub async fn list_active(&self) -> Result<Vec<Rule>> {
        sqlx::query_as::<_, Rule>(
            "SELECT * FROM rules WHERE active = 1 ORDER BY priority ASC, name ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    pub async fn set_active(&self, id: RuleId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE rules SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Rule {} not found", id)));
        }
        Ok(())
    }
}
