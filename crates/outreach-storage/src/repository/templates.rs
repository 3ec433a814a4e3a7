//! Template repository

use crate::db::{db_err, DatabasePool};
use crate::models::{extract_variables, CreateTemplate, Template, UpdateTemplate};
use chrono::Utc;
use outreach_common::types::TemplateId;
use outreach_common::{Error, Result};
use uuid::Uuid;

/// Template repository
#[derive(Clone)]
pub struct TemplateRepository {
    pool: DatabasePool,
}

impl TemplateRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a template; `variables_used` is derived from the content
    pub async fn create(&self, input: CreateTemplate) -> Result<Template> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let variables = serde_json::to_value(extract_variables(&input.content))
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO templates (
                id, name, content, category, active, variables_used, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.content)
        .bind(input.category.unwrap_or_else(|| "General".to_string()))
        .bind(input.active.unwrap_or(true))
        .bind(&variables)
        .bind(now)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create template".to_string()))
    }

    pub async fn get(&self, id: TemplateId) -> Result<Option<Template>> {
        sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// List templates, optionally only active ones
    pub async fn list(&self, active_only: bool) -> Result<Vec<Template>> {
        let sql = if active_only {
            "SELECT * FROM templates WHERE active = 1 ORDER BY name ASC"
        } else {
            "SELECT * FROM templates ORDER BY name ASC"
        };

        sqlx::query_as::<_, Template>(sql)
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// Update a template, recomputing `variables_used`
    pub async fn update(&self, id: TemplateId, input: UpdateTemplate) -> Result<Template> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {} not found", id)))?;

        let content = input.content.unwrap_or(current.content);
        let variables = serde_json::to_value(extract_variables(&content))
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE templates SET
                name = ?,
                content = ?,
                category = ?,
                active = ?,
                variables_used = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.name.unwrap_or(current.name))
        .bind(&content)
        .bind(input.category.unwrap_or(current.category))
        .bind(input.active.unwrap_or(current.active))
        .bind(&variables)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {} not found", id)))
    }

    /// Delete a template that no campaign references
    pub async fn delete(&self, id: TemplateId) -> Result<()> {
        let (in_use,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE template_id = ?")
                .bind(id)
                .fetch_one(self.pool.pool())
                .await
                .map_err(db_err)?;

        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "Template {} is used by {} campaign(s)",
                id, in_use
            )));
        }

        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Template {} not found", id)));
        }
        Ok(())
    }
}
