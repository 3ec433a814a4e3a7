//! Contact repository

use crate::db::{db_err, DatabasePool};
use crate::models::{Contact, ContactFilter, CreateContact};
use chrono::Utc;
use outreach_common::types::{normalize_phone, ContactId};
use outreach_common::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

/// Contact repository
#[derive(Clone)]
pub struct ContactRepository {
    pool: DatabasePool,
}

impl ContactRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a contact, normalizing its phone number
    pub async fn create(&self, input: CreateContact, default_country: &str) -> Result<Contact> {
        let phone = normalize_phone(&input.phone, default_country);
        if phone.is_empty() {
            return Err(Error::Validation("Phone number is required".to_string()));
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let tags = serde_json::to_value(input.tags.unwrap_or_default()).unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO contacts (
                id, phone, name, email, group_name, opt_in, tags, notes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&phone)
        .bind(&input.name)
        .bind(input.email.unwrap_or_default())
        .bind(input.group_name.unwrap_or_else(|| "General".to_string()))
        .bind(input.opt_in.unwrap_or(true))
        .bind(&tags)
        .bind(input.notes.unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Conflict(format!("Contact with phone {} already exists", phone))
            }
            other => db_err(other),
        })?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Failed to create contact".to_string()))
    }

    pub async fn get(&self, id: ContactId) -> Result<Option<Contact>> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// Look up a contact by its normalized phone number
    pub async fn get_by_phone(&self, phone: &str) -> Result<Option<Contact>> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE phone = ?")
            .bind(phone)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// Opted-in contacts selected by `filter`, ordered by name
    pub async fn list_opted_in(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM contacts WHERE opt_in = 1");

        match filter {
            ContactFilter::All => {}
            ContactFilter::Groups(groups) => {
                if groups.is_empty() {
                    return Ok(Vec::new());
                }
                query.push(" AND group_name IN (");
                let mut separated = query.separated(", ");
                for group in groups {
                    separated.push_bind(group.clone());
                }
                separated.push_unseparated(")");
            }
            ContactFilter::Contacts(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                query.push(" AND id IN (");
                let mut separated = query.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
        }

        query.push(" ORDER BY name ASC, phone ASC");

        query
            .build_query_as::<Contact>()
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_err)
    }

    /// Opt a contact in or out of campaigns
    pub async fn set_opt_in(&self, id: ContactId, opt_in: bool) -> Result<()> {
        let result = sqlx::query("UPDATE contacts SET opt_in = ?, updated_at = ? WHERE id = ?")
            .bind(opt_in)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Contact {} not found", id)));
        }
        Ok(())
    }

    /// Record an interaction with the contact
    pub async fn touch_interaction(&self, id: ContactId) -> Result<()> {
        let now = Utc::now();
        sqlx::query("UPDATE contacts SET last_interaction = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
