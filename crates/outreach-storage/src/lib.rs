//! Outreach Storage - Database access for the campaign engine
//!
//! This crate owns the SQLite schema, the row models, the repositories used
//! by external collaborators, and the [`CampaignQueue`] contract the send
//! worker drains.

pub mod db;
pub mod models;
pub mod queue;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use queue::{CampaignQueue, DbCampaignQueue};
pub use repository::*;
