//! Shared handler state

use outreach_core::{AutoResponder, CampaignManager, DeliveryAdapter};
use outreach_storage::DatabasePool;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub db_pool: DatabasePool,
    pub campaigns: CampaignManager,
    pub responder: AutoResponder,
    pub adapter: Arc<dyn DeliveryAdapter>,
    /// Country prefix applied to local numbers on contact creation
    pub default_country_code: String,
}

impl AppState {
    pub fn new(
        db_pool: DatabasePool,
        adapter: Arc<dyn DeliveryAdapter>,
        default_country_code: impl Into<String>,
    ) -> Self {
        Self {
            campaigns: CampaignManager::new(db_pool.clone()),
            responder: AutoResponder::new(db_pool.clone()),
            db_pool,
            adapter,
            default_country_code: default_country_code.into(),
        }
    }
}
