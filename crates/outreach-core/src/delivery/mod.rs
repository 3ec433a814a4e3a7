//! Delivery adapters - the external channel messages are sent through

mod gateway;
mod simulated;
mod twilio;

pub use gateway::GatewayAdapter;
pub use simulated::SimulatedAdapter;
pub use twilio::TwilioAdapter;

use async_trait::async_trait;
use outreach_common::config::{DeliveryBackend, DeliveryConfig};
use outreach_common::types::Attachment;
use outreach_common::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of one delivery attempt.
///
/// `info` carries the provider message id on success and a categorized
/// failure reason otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub ok: bool,
    pub info: String,
}

impl DeliveryOutcome {
    pub fn sent(info: impl Into<String>) -> Self {
        Self {
            ok: true,
            info: info.into(),
        }
    }

    pub fn failed(info: impl Into<String>) -> Self {
        Self {
            ok: false,
            info: info.into(),
        }
    }
}

/// Channel readiness as reported by the adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub connected: bool,
    pub status: String,
    /// Pairing payload to show the operator when not connected
    pub qr: Option<String>,
}

/// An outbound messaging channel.
///
/// Implementations never return errors from `send`: every failure is folded
/// into a failed [`DeliveryOutcome`].
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Deliver `text` (and optional attachment) to `phone`
    async fn send(&self, phone: &str, text: &str, attachment: Option<&Attachment>)
        -> DeliveryOutcome;

    /// Report channel readiness
    async fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: true,
            status: "ready".to_string(),
            qr: None,
        }
    }

    /// End the channel session, where the backend has one
    async fn logout(&self) -> DeliveryOutcome {
        DeliveryOutcome::failed(format!("{} does not support logout", self.name()))
    }
}

/// Construct the adapter selected by configuration
pub fn build_adapter(config: &DeliveryConfig) -> Result<Arc<dyn DeliveryAdapter>> {
    let adapter: Arc<dyn DeliveryAdapter> = match config.backend {
        DeliveryBackend::Simulated => Arc::new(SimulatedAdapter::new(&config.simulated)),
        DeliveryBackend::Gateway => Arc::new(GatewayAdapter::new(&config.gateway)?),
        DeliveryBackend::Twilio => Arc::new(TwilioAdapter::new(&config.twilio)?),
    };
    Ok(adapter)
}
