//! Simulated delivery adapter for development and tests

use super::{ChannelStatus, DeliveryAdapter, DeliveryOutcome};
use async_trait::async_trait;
use outreach_common::config::SimulatedConfig;
use outreach_common::types::Attachment;
use std::time::Duration;
use tracing::info;

/// Adapter that always succeeds after a fixed latency
pub struct SimulatedAdapter {
    latency: Duration,
}

impl SimulatedAdapter {
    pub fn new(config: &SimulatedConfig) -> Self {
        Self::with_latency(Duration::from_millis(config.latency_ms))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl DeliveryAdapter for SimulatedAdapter {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn send(
        &self,
        phone: &str,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> DeliveryOutcome {
        info!(
            phone = %phone,
            attachment = attachment.map(|a| a.path.as_str()).unwrap_or("-"),
            "[simulated] {}",
            text
        );

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        DeliveryOutcome::sent("simulated")
    }

    async fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: true,
            status: "simulated".to_string(),
            qr: None,
        }
    }

    async fn logout(&self) -> DeliveryOutcome {
        DeliveryOutcome::sent("simulated")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_common::types::AttachmentKind;

    #[tokio::test]
    async fn test_always_succeeds() {
        let adapter = SimulatedAdapter::with_latency(Duration::ZERO);

        let outcome = adapter.send("+593987654321", "Hola Juan", None).await;
        assert_eq!(outcome, DeliveryOutcome::sent("simulated"));

        let flyer = Attachment {
            path: "flyer.pdf".to_string(),
            kind: AttachmentKind::Document,
            caption: None,
        };
        assert!(adapter.send("+593987654321", "", Some(&flyer)).await.ok);
        assert!(adapter.status().await.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let adapter = SimulatedAdapter::with_latency(Duration::from_millis(500));
        let started = tokio::time::Instant::now();
        adapter.send("+593987654321", "Hola", None).await;
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
