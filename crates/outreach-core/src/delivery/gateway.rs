//! HTTP channel gateway adapter
//!
//! Talks to a companion service that holds the authenticated channel session:
//! `POST /send`, `POST /send-media`, `GET /health`, `GET /qr`, `POST /logout`.

use super::{ChannelStatus, DeliveryAdapter, DeliveryOutcome};
use async_trait::async_trait;
use outreach_common::config::GatewayConfig;
use outreach_common::types::{phone_digits, Attachment};
use outreach_common::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Failure reason for a 503 from the gateway
pub const CHANNEL_NOT_READY: &str = "Channel not connected: scan the QR code to pair the device";

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMediaRequest<'a> {
    phone: &'a str,
    message: &'a str,
    media_path: String,
    media_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(default)]
    success: bool,
    message_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct QrResponse {
    qr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogoutResponse {
    #[serde(default)]
    success: bool,
    error: Option<String>,
}

/// Gateway-backed delivery adapter
pub struct GatewayAdapter {
    client: Client,
    base_url: String,
    text_timeout: Duration,
    media_timeout: Duration,
    status_timeout: Duration,
    media_root: PathBuf,
}

impl GatewayAdapter {
    /// Create a new gateway adapter
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            text_timeout: Duration::from_secs(config.text_timeout_secs),
            media_timeout: Duration::from_secs(config.media_timeout_secs),
            status_timeout: Duration::from_secs(config.status_timeout_secs),
            media_root: config.media_root.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Absolute path of an attachment as the gateway should read it
    fn media_path(&self, attachment: &Attachment) -> String {
        let path = Path::new(&attachment.path);
        if path.is_absolute() {
            attachment.path.clone()
        } else {
            self.media_root.join(path).to_string_lossy().into_owned()
        }
    }

    /// Categorize a transport error
    fn transport_failure(&self, err: &reqwest::Error, timeout: Duration) -> String {
        if err.is_timeout() {
            format!(
                "Timeout: gateway did not answer within {}s",
                timeout.as_secs()
            )
        } else if err.is_connect() {
            format!("Connection refused: gateway unreachable at {}", self.base_url)
        } else {
            format!("Unexpected error: {}", err)
        }
    }

    async fn post_send<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> DeliveryOutcome {
        let response = match self
            .client
            .post(self.url(path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::failed(self.transport_failure(&e, timeout)),
        };

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return DeliveryOutcome::failed(CHANNEL_NOT_READY);
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return DeliveryOutcome::failed(format!("HTTP {}: {}", status.as_u16(), body));
        }

        match response.json::<SendResponse>().await {
            Ok(SendResponse {
                success: true,
                message_id,
                ..
            }) => DeliveryOutcome::sent(message_id.unwrap_or_default()),
            Ok(SendResponse { error, .. }) => DeliveryOutcome::failed(
                error.unwrap_or_else(|| "Gateway reported an unknown error".to_string()),
            ),
            Err(e) => DeliveryOutcome::failed(self.transport_failure(&e, timeout)),
        }
    }

    async fn fetch_qr(&self) -> Option<String> {
        let response = self
            .client
            .get(self.url("/qr"))
            .timeout(self.status_timeout)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response.json::<QrResponse>().await.ok()?.qr
    }
}

#[async_trait]
impl DeliveryAdapter for GatewayAdapter {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn send(
        &self,
        phone: &str,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> DeliveryOutcome {
        let phone = phone_digits(phone);

        let outcome = match attachment {
            Some(attachment) => {
                let body = SendMediaRequest {
                    phone: &phone,
                    message: text,
                    media_path: self.media_path(attachment),
                    media_type: attachment.kind.to_string(),
                };
                self.post_send("/send-media", &body, self.media_timeout).await
            }
            None => {
                let body = SendRequest {
                    phone: &phone,
                    message: text,
                };
                self.post_send("/send", &body, self.text_timeout).await
            }
        };

        if outcome.ok {
            debug!(phone = %phone, message_id = %outcome.info, "Gateway accepted message");
        } else {
            warn!(phone = %phone, reason = %outcome.info, "Gateway send failed");
        }
        outcome
    }

    async fn status(&self) -> ChannelStatus {
        let health = self
            .client
            .get(self.url("/health"))
            .timeout(self.status_timeout)
            .send()
            .await;

        let status = match health {
            Ok(response) if response.status().is_success() => response
                .json::<HealthResponse>()
                .await
                .map(|h| h.status)
                .unwrap_or_else(|_| "unknown".to_string()),
            Ok(response) => format!("HTTP {}", response.status().as_u16()),
            Err(e) => {
                return ChannelStatus {
                    connected: false,
                    status: self.transport_failure(&e, self.status_timeout),
                    qr: None,
                }
            }
        };

        if status == "ready" {
            return ChannelStatus {
                connected: true,
                status,
                qr: None,
            };
        }

        ChannelStatus {
            connected: false,
            status,
            qr: self.fetch_qr().await,
        }
    }

    async fn logout(&self) -> DeliveryOutcome {
        let response = match self
            .client
            .post(self.url("/logout"))
            .timeout(self.status_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return DeliveryOutcome::failed(self.transport_failure(&e, self.status_timeout))
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return DeliveryOutcome::failed(format!("HTTP {}: {}", status, body));
        }

        match response.json::<LogoutResponse>().await {
            Ok(LogoutResponse { success: true, .. }) => DeliveryOutcome::sent("logged out"),
            Ok(LogoutResponse { error, .. }) => DeliveryOutcome::failed(
                error.unwrap_or_else(|| "Gateway refused logout".to_string()),
            ),
            Err(e) => DeliveryOutcome::failed(format!("Unexpected error: {}", e)),
        }
    }
}
