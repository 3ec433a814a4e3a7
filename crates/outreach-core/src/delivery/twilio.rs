//! Twilio WhatsApp adapter

use super::{DeliveryAdapter, DeliveryOutcome};
use async_trait::async_trait;
use outreach_common::config::TwilioConfig;
use outreach_common::types::Attachment;
use outreach_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

struct Credentials {
    account_sid: String,
    auth_token: String,
    from: String,
}

/// Adapter for the Twilio Messages API
pub struct TwilioAdapter {
    client: Client,
    api_base: String,
    timeout: Duration,
    credentials: Option<Credentials>,
}

impl TwilioAdapter {
    /// Create the adapter. Missing credentials are reported per send.
    pub fn new(config: &TwilioConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let credentials = match (&config.account_sid, &config.auth_token, &config.from) {
            (Some(sid), Some(token), Some(from))
                if !sid.is_empty() && !token.is_empty() && !from.is_empty() =>
            {
                Some(Credentials {
                    account_sid: sid.clone(),
                    auth_token: token.clone(),
                    from: from.clone(),
                })
            }
            _ => None,
        };

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            credentials,
        })
    }
}

fn whatsapp_address(phone: &str) -> String {
    let trimmed = phone.trim();
    if trimmed.starts_with("whatsapp:") {
        trimmed.to_string()
    } else if trimmed.starts_with('+') {
        format!("whatsapp:{}", trimmed)
    } else {
        format!("whatsapp:+{}", trimmed)
    }
}

#[async_trait]
impl DeliveryAdapter for TwilioAdapter {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send(
        &self,
        phone: &str,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> DeliveryOutcome {
        let Some(creds) = &self.credentials else {
            return DeliveryOutcome::failed(
                "Twilio credentials missing: set account_sid, auth_token and from",
            );
        };

        let mut form = vec![
            ("To", whatsapp_address(phone)),
            ("From", whatsapp_address(&creds.from)),
            ("Body", text.to_string()),
        ];

        if let Some(attachment) = attachment {
            if !attachment.path.starts_with("http://") && !attachment.path.starts_with("https://") {
                return DeliveryOutcome::failed(format!(
                    "Twilio requires a public media URL, got {}",
                    attachment.path
                ));
            }
            form.push(("MediaUrl", attachment.path.clone()));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, creds.account_sid
        );

        let response = match self
            .client
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return DeliveryOutcome::failed(format!(
                    "Timeout: Twilio did not answer within {}s",
                    self.timeout.as_secs()
                ))
            }
            Err(e) if e.is_connect() => {
                return DeliveryOutcome::failed(format!("Connection refused: {}", e))
            }
            Err(e) => return DeliveryOutcome::failed(format!("Unexpected error: {}", e)),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<MessageResource>().await {
                Ok(resource) => DeliveryOutcome::sent(resource.sid),
                Err(e) => DeliveryOutcome::failed(format!("Unexpected error: {}", e)),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let outcome = match serde_json::from_str::<ApiError>(&body) {
            Ok(ApiError {
                code: Some(code),
                message: Some(message),
            }) => DeliveryOutcome::failed(format!("Twilio error {}: {}", code, message)),
            _ => DeliveryOutcome::failed(format!("HTTP {}: {}", status.as_u16(), body)),
        };
        warn!(phone = %phone, reason = %outcome.info, "Twilio send failed");
        outcome
    }
}
