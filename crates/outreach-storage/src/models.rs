//! Database models

use chrono::{DateTime, NaiveTime, Utc};
use outreach_common::types::{
    Attachment, AttachmentKind, CampaignId, ContactId, OutgoingMessageId, RuleId, TemplateId,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Contacts
// ============================================================================

/// Contact model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    /// Normalized international phone number
    pub phone: String,
    pub name: String,
    pub email: String,
    pub group_name: String,
    pub opt_in: bool,
    /// Tags as JSON array of strings
    pub tags: serde_json::Value,
    pub notes: String,
    pub last_interaction: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Get tags as a vector
    pub fn tags_vec(&self) -> Vec<String> {
        serde_json::from_value(self.tags.clone()).unwrap_or_default()
    }
}

/// Create contact input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContact {
    /// Raw phone number, normalized on insert
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub group_name: Option<String>,
    pub opt_in: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Which opted-in contacts a bulk enqueue targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ContactFilter {
    #[default]
    All,
    Groups(Vec<String>),
    Contacts(Vec<ContactId>),
}

// ============================================================================
// Templates
// ============================================================================

/// Matches `{name}` placeholders; group 1 is the name
pub fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"))
}

/// Collect the distinct `{name}` placeholders present in a template body
pub fn extract_variables(content: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Template model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub content: String,
    pub category: String,
    pub active: bool,
    /// Placeholder names found in `content`, recomputed on every save
    pub variables_used: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Get the stored variable names
    pub fn variables(&self) -> Vec<String> {
        serde_json::from_value(self.variables_used.clone()).unwrap_or_default()
    }
}

/// Create template input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    pub content: String,
    pub category: Option<String>,
    pub active: Option<bool>,
}

/// Update template input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
}

// ============================================================================
// Campaigns
// ============================================================================

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Ready,
    Sending,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl CampaignStatus {
    /// Terminal campaigns are ignored by the worker and accept no transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Cancelled | CampaignStatus::Failed
        )
    }

    /// Whether the lifecycle graph allows moving to `next`
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Cancelled) => true,
            (Draft, Ready) => true,
            (Draft | Ready, Sending) => true,
            (Sending, Paused) => true,
            (Paused, Sending) => true,
            (Sending, Completed) => true,
            (Sending | Paused, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Ready => write!(f, "ready"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Paused => write!(f, "paused"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Cancelled => write!(f, "cancelled"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "ready" => Ok(CampaignStatus::Ready),
            "sending" => Ok(CampaignStatus::Sending),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    /// None for ad-hoc quick sends
    pub template_id: Option<TemplateId>,
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_by: String,
    pub total_contacts: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    /// Messages per minute the pacing was derived from
    pub send_speed: i32,
    pub batch_size: i32,
    /// Seconds
    pub delay_between_batches: i64,
    /// Seconds
    pub delay_between_messages: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Share of contacts delivered, as a percentage in `[0, 100]`
    pub fn success_rate(&self) -> f64 {
        if self.total_contacts <= 0 {
            return 0.0;
        }
        let rate = (self.sent_count as f64 / self.total_contacts as f64) * 100.0;
        rate.clamp(0.0, 100.0)
    }

    /// Share of contacts with a final outcome, as a percentage in `[0, 100]`
    pub fn progress_percentage(&self) -> f64 {
        if self.total_contacts <= 0 {
            return 0.0;
        }
        let done = (self.sent_count + self.failed_count) as f64;
        (done / self.total_contacts as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Pause between consecutive messages
    pub fn message_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_between_messages.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Pause after a full batch
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.delay_between_batches.max(0) as u64)
    }

    /// Batch size as a query limit, never below one
    pub fn batch_limit(&self) -> i64 {
        i64::from(self.batch_size.max(1))
    }
}

/// Create campaign input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub template_id: Option<TemplateId>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    /// Messages per minute; derives `delay_between_messages` when that is unset
    pub send_speed: Option<i32>,
    pub batch_size: Option<i32>,
    pub delay_between_batches: Option<i64>,
    pub delay_between_messages: Option<f64>,
}

pub const DEFAULT_SEND_SPEED: i32 = 10;
pub const DEFAULT_BATCH_SIZE: i32 = 50;
pub const DEFAULT_DELAY_BETWEEN_BATCHES: i64 = 60;
pub const DEFAULT_DELAY_BETWEEN_MESSAGES: f64 = 6.0;
/// Upper bound in seconds for either pacing delay
pub const MAX_PACING_DELAY_SECS: i64 = 86_400;

impl CreateCampaign {
    /// Reject pacing delays that are not finite or fall outside `[0, MAX_PACING_DELAY_SECS]`
    pub fn validate_pacing(&self) -> Result<(), String> {
        let max = MAX_PACING_DELAY_SECS as f64;
        if let Some(delay) = self.delay_between_messages {
            if !delay.is_finite() || !(0.0..=max).contains(&delay) {
                return Err(format!(
                    "delay_between_messages must be between 0 and {} seconds",
                    MAX_PACING_DELAY_SECS
                ));
            }
        }
        if let Some(delay) = self.delay_between_batches {
            if !(0..=MAX_PACING_DELAY_SECS).contains(&delay) {
                return Err(format!(
                    "delay_between_batches must be between 0 and {} seconds",
                    MAX_PACING_DELAY_SECS
                ));
            }
        }
        Ok(())
    }

    /// Resolve the pacing triple `(send_speed, delay_between_messages, batch_size, delay_between_batches)`
    pub fn resolved_pacing(&self) -> (i32, f64, i32, i64) {
        let send_speed = self.send_speed.filter(|s| *s > 0);
        let delay_between_messages = match (self.delay_between_messages, send_speed) {
            (Some(delay), _) if delay.is_finite() => {
                delay.clamp(0.0, MAX_PACING_DELAY_SECS as f64)
            }
            (_, Some(speed)) => 60.0 / f64::from(speed),
            (Some(_), None) => DEFAULT_DELAY_BETWEEN_MESSAGES,
            (None, None) => DEFAULT_DELAY_BETWEEN_MESSAGES,
        };

        (
            send_speed.unwrap_or(DEFAULT_SEND_SPEED),
            delay_between_messages,
            self.batch_size.filter(|b| *b > 0).unwrap_or(DEFAULT_BATCH_SIZE),
            self.delay_between_batches
                .map(|d| d.clamp(0, MAX_PACING_DELAY_SECS))
                .unwrap_or(DEFAULT_DELAY_BETWEEN_BATCHES),
        )
    }
}

// ============================================================================
// Outgoing messages
// ============================================================================

/// Outgoing message status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutgoingMessageStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Cancelled,
}

impl std::fmt::Display for OutgoingMessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutgoingMessageStatus::Pending => write!(f, "pending"),
            OutgoingMessageStatus::Sending => write!(f, "sending"),
            OutgoingMessageStatus::Sent => write!(f, "sent"),
            OutgoingMessageStatus::Failed => write!(f, "failed"),
            OutgoingMessageStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OutgoingMessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutgoingMessageStatus::Pending),
            "sending" => Ok(OutgoingMessageStatus::Sending),
            "sent" => Ok(OutgoingMessageStatus::Sent),
            "failed" => Ok(OutgoingMessageStatus::Failed),
            "cancelled" => Ok(OutgoingMessageStatus::Cancelled),
            _ => Err(format!("Invalid outgoing message status: {}", s)),
        }
    }
}

/// Outgoing message model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: OutgoingMessageId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    /// Rendered text
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Identifier the channel assigned on success
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub attachment_path: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_caption: Option<String>,
    /// 0 for standalone messages and multi-line parents, 1.. for segments
    pub line_number: i32,
    pub parent_id: Option<OutgoingMessageId>,
}

impl OutgoingMessage {
    /// Get status enum
    pub fn status_enum(&self) -> Option<OutgoingMessageStatus> {
        self.status.parse().ok()
    }

    /// Whether this is one segment of a multi-line send
    pub fn is_line_segment(&self) -> bool {
        self.line_number > 0
    }

    /// Attachment reference, if one is set and its type is known
    pub fn attachment(&self) -> Option<Attachment> {
        let path = self.attachment_path.clone().filter(|p| !p.is_empty())?;
        let kind = self
            .attachment_type
            .as_deref()
            .and_then(|t| t.parse::<AttachmentKind>().ok())
            .unwrap_or(AttachmentKind::Document);

        Some(Attachment {
            path,
            kind,
            caption: self.attachment_caption.clone(),
        })
    }
}

/// Insert input for a single outgoing message row
#[derive(Debug, Clone)]
pub struct NewOutgoingMessage {
    pub id: OutgoingMessageId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub payload: String,
    pub attachment: Option<Attachment>,
    pub line_number: i32,
    pub parent_id: Option<OutgoingMessageId>,
    pub created_at: DateTime<Utc>,
}

impl NewOutgoingMessage {
    /// A standalone message
    pub fn single(
        campaign_id: CampaignId,
        contact_id: ContactId,
        payload: String,
        attachment: Option<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            campaign_id,
            contact_id,
            payload,
            attachment,
            line_number: 0,
            parent_id: None,
            created_at,
        }
    }

    /// Split `payload` into one segment per non-blank line.
    ///
    /// Returns the parent (line 0, full text) followed by segments `1..N`.
    /// The attachment rides on the parent and on segment 1. A payload
    /// without any non-blank line yields a single standalone message.
    pub fn multi_line(
        campaign_id: CampaignId,
        contact_id: ContactId,
        payload: String,
        attachment: Option<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Vec<Self> {
        let lines: Vec<String> = payload
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            return vec![Self::single(
                campaign_id,
                contact_id,
                payload,
                attachment,
                created_at,
            )];
        }

        let parent = Self::single(
            campaign_id,
            contact_id,
            payload,
            attachment.clone(),
            created_at,
        );
        let parent_id = parent.id;

        let mut rows = Vec::with_capacity(lines.len() + 1);
        rows.push(parent);
        for (idx, line) in lines.into_iter().enumerate() {
            rows.push(Self {
                id: Uuid::now_v7(),
                campaign_id,
                contact_id,
                payload: line,
                attachment: if idx == 0 { attachment.clone() } else { None },
                line_number: idx as i32 + 1,
                parent_id: Some(parent_id),
                created_at,
            });
        }
        rows
    }
}

/// A pending message joined with the contact fields the worker needs
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueuedMessage {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub message: OutgoingMessage,
    pub contact_name: String,
    pub contact_phone: String,
}

/// Per-status message counts for one campaign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMessageCounts {
    pub pending: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
}

/// Campaign statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub status: String,
    pub total_contacts: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub success_rate: f64,
    pub progress_percentage: f64,
    pub messages: CampaignMessageCounts,
}

// ============================================================================
// Auto-reply rules
// ============================================================================

/// A single rule condition, compared case-insensitively against inbound text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleCondition {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

/// Auto-reply rule model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    /// Lower value wins
    pub priority: i32,
    pub active: bool,
    /// Conditions as JSON array of `{type, value}`
    pub conditions: serde_json::Value,
    pub response: String,
    pub schedule_start: NaiveTime,
    pub schedule_end: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Decode the stored conditions
    pub fn conditions_vec(&self) -> Result<Vec<RuleCondition>, serde_json::Error> {
        serde_json::from_value(self.conditions.clone())
    }
}

/// Create rule input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRule {
    pub name: String,
    pub priority: Option<i32>,
    pub active: Option<bool>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub response: String,
    pub schedule_start: Option<NaiveTime>,
    pub schedule_end: Option<NaiveTime>,
}
