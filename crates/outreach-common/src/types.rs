//! Common types for Outreach

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for contacts
pub type ContactId = Uuid;

/// Unique identifier for templates
pub type TemplateId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for outgoing messages
pub type OutgoingMessageId = Uuid;

/// Unique identifier for auto-reply rules
pub type RuleId = Uuid;

/// Default country prefix applied to local numbers
pub const DEFAULT_COUNTRY_CODE: &str = "+593";

/// Kind of file attached to an outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentKind::Image => write!(f, "image"),
            AttachmentKind::Video => write!(f, "video"),
            AttachmentKind::Audio => write!(f, "audio"),
            AttachmentKind::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for AttachmentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AttachmentKind::Image),
            "video" => Ok(AttachmentKind::Video),
            "audio" => Ok(AttachmentKind::Audio),
            "document" => Ok(AttachmentKind::Document),
            other => Err(crate::Error::Validation(format!(
                "Invalid attachment type: {}",
                other
            ))),
        }
    }
}

/// File attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Path of the file, absolute or relative to the media root
    pub path: String,
    /// Attachment kind
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Caption shown with images and videos
    pub caption: Option<String>,
}

/// Normalize a phone number to international format.
///
/// Whitespace, parentheses and dashes are removed. Numbers that already
/// carry a `+` are kept as-is; otherwise numbers with at least nine digits
/// that do not start with a trunk `0` get `default_country` prepended to
/// their last nine digits. Anything else is returned stripped.
pub fn normalize_phone(raw: &str, default_country: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '-'))
        .collect();

    if stripped.is_empty() || stripped.starts_with('+') {
        return stripped;
    }

    let char_count = stripped.chars().count();
    if char_count >= 9 && !stripped.starts_with('0') {
        let tail: String = stripped.chars().skip(char_count - 9).collect();
        return format!("{}{}", default_country, tail);
    }

    stripped
}

/// Reduce a phone number to the bare digits expected by the channel gateway
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}
