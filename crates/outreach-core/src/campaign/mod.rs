//! Campaign Module - Campaign lifecycle, rendering and the send worker

mod manager;
mod pacing;
mod template;
mod worker;

pub use manager::{CampaignManager, EnqueueRequest, EnqueueSummary, SendMode};
pub use pacing::{BatchPause, PacingPolicy};
pub use template::{render, TemplateRenderer, GREETINGS};
pub use worker::SendWorker;
