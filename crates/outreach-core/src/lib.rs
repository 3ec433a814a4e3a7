//! Outreach Core - Campaign delivery engine
//!
//! This crate provides the send worker that drains campaign queues through a
//! delivery channel, the channel adapters themselves, the campaign manager
//! used by external collaborators, and the inbound auto-reply rule matcher.

pub mod campaign;
pub mod delivery;
pub mod rules;

pub use campaign::{
    BatchPause, CampaignManager, EnqueueRequest, PacingPolicy, SendMode, SendWorker,
    TemplateRenderer,
};
pub use delivery::{
    build_adapter, ChannelStatus, DeliveryAdapter, DeliveryOutcome, GatewayAdapter,
    SimulatedAdapter, TwilioAdapter,
};
pub use rules::{AutoResponder, RuleMatcher};
