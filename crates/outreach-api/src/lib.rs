//! Outreach API - REST API server
//!
//! This crate exposes campaign lifecycle, bulk enqueue, contacts, templates,
//! auto-reply rules and channel status over HTTP.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
