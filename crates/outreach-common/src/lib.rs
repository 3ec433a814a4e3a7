//! Outreach Common - Shared types and utilities
//!
//! This crate provides configuration, the error type, and small helpers
//! shared by every Outreach component.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
