//! API request handlers

pub mod campaigns;
pub mod channel;
pub mod contacts;
pub mod health;
pub mod rules;
pub mod templates;

pub use health::*;
