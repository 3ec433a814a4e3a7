//! Rules Module - Inbound auto-reply rules

mod matcher;
mod responder;

pub use matcher::RuleMatcher;
pub use responder::AutoResponder;
