//! Template Renderer - Personalizes message bodies per contact

use chrono::{DateTime, Local};
use outreach_storage::models::{placeholder_regex, Contact};
use rand::seq::SliceRandom;
use regex::Captures;
use std::collections::HashMap;

/// Greetings `{saludo}` is drawn from
pub const GREETINGS: [&str; 3] = ["Dios te bendiga", "Bendiciones", "Hola"];

/// Replace every `{key}` whose key is bound; unknown placeholders stay verbatim
pub fn render(body: &str, bindings: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(body, |caps: &Captures<'_>| match bindings.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Template renderer binding contact fields, date, time and a greeting
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Bindings for a contact at a fixed instant with a fixed greeting
    pub fn bindings(
        contact: &Contact,
        now: DateTime<Local>,
        greeting: &str,
    ) -> HashMap<String, String> {
        HashMap::from([
            ("nombre".to_string(), contact.name.clone()),
            ("telefono".to_string(), contact.phone.clone()),
            ("grupo".to_string(), contact.group_name.clone()),
            ("email".to_string(), contact.email.clone()),
            ("fecha".to_string(), now.format("%d/%m/%Y").to_string()),
            ("hora".to_string(), now.format("%H:%M").to_string()),
            ("saludo".to_string(), greeting.to_string()),
        ])
    }

    /// Render `body` for `contact` using the current time and a random greeting
    pub fn render_for_contact(&self, body: &str, contact: &Contact) -> String {
        let greeting = GREETINGS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(GREETINGS[0]);
        render(body, &Self::bindings(contact, Local::now(), greeting))
    }
}
