//! Auto-responder - Picks the reply for an inbound message

use super::matcher::RuleMatcher;
use chrono::{Local, NaiveTime};
use outreach_common::Result;
use outreach_storage::models::Rule;
use outreach_storage::repository::RuleRepository;
use outreach_storage::DatabasePool;
use tracing::debug;

/// First-match-wins evaluation over the active rules
pub struct AutoResponder {
    rule_repo: RuleRepository,
}

impl AutoResponder {
    pub fn new(db_pool: DatabasePool) -> Self {
        Self {
            rule_repo: RuleRepository::new(db_pool),
        }
    }

    /// The first active rule, by `(priority, name)`, that matches `text` now
    pub async fn find_match(&self, text: &str) -> Result<Option<Rule>> {
        self.find_match_at(text, Local::now().time()).await
    }

    pub async fn find_match_at(&self, text: &str, now: NaiveTime) -> Result<Option<Rule>> {
        let rules = self.rule_repo.list_active().await?;
        Ok(Self::first_match(rules, text, now))
    }

    /// Pick the first matching rule from `rules`, which need not be sorted
    pub fn first_match(mut rules: Vec<Rule>, text: &str, now: NaiveTime) -> Option<Rule> {
        rules.retain(|r| r.active);
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

        let matched = rules
            .into_iter()
            .find(|rule| RuleMatcher::matches_at(rule, text, now));
        if let Some(rule) = &matched {
            debug!(rule_id = %rule.id, rule = %rule.name, "Auto-reply rule matched");
        }
        matched
    }
}
