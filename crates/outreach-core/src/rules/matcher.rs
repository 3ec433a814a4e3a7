//! Rule Matcher - Evaluates one auto-reply rule against inbound text

use chrono::{Local, NaiveTime};
use outreach_storage::models::{Rule, RuleCondition};
use tracing::warn;

/// Stateless evaluator for auto-reply rules
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMatcher;

impl RuleMatcher {
    /// Evaluate `rule` against `text` at the current local time
    pub fn matches(rule: &Rule, text: &str) -> bool {
        Self::matches_at(rule, text, Local::now().time())
    }

    /// Evaluate `rule` against `text` at `now`.
    ///
    /// The window is inclusive on both ends and does not wrap past midnight:
    /// a rule with `schedule_start > schedule_end` never matches.
    pub fn matches_at(rule: &Rule, text: &str, now: NaiveTime) -> bool {
        if now < rule.schedule_start || now > rule.schedule_end {
            return false;
        }

        let conditions = match rule.conditions_vec() {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!(rule_id = %rule.id, "Invalid rule conditions: {}", e);
                return false;
            }
        };

        Self::conditions_hold(&conditions, text)
    }

    /// Conjunction of all conditions, case-insensitive. Empty holds.
    pub fn conditions_hold(conditions: &[RuleCondition], text: &str) -> bool {
        let text = text.to_lowercase();
        conditions.iter().all(|condition| match condition {
            RuleCondition::Contains(value) => text.contains(&value.to_lowercase()),
            RuleCondition::StartsWith(value) => text.starts_with(&value.to_lowercase()),
            RuleCondition::EndsWith(value) => text.ends_with(&value.to_lowercase()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(conditions: Vec<RuleCondition>, start: (u32, u32), end: (u32, u32)) -> Rule {
        Rule {
            id: uuid::Uuid::now_v7(),
            name: "saludo".to_string(),
            priority: 1,
            active: true,
            conditions: serde_json::to_value(conditions).unwrap(),
            response: "Dios te bendiga".to_string(),
            schedule_start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            schedule_end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let r = rule(
            vec![RuleCondition::Contains("hola".to_string())],
            (0, 0),
            (23, 59),
        );
        assert!(RuleMatcher::matches_at(&r, "Hola, como estas", at(10, 0)));
        assert!(!RuleMatcher::matches_at(&r, "buenos dias", at(10, 0)));
    }

    #[test]
    fn test_conditions_are_a_conjunction() {
        let r = rule(
            vec![
                RuleCondition::StartsWith("BUENOS".to_string()),
                RuleCondition::EndsWith("dias".to_string()),
            ],
            (0, 0),
            (23, 59),
        );
        assert!(RuleMatcher::matches_at(&r, "buenos dias", at(8, 0)));
        assert!(!RuleMatcher::matches_at(&r, "buenos tardes", at(8, 0)));
        assert!(!RuleMatcher::matches_at(&r, "muy buenos dias", at(8, 0)));
    }

    #[test]
    fn test_empty_conditions_match_inside_window() {
        let r = rule(Vec::new(), (9, 0), (17, 0));
        assert!(RuleMatcher::matches_at(&r, "cualquier cosa", at(9, 0)));
        assert!(RuleMatcher::matches_at(&r, "cualquier cosa", at(17, 0)));
        assert!(!RuleMatcher::matches_at(&r, "cualquier cosa", at(17, 1)));
        assert!(!RuleMatcher::matches_at(&r, "cualquier cosa", at(8, 59)));
    }

    #[test]
    fn test_window_crossing_midnight_never_matches() {
        let r = rule(Vec::new(), (22, 0), (6, 0));
        assert!(!RuleMatcher::matches_at(&r, "hola", at(23, 0)));
        assert!(!RuleMatcher::matches_at(&r, "hola", at(3, 0)));
    }

    #[test]
    fn test_corrupt_conditions_do_not_match() {
        let mut r = rule(Vec::new(), (0, 0), (23, 59));
        r.conditions = serde_json::json!([{"type": "regex", "value": ".*"}]);
        assert!(!RuleMatcher::matches_at(&r, "hola", at(12, 0)));
    }
}
