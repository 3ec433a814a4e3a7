//! Pacing - Delays between messages and batches

use outreach_common::config::WorkerConfig;
use outreach_storage::models::Campaign;
use std::time::Duration;

/// Pause taken after a batch pass over one campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPause {
    /// Full batch: honor the campaign's `delay_between_batches`
    InterBatch(Duration),
    /// Partial batch: the queue is nearly drained
    Short(Duration),
}

impl BatchPause {
    pub fn duration(&self) -> Duration {
        match self {
            BatchPause::InterBatch(d) | BatchPause::Short(d) => *d,
        }
    }
}

/// Worker-level pacing limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub idle_interval: Duration,
    pub short_pause: Duration,
    pub line_delay_cap: Duration,
    pub send_timeout: Duration,
}

impl PacingPolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            idle_interval: Duration::from_millis(config.idle_interval_ms),
            short_pause: Duration::from_millis(config.short_pause_ms),
            line_delay_cap: Duration::from_millis(config.line_delay_cap_ms),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }

    /// Delay after sending a message with the given line number
    pub fn message_delay(&self, campaign: &Campaign, line_number: i32) -> Duration {
        let delay = campaign.message_delay();
        if line_number > 0 {
            delay.min(self.line_delay_cap)
        } else {
            delay
        }
    }

    /// Pause after processing `processed` messages of one batch
    pub fn after_batch(&self, campaign: &Campaign, processed: usize) -> BatchPause {
        if processed as i64 >= campaign.batch_limit() {
            BatchPause::InterBatch(campaign.batch_delay())
        } else {
            BatchPause::Short(self.short_pause)
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn campaign(batch_size: i32, batch_delay: i64, message_delay: f64) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: uuid::Uuid::now_v7(),
            name: "Pascua".to_string(),
            template_id: None,
            status: "sending".to_string(),
            scheduled_for: None,
            created_by: "admin".to_string(),
            total_contacts: 0,
            sent_count: 0,
            failed_count: 0,
            send_speed: 10,
            batch_size,
            delay_between_batches: batch_delay,
            delay_between_messages: message_delay,
            created_at: now,
            updated_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }

    #[test]
    fn test_full_batch_uses_inter_batch_delay() {
        let policy = PacingPolicy::default();
        let camp = campaign(3, 60, 6.0);
        assert_eq!(
            policy.after_batch(&camp, 3),
            BatchPause::InterBatch(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_partial_batch_uses_short_pause() {
        let policy = PacingPolicy::default();
        let camp = campaign(3, 60, 6.0);
        assert_eq!(
            policy.after_batch(&camp, 2),
            BatchPause::Short(Duration::from_millis(2000))
        );
    }

    #[test]
    fn test_line_delay_is_capped() {
        let policy = PacingPolicy::default();
        let slow = campaign(50, 60, 6.0);
        assert_eq!(policy.message_delay(&slow, 0), Duration::from_secs(6));
        assert_eq!(policy.message_delay(&slow, 2), Duration::from_secs(2));

        let fast = campaign(50, 60, 0.5);
        assert_eq!(policy.message_delay(&fast, 1), Duration::from_millis(500));
    }
}
