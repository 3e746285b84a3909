//! Cooldown-gated alert dispatch
//!
//! An alert is eligible when the new streak reaches the rule's threshold for
//! that event kind. Each `(key, kind)` pair has a cooldown counter: while it
//! is positive, eligible rounds decrement it and stay silent. Firing resets
//! it to `cooldown_rounds`.

use std::collections::HashMap;

use chrono::Utc;
use log::{debug, info};

use crate::types::{AlertConfig, AlertEvent, AlertKind, PatternKey, RuleId, StreakKind};

/// Identity of the rule an alert is reported under
#[derive(Debug, Clone, Copy)]
pub struct AlertSubject<'a> {
    pub key: PatternKey,
    pub rule_id: RuleId,
    pub rule_name: &'a str,
    pub config: &'a AlertConfig,
}

/// Decides whether a streak update becomes an alert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertDispatcher {
    cooldowns: HashMap<(PatternKey, AlertKind), u32>,
}

impl AlertDispatcher {
    /// Create dispatcher with no outstanding cooldowns
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one streak update
    pub fn evaluate(
        &mut self,
        subject: AlertSubject<'_>,
        event: StreakKind,
        streak: u32,
        round_id: &str,
    ) -> Option<AlertEvent> {
        let threshold = match event {
            StreakKind::Trigger => subject.config.trigger_streak_threshold,
            StreakKind::Miss => subject.config.miss_threshold,
        };
        if streak < threshold {
            return None;
        }

        let kind = AlertKind::for_event(event);
        let cooldown = self.cooldowns.entry((subject.key, kind)).or_insert(0);
        if *cooldown > 0 {
            *cooldown -= 1;
            debug!("{} {} suppressed, cooldown now {}", subject.key, kind, cooldown);
            return None;
        }
        *cooldown = subject.config.cooldown_rounds;

        info!(
            "ALERT {} ({}) {} streak={} round={}",
            subject.rule_name, subject.key, kind, streak, round_id
        );
        Some(AlertEvent {
            rule_key: subject.key,
            rule_id: subject.rule_id,
            rule_name: subject.rule_name.to_string(),
            alert_kind: kind,
            streak,
            round_id: round_id.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Outstanding cooldown for one pair (zero if none)
    pub fn cooldown(&self, key: PatternKey, kind: AlertKind) -> u32 {
        self.cooldowns.get(&(key, kind)).copied().unwrap_or(0)
    }

    /// Forget cooldowns belonging to one rule
    pub fn remove_rule(&mut self, rule_id: RuleId) {
        self.cooldowns.retain(|(key, _), _| key.rule_id != rule_id);
    }

    pub fn clear(&mut self) {
        self.cooldowns.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
