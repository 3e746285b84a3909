//! Per-round engine output

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::types::{Color, PatternKey, PatternState, RuleId, StreakKind};

/// A rule (or sub-rule) fired this round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub rule_key: PatternKey,
    pub event: StreakKind,
    /// Streak of `event` kind after this round
    pub streak: u32,
    /// Full counters after this round
    pub stats: PatternState,
}

/// Which threshold an alert crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TriggerStreak,
    MissStreak,
}

impl AlertKind {
    pub fn for_event(kind: StreakKind) -> Self {
        match kind {
            StreakKind::Trigger => AlertKind::TriggerStreak,
            StreakKind::Miss => AlertKind::MissStreak,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::TriggerStreak => "trigger_streak",
            AlertKind::MissStreak => "miss_streak",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notifiable alert. Fan-out is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub rule_key: PatternKey,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub alert_kind: AlertKind,
    pub streak: u32,
    pub round_id: String,
    pub timestamp: DateTime<Utc>,
}

/// An ended streak of length two or more
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakHistoryRecord {
    pub rule_key: PatternKey,
    pub streak_kind: StreakKind,
    pub length: u32,
    /// Round that opened the streak, when still buffered
    pub start_marker: Option<String>,
    /// Last round of the streak, when still buffered
    pub end_marker: Option<String>,
    /// The last `length` outcomes, oldest first
    pub trailing_sequence: Vec<Color>,
    pub timestamp: DateTime<Utc>,
}

/// Everything that came out of processing one outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutput {
    pub round_id: String,
    pub color: Color,
    pub matches: Vec<MatchEvent>,
    pub alerts: Vec<AlertEvent>,
    pub streaks_closed: Vec<StreakHistoryRecord>,
    pub timestamp: DateTime<Utc>,
}

impl RoundOutput {
    pub fn new(round_id: impl Into<String>, color: Color) -> Self {
        Self {
            round_id: round_id.into(),
            color,
            matches: Vec::new(),
            alerts: Vec::new(),
            streaks_closed: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Nothing matched, fired or closed
    pub fn is_quiet(&self) -> bool {
        self.matches.is_empty() && self.alerts.is_empty() && self.streaks_closed.is_empty()
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let swatch = match self.color {
            Color::Red => "●".red(),
            Color::Green => "●".green(),
            Color::Yellow => "●".yellow(),
        };
        let mut lines = vec![format!(
            "{} {} {} | matches={} alerts={}",
            swatch,
            self.round_id.bold(),
            self.color,
            self.matches.len(),
            self.alerts.len()
        )];

        for m in &self.matches {
            let label = match m.event {
                StreakKind::Trigger => "TRIGGER".green(),
                StreakKind::Miss => "MISS".red(),
            };
            lines.push(format!("  {} {} streak={}", label, m.rule_key, m.streak));
        }
        for a in &self.alerts {
            lines.push(format!(
                "  {} {} ({}) {} streak={}",
                "ALERT".yellow().bold(),
                a.rule_name,
                a.rule_key,
                a.alert_kind,
                a.streak
            ));
        }
        for h in &self.streaks_closed {
            lines.push(format!(
                "  {} {} {} streak of {}",
                "closed".dimmed(),
                h.rule_key,
                h.streak_kind,
                h.length
            ));
        }
        lines.join("\n")
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        let events: Vec<String> = self
            .matches
            .iter()
            .map(|m| format!("{}:{}:{}", m.rule_key, m.event, m.streak))
            .collect();
        let alerts: Vec<String> = self
            .alerts
            .iter()
            .map(|a| format!("{}:{}:{}", a.rule_key, a.alert_kind, a.streak))
            .collect();
        format!(
            "round={} | color={} | events=[{}] | alerts=[{}] | closed={}",
            self.round_id,
            self.color,
            events.join(","),
            alerts.join(","),
            self.streaks_closed.len()
        )
    }
}
