//! Per-pattern streak statistics and their keys

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::RuleId;

/// Key of one tracked pattern: a static rule, or one X of a dynamic rule
///
/// Renders as `"<id>"` or `"<id>:X=<x>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternKey {
    pub rule_id: RuleId,
    pub x: Option<i64>,
}

impl PatternKey {
    pub fn rule(rule_id: RuleId) -> Self {
        Self { rule_id, x: None }
    }

    pub fn sub(rule_id: RuleId, x: i64) -> Self {
        Self { rule_id, x: Some(x) }
    }

    /// `"X=<x>"` for sub-rules
    pub fn sub_key(&self) -> Option<String> {
        self.x.map(|x| format!("X={}", x))
    }
}

impl std::fmt::Display for PatternKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.x {
            Some(x) => write!(f, "{}:X={}", self.rule_id, x),
            None => write!(f, "{}", self.rule_id),
        }
    }
}

impl FromStr for PatternKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("invalid pattern key '{}'", s);
        match s.split_once(':') {
            None => s.parse().map(PatternKey::rule).map_err(|_| bad()),
            Some((id, sub)) => {
                let id = id.parse().map_err(|_| bad())?;
                let x = sub
                    .strip_prefix("X=")
                    .and_then(|x| x.parse().ok())
                    .ok_or_else(bad)?;
                Ok(PatternKey::sub(id, x))
            }
        }
    }
}

impl Serialize for PatternKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PatternKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The two event kinds a rule can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakKind {
    Trigger,
    Miss,
}

impl std::fmt::Display for StreakKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreakKind::Trigger => write!(f, "trigger"),
            StreakKind::Miss => write!(f, "miss"),
        }
    }
}

/// What the matcher found for one rule in one round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub trigger: bool,
    pub miss: bool,
}

impl MatchOutcome {
    /// The event this round counts as. Trigger wins when both matched.
    pub fn event(&self) -> Option<StreakKind> {
        if self.trigger {
            Some(StreakKind::Trigger)
        } else if self.miss {
            Some(StreakKind::Miss)
        } else {
            None
        }
    }
}

/// Streak counters for one pattern key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternState {
    pub trigger_streak: u32,
    pub miss_streak: u32,
    pub total_triggers: u64,
    pub total_misses: u64,
    pub longest_trigger_streak: u32,
    pub longest_miss_streak: u32,
}

impl PatternState {
    /// Current streak of one kind
    pub fn streak(&self, kind: StreakKind) -> u32 {
        match kind {
            StreakKind::Trigger => self.trigger_streak,
            StreakKind::Miss => self.miss_streak,
        }
    }

    /// Count one event. The opposite streak is reset.
    pub fn record(&mut self, kind: StreakKind) {
        match kind {
            StreakKind::Trigger => {
                self.trigger_streak += 1;
                self.miss_streak = 0;
                self.total_triggers += 1;
                self.longest_trigger_streak = self.longest_trigger_streak.max(self.trigger_streak);
            }
            StreakKind::Miss => {
                self.miss_streak += 1;
                self.trigger_streak = 0;
                self.total_misses += 1;
                self.longest_miss_streak = self.longest_miss_streak.max(self.miss_streak);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_parse() {
        assert_eq!(PatternKey::rule(4).to_string(), "4");
        assert_eq!(PatternKey::sub(6, 3).to_string(), "6:X=3");
        assert_eq!("6:X=3".parse::<PatternKey>(), Ok(PatternKey::sub(6, 3)));
        assert_eq!("12".parse::<PatternKey>(), Ok(PatternKey::rule(12)));
        assert!("6:Y=3".parse::<PatternKey>().is_err());
        assert!("abc".parse::<PatternKey>().is_err());
    }

    #[test]
    fn test_key_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(PatternKey::sub(1, 4), 2u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"1:X=4":2}"#);
        let back: std::collections::BTreeMap<PatternKey, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_trigger_wins_over_miss() {
        let both = MatchOutcome { trigger: true, miss: true };
        assert_eq!(both.event(), Some(StreakKind::Trigger));
        assert_eq!(MatchOutcome::default().event(), None);
    }

    #[test]
    fn test_record_keeps_one_streak_nonzero() {
        let mut state = PatternState::default();
        state.record(StreakKind::Trigger);
        state.record(StreakKind::Trigger);
        state.record(StreakKind::Miss);
        assert_eq!(state.trigger_streak, 0);
        assert_eq!(state.miss_streak, 1);
        assert_eq!(state.longest_trigger_streak, 2);
        assert_eq!(state.total_triggers, 2);
        assert_eq!(state.total_misses, 1);
    }
}
