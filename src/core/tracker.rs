//! Streak tracker: per-pattern state store
//!
//! Transitions per processed outcome:
//! - trigger matched → trigger_streak + 1, miss_streak → 0
//! - miss matched → miss_streak + 1, trigger_streak → 0
//! - neither → unchanged
//!
//! A streak of length ≥ 2 that shrinks produces one history record.

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, trace};

use crate::types::{
    ColorBuffer, MatchOutcome, PatternKey, PatternState, RuleId, StreakHistoryRecord, StreakKind,
};
use crate::STREAK_HISTORY_MIN_LEN;

/// Owns every `PatternState`, keyed by rule or sub-rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreakTracker {
    states: BTreeMap<PatternKey, PatternState>,
}

impl StreakTracker {
    /// Create empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one round's outcome for `key`
    ///
    /// `buffer` must already hold the outcome being processed; it supplies
    /// the markers and trailing sequence of a closed streak.
    pub fn apply(
        &mut self,
        key: PatternKey,
        outcome: MatchOutcome,
        buffer: &ColorBuffer,
    ) -> (PatternState, Option<StreakHistoryRecord>) {
        let state = self.states.entry(key).or_default();
        let before = *state;

        if let Some(kind) = outcome.event() {
            state.record(kind);
            trace!("{} {} → streak {}", key, kind, state.streak(kind));
        }
        let after = *state;

        let closed = [StreakKind::Trigger, StreakKind::Miss]
            .into_iter()
            .find(|&kind| {
                let prev = before.streak(kind);
                prev >= STREAK_HISTORY_MIN_LEN && after.streak(kind) < prev
            })
            .map(|kind| close_record(key, kind, before.streak(kind), buffer));

        if let Some(record) = &closed {
            debug!("{} {} streak of {} ended", key, record.streak_kind, record.length);
        }
        (after, closed)
    }

    /// State for one key, if it has been referenced
    pub fn get(&self, key: &PatternKey) -> Option<&PatternState> {
        self.states.get(key)
    }

    /// All tracked states, ordered by key
    pub fn states(&self) -> &BTreeMap<PatternKey, PatternState> {
        &self.states
    }

    /// States belonging to one rule (its own key and every sub-rule key)
    pub fn states_for_rule(&self, rule_id: RuleId) -> Vec<(PatternKey, PatternState)> {
        self.states
            .range(rule_range(rule_id))
            .map(|(k, s)| (*k, *s))
            .collect()
    }

    /// Drop every state belonging to one rule. Returns how many were removed.
    pub fn remove_rule(&mut self, rule_id: RuleId) -> usize {
        let before = self.states.len();
        self.states.retain(|key, _| key.rule_id != rule_id);
        before - self.states.len()
    }

    /// Replace the whole store
    pub fn restore(&mut self, states: BTreeMap<PatternKey, PatternState>) {
        self.states = states;
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn rule_range(rule_id: RuleId) -> std::ops::RangeInclusive<PatternKey> {
    PatternKey::rule(rule_id)..=PatternKey::sub(rule_id, i64::MAX)
}

/// Build the record for a streak of `length` that ended this round
fn close_record(
    key: PatternKey,
    kind: StreakKind,
    length: u32,
    buffer: &ColorBuffer,
) -> StreakHistoryRecord {
    let length_back = length as usize;
    StreakHistoryRecord {
        rule_key: key,
        streak_kind: kind,
        length,
        start_marker: buffer.round_id_back(length_back).map(str::to_string),
        end_marker: buffer.round_id_back(1).map(str::to_string),
        trailing_sequence: buffer.tail(length_back),
        timestamp: Utc::now(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
