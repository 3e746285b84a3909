//! Pattern engine: one outcome in, one `RoundOutput` out
//!
//! Per round:
//! 1. append the outcome to the buffer
//! 2. match every active concrete rule against the buffer
//! 3. update that rule key's streak state, collecting closed streaks
//! 4. pass each fired event through the alert dispatcher
//!
//! The only failure (an empty round identifier) is detected before any state
//! is touched. Callers feeding from several sources must serialise calls.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::core::alerts::{AlertDispatcher, AlertSubject};
use crate::core::defaults::default_rules;
use crate::core::matcher::SequenceMatcher;
use crate::core::rulebook::RuleBook;
use crate::core::tracker::StreakTracker;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    Color, ColorBuffer, ColorThresholds, EngineSnapshot, MatchEvent, PatternKey, PatternState,
    RoundOutput, Rule, RuleId, SNAPSHOT_VERSION,
};

/// Owns the rule book, the buffer, the state store and the cooldowns
#[derive(Debug, Clone)]
pub struct PatternEngine {
    rules: RuleBook,
    buffer: ColorBuffer,
    tracker: StreakTracker,
    alerts: AlertDispatcher,
    matcher: SequenceMatcher,
    thresholds: ColorThresholds,
    /// Rounds processed since creation or last restore
    rounds_processed: u64,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternEngine {
    /// Empty engine with default capacity and thresholds
    pub fn new() -> Self {
        Self {
            rules: RuleBook::new(),
            buffer: ColorBuffer::new(),
            tracker: StreakTracker::new(),
            alerts: AlertDispatcher::new(),
            matcher: SequenceMatcher::new(),
            thresholds: ColorThresholds::default(),
            rounds_processed: 0,
        }
    }

    /// Engine built from validated configuration
    pub fn with_config(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let mut engine = Self {
            buffer: ColorBuffer::with_capacity(config.buffer_capacity),
            thresholds: config.thresholds,
            ..Self::new()
        };
        if config.load_default_rules {
            for rule in default_rules() {
                engine.add_rule(rule)?;
            }
        }
        Ok(engine)
    }

    // =========================================================================
    // ROUNDS
    // =========================================================================

    /// Process one classified outcome
    pub fn process(&mut self, color: Color, round_id: &str) -> EngineResult<RoundOutput> {
        if round_id.trim().is_empty() {
            return Err(EngineError::EmptyRoundId);
        }

        self.buffer.push(color, round_id);
        self.rounds_processed += 1;
        let colors = self.buffer.to_vec();
        let mut output = RoundOutput::new(round_id, color);
        let mut seen: HashSet<PatternKey> = HashSet::new();

        for entry in self.rules.active_entries() {
            if !seen.insert(entry.key) {
                warn!("{} listed twice in '{}', evaluated once", entry.key, entry.parent.name);
                continue;
            }

            let outcome = self.matcher.check(&colors, entry.rule);
            let (state, closed) = self.tracker.apply(entry.key, outcome, &self.buffer);
            output.streaks_closed.extend(closed);

            let Some(event) = outcome.event() else {
                continue;
            };
            let streak = state.streak(event);
            debug!("{} '{}' {} streak={}", entry.key, entry.rule.name, event, streak);
            output.matches.push(MatchEvent {
                rule_key: entry.key,
                event,
                streak,
                stats: state,
            });

            let subject = AlertSubject {
                key: entry.key,
                rule_id: entry.rule_id,
                rule_name: &entry.parent.name,
                config: &entry.parent.alerts,
            };
            output
                .alerts
                .extend(self.alerts.evaluate(subject, event, streak, round_id));
        }

        Ok(output)
    }

    /// Classify a numeric result and process it
    pub fn process_value(&mut self, value: f64, round_id: &str) -> EngineResult<RoundOutput> {
        let color = self.thresholds.classify(value);
        self.process(color, round_id)
    }

    // =========================================================================
    // RULES
    // =========================================================================

    /// Add a validated rule, returning its identifier
    pub fn add_rule(&mut self, rule: Rule) -> EngineResult<RuleId> {
        self.rules.insert(rule)
    }

    /// Validate a JSON rule document and add it
    pub fn add_rule_json(&mut self, value: Value) -> EngineResult<RuleId> {
        let rule = Rule::from_value(value)?;
        self.add_rule(rule)
    }

    /// Replace a rule's definition. Existing streak states are kept.
    pub fn replace_rule(&mut self, id: RuleId, rule: Rule) -> EngineResult<bool> {
        self.rules.replace(id, rule)
    }

    pub fn set_rule_active(&mut self, id: RuleId, active: bool) -> EngineResult<bool> {
        self.rules.set_active(id, active)
    }

    /// Delete a rule together with its states and cooldowns
    pub fn remove_rule(&mut self, id: RuleId) -> EngineResult<Rule> {
        let rule = self.rules.remove(id)?;
        let dropped = self.tracker.remove_rule(id);
        self.alerts.remove_rule(id);
        info!("dropped {} states of rule {}", dropped, id);
        Ok(rule)
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    // =========================================================================
    // STATE
    // =========================================================================

    pub fn buffer(&self) -> &ColorBuffer {
        &self.buffer
    }

    pub fn tracker(&self) -> &StreakTracker {
        &self.tracker
    }

    pub fn state(&self, key: &PatternKey) -> Option<&PatternState> {
        self.tracker.get(key)
    }

    /// States for one rule and all of its sub-rules
    pub fn stats_for_rule(&self, id: RuleId) -> EngineResult<Vec<(PatternKey, PatternState)>> {
        if self.rules.get(id).is_none() {
            return Err(EngineError::RuleNotFound(id));
        }
        Ok(self.tracker.states_for_rule(id))
    }

    pub fn thresholds(&self) -> ColorThresholds {
        self.thresholds
    }

    pub fn rounds_processed(&self) -> u64 {
        self.rounds_processed
    }

    /// Capture buffer, states and rule fingerprints
    pub fn snapshot(&self) -> EngineSnapshot {
        let fingerprints = self
            .rules
            .iter()
            .filter_map(|(id, _)| Some((id, self.rules.fingerprint_of(id)?.to_string())))
            .collect();
        EngineSnapshot::new(
            self.buffer.to_vec(),
            self.buffer.round_ids(),
            self.tracker.states().clone(),
            fingerprints,
        )
    }

    /// Reinstall a snapshot. Cooldowns start fresh.
    ///
    /// A state is kept only when its rule identifier still names a rule with
    /// the fingerprint captured in the snapshot.
    pub fn restore(&mut self, snapshot: EngineSnapshot) -> EngineResult<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::configuration(format!(
                "snapshot version {} not supported (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        let fingerprints = snapshot.rule_fingerprints;
        let total = snapshot.states.len();
        let states: BTreeMap<PatternKey, PatternState> = snapshot
            .states
            .into_iter()
            .filter(|(key, _)| {
                let saved = fingerprints.get(&key.rule_id).map(String::as_str);
                saved.is_some() && saved == self.rules.fingerprint_of(key.rule_id)
            })
            .collect();
        if states.len() < total {
            warn!(
                "dropped {} saved states whose rule is gone or changed",
                total - states.len()
            );
        }
        self.buffer.restore(snapshot.colors, snapshot.round_ids);
        self.tracker.restore(states);
        self.alerts.clear();
        self.rounds_processed = 0;
        info!(
            "restored {} outcomes and {} states",
            self.buffer.len(),
            self.tracker.len()
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertConfig, AlertKind, ColorGroup, Operator, Step, StepList, StreakKind};
    use crate::types::Color::{Green as G, Red as R};
    use serde_json::json;

    /// Triggers on a trailing red, misses on a trailing green
    fn red_green_rule(alerts: AlertConfig) -> Rule {
        let mut rule = Rule::new_static(
            "red vs green",
            StepList::new(vec![Step::fixed(&[ColorGroup::Red], Operator::Minimum, 1)]),
            StepList::new(vec![Step::fixed(&[ColorGroup::Green], Operator::Minimum, 1)]),
        );
        rule.alerts = alerts;
        rule
    }

    fn run(engine: &mut PatternEngine, colors: &[Color]) -> Vec<RoundOutput> {
        let start = engine.rounds_processed();
        colors
            .iter()
            .enumerate()
            .map(|(i, c)| engine.process(*c, &format!("r{}", start + i as u64 + 1)).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_round_id_changes_nothing() {
        let mut engine = PatternEngine::new();
        engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        run(&mut engine, &[R]);

        let before = engine.snapshot();
        assert!(matches!(engine.process(R, "  "), Err(EngineError::EmptyRoundId)));
        let after = engine.snapshot();
        assert_eq!(before.colors, after.colors);
        assert_eq!(before.states, after.states);
    }

    #[test]
    fn test_streaks_and_history_through_engine() {
        let mut engine = PatternEngine::new();
        let id = engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        let outputs = run(&mut engine, &[R, R, R, R, G]);

        let key = PatternKey::rule(id);
        assert_eq!(outputs[3].matches[0].streak, 4);
        assert_eq!(outputs[4].matches[0].event, StreakKind::Miss);
        assert_eq!(outputs[4].streaks_closed.len(), 1);
        assert_eq!(outputs[4].streaks_closed[0].length, 4);

        let state = engine.state(&key).unwrap();
        assert_eq!(state.longest_trigger_streak, 4);
        assert_eq!(state.miss_streak, 1);
    }

    #[test]
    fn test_alert_uses_parent_name_and_cooldown() {
        let mut engine = PatternEngine::new();
        engine
            .add_rule(red_green_rule(AlertConfig {
                trigger_streak_threshold: 3,
                miss_threshold: 10,
                cooldown_rounds: 1,
            }))
            .unwrap();
        let outputs = run(&mut engine, &[R, R, R, R, R]);

        let fired: Vec<usize> = outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.alerts.is_empty())
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(fired, vec![3, 5]);
        assert_eq!(outputs[2].alerts[0].rule_name, "red vs green");
        assert_eq!(outputs[2].alerts[0].alert_kind, AlertKind::TriggerStreak);
    }

    #[test]
    fn test_duplicate_dynamic_values_evaluated_once() {
        let mut engine = PatternEngine::new();
        engine
            .add_rule_json(json!({
                "type": "dynamic",
                "name": "red run",
                "dynamic_values": [3, 3],
                "trigger": {"steps": [{"colors": ["red"], "operator": "exact", "count": "$X"}]},
                "miss": {"steps": [{"colors": ["red"], "operator": "minimum", "count": "$X+1"}]}
            }))
            .unwrap();
        let outputs = run(&mut engine, &[R, R, R]);
        assert_eq!(outputs[2].matches.len(), 1);
        assert_eq!(outputs[2].matches[0].streak, 1);
    }

    #[test]
    fn test_remove_rule_drops_states() {
        let mut engine = PatternEngine::new();
        let id = engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        run(&mut engine, &[R, R]);
        assert!(engine.state(&PatternKey::rule(id)).is_some());

        engine.remove_rule(id).unwrap();
        assert!(engine.state(&PatternKey::rule(id)).is_none());
        assert!(matches!(engine.stats_for_rule(id), Err(EngineError::RuleNotFound(_))));
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let mut engine = PatternEngine::new();
        let err = engine
            .add_rule_json(json!({
                "type": "static",
                "name": "bad",
                "trigger": {"steps": [{"colors": ["red"], "operator": "weird", "count": 1}]}
            }))
            .unwrap_err();
        assert!(err.to_string().contains("R105"));
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut engine = PatternEngine::new();
        let id = engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        run(&mut engine, &[R, R, G]);
        let snapshot = engine.snapshot();

        let mut fresh = PatternEngine::new();
        fresh.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        fresh.restore(snapshot.clone()).unwrap();
        assert_eq!(fresh.buffer().to_vec(), vec![R, R, G]);
        assert_eq!(fresh.state(&PatternKey::rule(id)), engine.state(&PatternKey::rule(id)));

        let mut bad = snapshot;
        bad.version = 99;
        assert!(fresh.restore(bad).is_err());
    }

    #[test]
    fn test_restore_into_reordered_rules_drops_mismatched_states() {
        let greens = Rule::new_static(
            "greens",
            StepList::new(vec![Step::fixed(&[ColorGroup::Green], Operator::Minimum, 1)]),
            StepList::default(),
        );
        let mut engine = PatternEngine::new();
        let reds_id = engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        engine.add_rule(greens.clone()).unwrap();
        run(&mut engine, &[R, R, R]);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.rule_fingerprints.len(), 2);

        let mut reordered = PatternEngine::new();
        let greens_id = reordered.add_rule(greens).unwrap();
        reordered.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        reordered.restore(snapshot).unwrap();

        assert_eq!(greens_id, reds_id);
        assert!(reordered.state(&PatternKey::rule(greens_id)).is_none());
        assert!(reordered.tracker().is_empty());

        let out = reordered.process(G, "r4").unwrap();
        let first = out.matches.iter().find(|m| m.rule_key == PatternKey::rule(greens_id)).unwrap();
        assert_eq!(first.streak, 1);
    }

    #[test]
    fn test_restore_keeps_states_of_unchanged_rules_only() {
        let mut engine = PatternEngine::new();
        let kept = engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        let edited = engine.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        run(&mut engine, &[R, R]);
        let snapshot = engine.snapshot();

        let mut next = PatternEngine::new();
        next.add_rule(red_green_rule(AlertConfig::default())).unwrap();
        let mut changed = red_green_rule(AlertConfig::default());
        changed.name = "renamed".into();
        next.add_rule(changed).unwrap();
        next.restore(snapshot).unwrap();

        assert_eq!(next.state(&PatternKey::rule(kept)).unwrap().trigger_streak, 2);
        assert!(next.state(&PatternKey::rule(edited)).is_none());
    }

    #[test]
    fn test_replace_rule_keeps_states_and_reexpands() {
        let mut engine = PatternEngine::new();
        let id = engine
            .add_rule_json(json!({
                "type": "dynamic",
                "name": "red run",
                "dynamic_values": [3],
                "trigger": {"steps": [{"colors": ["red"], "operator": "minimum", "count": "$X"}]}
            }))
            .unwrap();
        run(&mut engine, &[R, R, R]);
        let before = engine.rules().fingerprint_of(id).unwrap().to_string();

        let widened = Rule::from_value(json!({
            "type": "dynamic",
            "name": "red run",
            "dynamic_values": [3, 4],
            "trigger": {"steps": [{"colors": ["red"], "operator": "minimum", "count": "$X"}]}
        }))
        .unwrap();
        assert!(engine.replace_rule(id, widened.clone()).unwrap());
        assert!(!engine.replace_rule(id, widened).unwrap());
        assert_ne!(engine.rules().fingerprint_of(id).unwrap(), before);
        assert_eq!(engine.rules().expanded(id).unwrap().len(), 2);

        let out = run(&mut engine, &[R]).remove(0);
        let streaks: Vec<(PatternKey, u32)> = out.matches.iter().map(|m| (m.rule_key, m.streak)).collect();
        assert_eq!(streaks, vec![(PatternKey::sub(id, 3), 2), (PatternKey::sub(id, 4), 1)]);

        assert!(matches!(
            engine.replace_rule(99, red_green_rule(AlertConfig::default())),
            Err(EngineError::RuleNotFound(99))
        ));
    }

    #[test]
    fn test_with_config_loads_defaults() {
        let config = EngineConfig {
            buffer_capacity: 10,
            load_default_rules: true,
            ..Default::default()
        };
        let mut engine = PatternEngine::with_config(&config).unwrap();
        assert_eq!(engine.rules().len(), 7);

        let out = engine.process_value(1.5, "r1").unwrap();
        assert_eq!(out.color, R);
        for i in 0..20 {
            engine.process_value(3.0, &format!("g{}", i)).unwrap();
        }
        assert_eq!(engine.buffer().len(), 10);
    }
}
