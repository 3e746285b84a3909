//! Integration tests for round processing
//!
//! Rules go in as JSON documents, outcomes go in one at a time, and every
//! assertion is made on the `RoundOutput`s and the engine's state store.

use pretty_assertions::assert_eq;
use serde_json::json;
use streakline::config::EngineConfig;
use streakline::core::{load_snapshot, save_snapshot, PatternEngine};
use streakline::types::{AlertKind, Color, PatternKey, RoundOutput, StreakKind};

use streakline::types::Color::{Green as G, Red as R, Yellow as Y};

fn feed(engine: &mut PatternEngine, colors: &[Color]) -> Vec<RoundOutput> {
    let start = engine.rounds_processed();
    colors
        .iter()
        .enumerate()
        .map(|(i, c)| {
            engine
                .process(*c, &format!("R{}", start + i as u64 + 1))
                .unwrap()
        })
        .collect()
}

#[test]
fn test_five_triggers_then_miss() {
    let mut engine = PatternEngine::new();
    let id = engine
        .add_rule_json(json!({
            "type": "static",
            "name": "green then more",
            "trigger": {"steps": [{"colors": ["green_yellow"], "operator": "minimum", "count": 1}]},
            "miss": {"steps": [{"colors": ["red"], "operator": "minimum", "count": 1}]}
        }))
        .unwrap();

    feed(&mut engine, &[G, Y, G, G, Y]);
    let state = *engine.state(&PatternKey::rule(id)).unwrap();
    assert_eq!(state.trigger_streak, 5);
    assert_eq!(state.longest_trigger_streak, 5);
    assert_eq!(state.miss_streak, 0);

    let out = feed(&mut engine, &[R]).remove(0);
    let state = *engine.state(&PatternKey::rule(id)).unwrap();
    assert_eq!(state.trigger_streak, 0);
    assert_eq!(state.miss_streak, 1);
    assert_eq!(state.longest_trigger_streak, 5);

    assert_eq!(out.streaks_closed.len(), 1);
    let record = &out.streaks_closed[0];
    assert_eq!(record.length, 5);
    assert_eq!(record.streak_kind, StreakKind::Trigger);
    assert_eq!(record.start_marker.as_deref(), Some("R1"));
    assert_eq!(record.end_marker.as_deref(), Some("R5"));
    assert_eq!(record.trailing_sequence, vec![Y, G, G, Y, R]);
}

#[test]
fn test_dynamic_rule_tracks_each_x() {
    let mut engine = PatternEngine::new();
    let id = engine
        .add_rule_json(json!({
            "type": "dynamic",
            "name": "Red run",
            "dynamic_values": [3, 4, 5],
            "trigger": {"steps": [{"colors": ["red"], "operator": "exact", "count": "$X"}]},
            "miss": {"steps": [{"colors": ["red"], "operator": "minimum", "count": "$X+1"}]}
        }))
        .unwrap();

    let outputs = feed(&mut engine, &[G, R, R, R, R]);

    let third: Vec<String> = outputs[3].matches.iter().map(|m| m.rule_key.to_string()).collect();
    assert_eq!(third, vec!["1:X=3"]);

    let fourth: Vec<(String, StreakKind)> = outputs[4]
        .matches
        .iter()
        .map(|m| (m.rule_key.to_string(), m.event))
        .collect();
    assert_eq!(
        fourth,
        vec![
            ("1:X=3".to_string(), StreakKind::Miss),
            ("1:X=4".to_string(), StreakKind::Trigger),
        ]
    );

    let stats = engine.stats_for_rule(id).unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats[2].0, PatternKey::sub(id, 5));
    assert_eq!(stats[2].1.total_triggers, 0);
}

#[test]
fn test_alert_cooldown_sequence() {
    let mut engine = PatternEngine::new();
    engine
        .add_rule_json(json!({
            "type": "static",
            "name": "Any red",
            "trigger": {"steps": [{"colors": ["red"]}]},
            "miss": {"steps": [{"colors": ["green"]}]},
            "alerts": {"trigger_streak_threshold": 3, "cooldown_rounds": 1}
        }))
        .unwrap();

    let outputs = feed(&mut engine, &[R, R, R, R, R, G, G]);
    let alerts: Vec<(String, AlertKind, u32)> = outputs
        .iter()
        .flat_map(|o| o.alerts.iter())
        .map(|a| (a.round_id.clone(), a.alert_kind, a.streak))
        .collect();

    // miss_threshold falls back to 2
    assert_eq!(
        alerts,
        vec![
            ("R3".to_string(), AlertKind::TriggerStreak, 3),
            ("R5".to_string(), AlertKind::TriggerStreak, 5),
            ("R7".to_string(), AlertKind::MissStreak, 2),
        ]
    );
}

#[test]
fn test_inactive_rule_is_not_evaluated() {
    let mut engine = PatternEngine::new();
    let id = engine
        .add_rule_json(json!({
            "type": "static",
            "name": "off",
            "active": false,
            "trigger": {"steps": [{"colors": ["red"]}]}
        }))
        .unwrap();

    let outputs = feed(&mut engine, &[R, R]);
    assert!(outputs.iter().all(RoundOutput::is_quiet));
    assert!(engine.state(&PatternKey::rule(id)).is_none());

    engine.set_rule_active(id, true).unwrap();
    let outputs = feed(&mut engine, &[R]);
    assert_eq!(outputs[0].matches.len(), 1);
}

#[test]
fn test_default_rules_over_a_session() {
    let config = EngineConfig {
        load_default_rules: true,
        ..Default::default()
    };
    let mut engine = PatternEngine::with_config(&config).unwrap();
    let outputs = feed(&mut engine, &[G, G, G, R, G]);

    // Pattern 1: 3+ green/yellow, 1 red, 1+ green/yellow
    let last: Vec<String> = outputs[4].matches.iter().map(|m| m.rule_key.to_string()).collect();
    assert!(last.contains(&"1".to_string()));
    // Pattern 6 with X=3 fires on the third green
    assert_eq!(
        outputs[2]
            .matches
            .iter()
            .find(|m| m.rule_key == PatternKey::sub(6, 3))
            .map(|m| m.event),
        Some(StreakKind::Trigger)
    );
}

#[test]
fn test_snapshot_survives_restart() {
    let mut engine = PatternEngine::new();
    let rule = json!({
        "type": "static",
        "name": "Any red",
        "trigger": {"steps": [{"colors": ["red"]}]},
        "miss": {"steps": [{"colors": ["green"]}]}
    });
    engine.add_rule_json(rule.clone()).unwrap();
    feed(&mut engine, &[R, R]);

    let dir = std::env::temp_dir()
        .join(format!("streakline_engine_it_{}", std::process::id()))
        .display()
        .to_string();
    let path = save_snapshot(&engine.snapshot(), &dir).unwrap();

    let mut restarted = PatternEngine::new();
    restarted.add_rule_json(rule).unwrap();
    restarted.restore(load_snapshot(&path).unwrap()).unwrap();

    let out = restarted.process(R, "R3").unwrap();
    assert_eq!(out.matches[0].streak, 3);

    let out = restarted.process(G, "R4").unwrap();
    assert_eq!(out.streaks_closed[0].start_marker.as_deref(), Some("R1"));

    std::fs::remove_dir_all(&dir).ok();
}
