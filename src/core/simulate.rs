//! Back-test one rule over a color history
//!
//! Every prefix of the history is matched against every concrete sub-rule,
//! the same way live processing would see it. No engine state is touched.

use serde::{Deserialize, Serialize};

use crate::core::expander::DynamicExpander;
use crate::core::matcher::SequenceMatcher;
use crate::types::{Color, Rule, StreakKind};

/// Results for one concrete sub-rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPatternReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_x: Option<i64>,
    pub total_triggers: u64,
    pub total_misses: u64,
    pub max_trigger_streak: u32,
    pub max_miss_streak: u32,
    /// Percent of rounds, two decimals
    pub trigger_rate: f64,
    pub miss_rate: f64,
}

/// Results for a whole rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub pattern_name: String,
    pub total_rounds: usize,
    pub sub_patterns: Vec<SubPatternReport>,
}

/// Replay `colors` (oldest first) through `rule`
pub fn simulate(rule: &Rule, colors: &[Color]) -> SimulationReport {
    let matcher = SequenceMatcher::new();
    let sub_patterns = DynamicExpander::new()
        .expand(rule)
        .iter()
        .map(|sub| simulate_one(&matcher, sub, colors))
        .collect();

    SimulationReport {
        pattern_name: rule.name.clone(),
        total_rounds: colors.len(),
        sub_patterns,
    }
}

fn simulate_one(matcher: &SequenceMatcher, rule: &Rule, colors: &[Color]) -> SubPatternReport {
    let mut report = SubPatternReport {
        name: rule.name.clone(),
        dynamic_x: rule.dynamic_x,
        total_triggers: 0,
        total_misses: 0,
        max_trigger_streak: 0,
        max_miss_streak: 0,
        trigger_rate: 0.0,
        miss_rate: 0.0,
    };
    let (mut trigger_streak, mut miss_streak) = (0u32, 0u32);

    for end in 1..=colors.len() {
        match matcher.check(&colors[..end], rule).event() {
            Some(StreakKind::Trigger) => {
                report.total_triggers += 1;
                trigger_streak += 1;
                miss_streak = 0;
                report.max_trigger_streak = report.max_trigger_streak.max(trigger_streak);
            }
            Some(StreakKind::Miss) => {
                report.total_misses += 1;
                miss_streak += 1;
                trigger_streak = 0;
                report.max_miss_streak = report.max_miss_streak.max(miss_streak);
            }
            None => {}
        }
    }

    report.trigger_rate = percent(report.total_triggers, colors.len());
    report.miss_rate = percent(report.total_misses, colors.len());
    report
}

fn percent(count: u64, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}
