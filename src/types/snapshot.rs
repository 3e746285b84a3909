//! Engine snapshot: buffer plus state store
//!
//! States are keyed by rule identifier, which is only stable while the rule
//! book is. Each rule's fingerprint is captured alongside so a restore can
//! tell whether an identifier still names the same rule. Alert cooldowns are
//! transient and not captured.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Color, PatternKey, PatternState, RuleId};

/// Snapshot format version
pub const SNAPSHOT_VERSION: u16 = 2;

/// Everything needed to resume tracking after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u16,
    pub taken_at: DateTime<Utc>,
    /// Oldest first
    pub colors: Vec<Color>,
    /// Parallel to `colors`
    pub round_ids: Vec<String>,
    pub states: BTreeMap<PatternKey, PatternState>,
    /// Fingerprint of every rule at capture time
    #[serde(default)]
    pub rule_fingerprints: BTreeMap<RuleId, String>,
}

impl EngineSnapshot {
    pub fn new(
        colors: Vec<Color>,
        round_ids: Vec<String>,
        states: BTreeMap<PatternKey, PatternState>,
        rule_fingerprints: BTreeMap<RuleId, String>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            colors,
            round_ids,
            states,
            rule_fingerprints,
        }
    }

    /// File stem used when saving
    pub fn file_stem(&self) -> String {
        format!("engine_{}", self.taken_at.format("%Y%m%d_%H%M%S"))
    }
}
