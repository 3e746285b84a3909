//! Core types for Streakline

mod buffer;
mod color;
mod count;
mod output;
mod reason;
mod rule;
mod snapshot;
mod stats;

pub use buffer::ColorBuffer;
pub use color::{Color, ColorGroup, ColorThresholds};
pub use count::{CountExpr, StepCount};
pub use output::{AlertEvent, AlertKind, MatchEvent, RoundOutput, StreakHistoryRecord};
pub use reason::RuleReason;
pub use rule::{
    AlertConfig, Operator, Rule, RuleDefinition, RuleId, RuleKind, Step, StepDefinition, StepList,
    StepListDefinition,
};
pub use snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
pub use stats::{MatchOutcome, PatternKey, PatternState, StreakKind};
