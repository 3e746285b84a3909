//! Streakline: sequential color-pattern engine
//!
//! Classified outcomes → ColorBuffer → SequenceMatcher (per expanded rule)
//! → StreakTracker → AlertDispatcher → RoundOutput

pub mod config;
pub mod core;
pub mod error;
pub mod types;

// =============================================================================
// BUFFER
// =============================================================================

/// Number of outcomes retained for matching. Oldest entries are evicted first.
pub const MAX_COLORS_BUFFER: usize = 500;

// =============================================================================
// ALERT DEFAULTS - used when a rule omits its `alerts` block
// =============================================================================

/// Trigger streak length at which an alert becomes eligible
pub const DEFAULT_TRIGGER_THRESHOLD: u32 = 5;

/// Miss streak length at which an alert becomes eligible
pub const DEFAULT_MISS_THRESHOLD: u32 = 2;

/// Eligible rounds suppressed after an alert fires
pub const DEFAULT_COOLDOWN_ROUNDS: u32 = 1;

// =============================================================================
// DYNAMIC RULES
// =============================================================================

/// Smallest accepted value for X
pub const DYNAMIC_X_MIN: i64 = 3;

/// Largest accepted value for X
pub const DYNAMIC_X_MAX: i64 = 8;

// =============================================================================
// STREAK HISTORY
// =============================================================================

/// Ended streaks shorter than this are not recorded
pub const STREAK_HISTORY_MIN_LEN: u32 = 2;

// =============================================================================
// COLOR CLASSIFICATION
// =============================================================================

/// Values below this are red
pub const DEFAULT_RED_MAX: f64 = 2.0;

/// Values below this (and at least `DEFAULT_RED_MAX`) are green, the rest yellow
pub const DEFAULT_GREEN_MAX: f64 = 10.0;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
