//! Core modules for Streakline

pub mod alerts;
pub mod analytics;
pub mod api;
pub mod defaults;
pub mod engine;
pub mod expander;
pub mod matcher;
pub mod rulebook;
pub mod simulate;
pub mod snapshot;
pub mod tracker;

pub use alerts::{AlertDispatcher, AlertSubject};
pub use analytics::{color_run_stats, streak_distribution, ColorRunReport, RunStats};
pub use api::{create_router, router, run_server, serve, AppState};
pub use defaults::default_rules;
pub use engine::PatternEngine;
pub use expander::DynamicExpander;
pub use matcher::SequenceMatcher;
pub use rulebook::{fingerprint, ActiveRule, RuleBook};
pub use simulate::{simulate, SimulationReport, SubPatternReport};
pub use snapshot::{load_and_validate_snapshot, load_snapshot, save_snapshot};
pub use tracker::StreakTracker;
