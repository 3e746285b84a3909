//! Sequence matcher: right-to-left greedy step consumption
//!
//! Steps are checked last-first against the newest outcomes. Each step eats
//! every contiguous outcome admitted by its color set before its operator is
//! applied, so a step followed (in reverse) by another step with an
//! overlapping color set can swallow the neighbour's outcomes. Rule authors
//! rely on this; it is kept as-is.

use log::debug;

use crate::types::{Color, MatchOutcome, Rule, StepList};

/// Stateless matcher
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceMatcher;

impl SequenceMatcher {
    /// Create new matcher
    pub fn new() -> Self {
        Self
    }

    /// Does `steps` match the tail of `colors` (oldest first)?
    ///
    /// Never fails loudly: short buffers, empty step lists and unresolved
    /// counts all come back as `false`.
    pub fn matches(&self, colors: &[Color], steps: &StepList, treat_yellow_as_green: bool) -> bool {
        if colors.is_empty() || steps.is_empty() {
            return false;
        }

        // Outcomes not yet consumed are colors[..cursor]
        let mut cursor = colors.len();

        for step in steps.iter().rev() {
            if cursor == 0 {
                return false;
            }

            let count = match step.count.resolved() {
                Some(count) => count,
                None => {
                    debug!("step count {} is unresolved, step cannot match", step.count);
                    return false;
                }
            };

            let mut consumed: i64 = 0;
            while cursor > 0 && step.admits(colors[cursor - 1], treat_yellow_as_green) {
                consumed += 1;
                cursor -= 1;
            }

            if !step.operator.check(consumed, count) {
                return false;
            }
        }

        true
    }

    /// Evaluate both step lists of a concrete rule
    pub fn check(&self, colors: &[Color], rule: &Rule) -> MatchOutcome {
        MatchOutcome {
            trigger: self.matches(colors, &rule.trigger, rule.treat_yellow_as_green),
            miss: self.matches(colors, &rule.miss, rule.treat_yellow_as_green),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
