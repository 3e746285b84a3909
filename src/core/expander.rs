//! Dynamic rule expansion
//!
//! One template with `dynamic_values: [x1, x2, ...]` becomes one concrete
//! sub-rule per value, in the given order, duplicates included.

use log::{debug, warn};

use crate::types::{Rule, RuleKind};

/// Expands dynamic templates into concrete sub-rules
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicExpander;

impl DynamicExpander {
    /// Create new expander
    pub fn new() -> Self {
        Self
    }

    /// Static rules come back as a single unchanged element
    pub fn expand(&self, rule: &Rule) -> Vec<Rule> {
        let values = match &rule.kind {
            RuleKind::Static => return vec![rule.clone()],
            RuleKind::Dynamic { values } => values,
        };

        let expanded: Vec<Rule> = values.iter().map(|&x| self.bind(rule, x)).collect();
        debug!("expanded '{}' into {} sub-rules", rule.name, expanded.len());
        expanded
    }

    /// A concrete copy of `rule` with X bound
    pub fn bind(&self, rule: &Rule, x: i64) -> Rule {
        let sub = Rule {
            name: format!("{} (X={})", rule.name, x),
            description: rule.description.clone(),
            kind: RuleKind::Static,
            treat_yellow_as_green: rule.treat_yellow_as_green,
            trigger: rule.trigger.bind(x),
            miss: rule.miss.bind(x),
            active: rule.active,
            alerts: rule.alerts,
            dynamic_x: Some(x),
        };
        if sub.trigger.has_symbolic_counts() || sub.miss.has_symbolic_counts() {
            warn!("'{}' still has unresolved counts and will not match", sub.name);
        }
        sub
    }
}

// =============================================================================
// TESTS
// =============================================================================
