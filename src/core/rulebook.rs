//! Rule book: the engine's rule store with a cached expansion per rule
//!
//! Each entry keeps the SHA-256 fingerprint of its canonical JSON form. The
//! expansion is recomputed only when a replacement changes the fingerprint.

use std::collections::BTreeMap;

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::core::expander::DynamicExpander;
use crate::error::{EngineError, EngineResult};
use crate::types::{PatternKey, Rule, RuleId};

/// SHA-256 of a rule's canonical JSON, hex encoded
pub fn fingerprint(rule: &Rule) -> EngineResult<String> {
    let bytes = serde_json::to_vec(&rule.to_definition())?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[derive(Debug, Clone)]
struct RuleEntry {
    rule: Rule,
    fingerprint: String,
    expanded: Vec<Rule>,
}

/// One concrete rule ready for matching
#[derive(Debug, Clone, Copy)]
pub struct ActiveRule<'a> {
    pub key: PatternKey,
    pub rule_id: RuleId,
    /// The rule as stored (the template for dynamic rules)
    pub parent: &'a Rule,
    /// The concrete rule to match
    pub rule: &'a Rule,
}

/// Ordered rule collection
#[derive(Debug, Clone)]
pub struct RuleBook {
    entries: BTreeMap<RuleId, RuleEntry>,
    next_id: RuleId,
    expander: DynamicExpander,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBook {
    /// Create empty rule book. Identifiers start at 1.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
            expander: DynamicExpander::new(),
        }
    }

    /// Add a rule under the next free identifier
    pub fn insert(&mut self, rule: Rule) -> EngineResult<RuleId> {
        let id = self.next_id;
        self.insert_with_id(id, rule)?;
        Ok(id)
    }

    /// Add or overwrite a rule under a caller-chosen identifier
    pub fn insert_with_id(&mut self, id: RuleId, rule: Rule) -> EngineResult<()> {
        let entry = self.build_entry(rule)?;
        info!(
            "rule {} '{}' loaded ({}, {} concrete)",
            id,
            entry.rule.name,
            entry.rule.kind.as_str(),
            entry.expanded.len()
        );
        self.entries.insert(id, entry);
        self.next_id = self.next_id.max(id.saturating_add(1));
        Ok(())
    }

    /// Replace an existing rule's definition
    ///
    /// Returns `true` when the definition actually changed.
    pub fn replace(&mut self, id: RuleId, rule: Rule) -> EngineResult<bool> {
        let print = fingerprint(&rule)?;
        let entry = self.entries.get_mut(&id).ok_or(EngineError::RuleNotFound(id))?;
        if entry.fingerprint == print {
            debug!("rule {} unchanged, keeping cached expansion", id);
            return Ok(false);
        }
        entry.expanded = self.expander.expand(&rule);
        entry.rule = rule;
        entry.fingerprint = print;
        info!("rule {} '{}' replaced", id, entry.rule.name);
        Ok(true)
    }

    /// Toggle a rule on or off
    pub fn set_active(&mut self, id: RuleId, active: bool) -> EngineResult<bool> {
        let mut rule = self.get(id).cloned().ok_or(EngineError::RuleNotFound(id))?;
        rule.active = active;
        self.replace(id, rule)
    }

    /// Remove a rule, returning it
    pub fn remove(&mut self, id: RuleId) -> EngineResult<Rule> {
        let entry = self.entries.remove(&id).ok_or(EngineError::RuleNotFound(id))?;
        info!("rule {} '{}' removed", id, entry.rule.name);
        Ok(entry.rule)
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.entries.get(&id).map(|e| &e.rule)
    }

    /// Cached expansion of one rule
    pub fn expanded(&self, id: RuleId) -> Option<&[Rule]> {
        self.entries.get(&id).map(|e| e.expanded.as_slice())
    }

    /// Stored fingerprint of one rule
    pub fn fingerprint_of(&self, id: RuleId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.fingerprint.as_str())
    }

    /// All rules in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.entries.iter().map(|(id, e)| (*id, &e.rule))
    }

    /// Every concrete rule of every active rule, in identifier then X order
    pub fn active_entries(&self) -> impl Iterator<Item = ActiveRule<'_>> {
        self.entries
            .iter()
            .filter(|(_, e)| e.rule.active)
            .flat_map(|(id, e)| {
                e.expanded.iter().map(move |sub| ActiveRule {
                    key: match sub.dynamic_x {
                        Some(x) => PatternKey::sub(*id, x),
                        None => PatternKey::rule(*id),
                    },
                    rule_id: *id,
                    parent: &e.rule,
                    rule: sub,
                })
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn build_entry(&self, rule: Rule) -> EngineResult<RuleEntry> {
        Ok(RuleEntry {
            fingerprint: fingerprint(&rule)?,
            expanded: self.expander.expand(&rule),
            rule,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorGroup, CountExpr, Operator, Step, StepCount, StepList};

    fn static_rule(name: &str) -> Rule {
        Rule::new_static(
            name,
            StepList::new(vec![Step::fixed(&[ColorGroup::Red], Operator::Exact, 2)]),
            StepList::new(vec![Step::fixed(&[ColorGroup::Red], Operator::Minimum, 3)]),
        )
    }

    fn dynamic_rule(values: Vec<i64>) -> Rule {
        Rule::new_dynamic(
            "dyn",
            values,
            StepList::new(vec![Step::new(
                &[ColorGroup::GreenYellow],
                Operator::Exact,
                StepCount::Symbolic(CountExpr { offset: 0 }),
            )]),
            StepList::default(),
        )
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = fingerprint(&static_rule("a")).unwrap();
        assert_eq!(a, fingerprint(&static_rule("a")).unwrap());
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint(&static_rule("b")).unwrap());
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut book = RuleBook::new();
        assert_eq!(book.insert(static_rule("a")).unwrap(), 1);
        assert_eq!(book.insert(static_rule("b")).unwrap(), 2);
        book.insert_with_id(10, static_rule("c")).unwrap();
        assert_eq!(book.insert(static_rule("d")).unwrap(), 11);
        assert_eq!(book.len(), 4);
    }

    #[test]
    fn test_active_entries_expand_dynamic_rules() {
        let mut book = RuleBook::new();
        book.insert(static_rule("a")).unwrap();
        book.insert(dynamic_rule(vec![3, 4])).unwrap();

        let keys: Vec<String> = book.active_entries().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["1", "2:X=3", "2:X=4"]);

        let parents: Vec<&str> = book.active_entries().map(|e| e.parent.name.as_str()).collect();
        assert_eq!(parents, vec!["a", "dyn", "dyn"]);
    }

    #[test]
    fn test_inactive_rules_skipped() {
        let mut book = RuleBook::new();
        let id = book.insert(static_rule("a")).unwrap();
        assert!(book.set_active(id, false).unwrap());
        assert_eq!(book.active_entries().count(), 0);
    }

    #[test]
    fn test_replace_recomputes_only_on_change() {
        let mut book = RuleBook::new();
        let id = book.insert(dynamic_rule(vec![3])).unwrap();
        let before = book.fingerprint_of(id).unwrap().to_string();

        assert!(!book.replace(id, dynamic_rule(vec![3])).unwrap());
        assert!(book.replace(id, dynamic_rule(vec![3, 5, 7])).unwrap());
        assert_ne!(book.fingerprint_of(id).unwrap(), before);
        assert_eq!(book.expanded(id).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_ids_error() {
        let mut book = RuleBook::new();
        assert!(matches!(book.remove(9), Err(EngineError::RuleNotFound(9))));
        assert!(matches!(
            book.replace(9, static_rule("x")),
            Err(EngineError::RuleNotFound(9))
        ));
    }
}
