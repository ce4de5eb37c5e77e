//! Category mapping: descriptor -> market category
//!
//! A `RuleBook` is an immutable snapshot of the active rule set, built once
//! per batch cycle or query so every descriptor in that cycle sees one
//! consistent view.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::{LivestockDescriptor, MappingRule};

#[derive(Debug)]
pub struct RuleBook {
    /// Active, validated rules in ascending priority order.
    rules: Vec<MappingRule>,
}

impl RuleBook {
    /// Builds a snapshot from operator configuration.
    ///
    /// Rules with malformed conditions are skipped with a warning; duplicate
    /// priorities among the remaining active rules are a hard configuration
    /// error, since the priority total order is what makes matching
    /// deterministic.
    pub fn new(rules: &[MappingRule]) -> Result<Self, EngineError> {
        let mut active: Vec<MappingRule> = Vec::new();
        for rule in rules.iter().filter(|r| r.active) {
            match rule.conditions.validate() {
                Ok(()) => active.push(rule.clone()),
                Err(reason) => {
                    warn!("Skipping malformed rule '{}': {}", rule.name, reason);
                }
            }
        }

        let mut seen = HashSet::new();
        for rule in &active {
            if !seen.insert(rule.priority) {
                return Err(EngineError::Config(format!(
                    "duplicate rule priority {} (rule '{}')",
                    rule.priority, rule.name
                )));
            }
        }

        active.sort_by_key(|r| r.priority);
        Ok(RuleBook { rules: active })
    }

    /// Returns the lowest-priority rule whose declared conditions all hold,
    /// or `None` when no rule matches (a normal, non-fatal outcome).
    pub fn match_descriptor(&self, descriptor: &LivestockDescriptor) -> Option<&MappingRule> {
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.conditions.matches(descriptor));
        match matched {
            Some(rule) => debug!("Descriptor matched rule '{}' (priority {})", rule.name, rule.priority),
            None => debug!("No mapping rule matched descriptor"),
        }
        matched
    }

    /// Rules priced from the given indicator code.
    pub fn rules_for_indicator(&self, code: &str) -> Vec<&MappingRule> {
        self.rules
            .iter()
            .filter(|rule| rule.indicator.eq_ignore_ascii_case(code))
            .collect()
    }

    /// The rule defining a category, used by the resolver to find its
    /// indicator code for the baseline tier.
    pub fn rule_for_category(&self, category: &str) -> Option<&MappingRule> {
        self.rules
            .iter()
            .find(|rule| rule.category.eq_ignore_ascii_case(category))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
