//! Heuristic scoring and signature matching.
//!
//! The [`HeuristicEngine`] holds an ordered, append-only registry of
//! [`HeuristicRule`]s and scores subjects by summing the weights of
//! matching rules, clamped to `[0, 1]`. The [`SignatureDb`] provides
//! exact known-bad matching by digest or filename glob; a signature hit
//! overrides heuristic scoring entirely.

pub mod rules;
pub mod signatures;

pub use rules::{HeuristicRule, RuleMatch, RulePredicate};
pub use signatures::{Signature, SignatureDb, SignatureMatch};

use crate::core::types::Subject;

/// Ordered registry of heuristic rules.
///
/// Rules are evaluated in registration order. Registration is append-only:
/// a rule, once added, keeps its position and behavior for the lifetime of
/// the engine, so two evaluations of the same subject against the same
/// engine always agree.
#[derive(Debug, Default)]
pub struct HeuristicEngine {
    rules: Vec<HeuristicRule>,
}

impl HeuristicEngine {
    /// Creates an engine with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine pre-loaded with the given rules, in order.
    pub fn with_rules(rules: Vec<HeuristicRule>) -> Self {
        Self { rules }
    }

    /// Appends a rule to the registry.
    pub fn register(&mut self, rule: HeuristicRule) {
        self.rules.push(rule);
    }

    /// Returns the number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluates every rule against the subject, in registration order.
    ///
    /// The returned vector has one entry per registered rule, matched or
    /// not, so callers can attribute every contribution.
    pub fn evaluate(&self, subject: &Subject) -> Vec<RuleMatch> {
        self.rules
            .iter()
            .map(|rule| {
                let matched = rule.matches(subject);
                RuleMatch {
                    rule: rule.name.clone(),
                    matched,
                    contribution: if matched { rule.weight } else { 0.0 },
                }
            })
            .collect()
    }

    /// Scores a subject: the sum of matching rule weights, clamped to
    /// `[0, 1]`.
    pub fn score(&self, subject: &Subject) -> f64 {
        let sum: f64 = self
            .rules
            .iter()
            .filter(|rule| rule.matches(subject))
            .map(|rule| rule.weight)
            .sum();
        sum.clamp(0.0, 1.0)
    }

    /// Evaluates and scores in one pass, returning only matched rules.
    pub fn assess(&self, subject: &Subject) -> (f64, Vec<RuleMatch>) {
        let hits: Vec<RuleMatch> = self
            .evaluate(subject)
            .into_iter()
            .filter(|m| m.matched)
            .collect();
        let score = hits
            .iter()
            .map(|m| m.contribution)
            .sum::<f64>()
            .clamp(0.0, 1.0);
        (score, hits)
    }
}
