use regex::Regex;

use crate::core::{Finding, Observation, Reason};

/// Pure predicate over observation fields. A field that is absent, or present
/// with an unexpected type, never matches (fail-open: no flag, no error).
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Substring containment, case-insensitive.
    Contains { field: String, needle: String },
    /// Any of the needles contained in the field, case-insensitive.
    ContainsAny { field: String, needles: Vec<String> },
    /// Compiled regex match.
    Matches { field: String, pattern: Regex },
    GreaterThan { field: String, threshold: f64 },
    LessThan { field: String, threshold: f64 },
    /// Exact membership, case-insensitive.
    InSet { field: String, values: Vec<String> },
    /// Suffix membership, case-insensitive (extension blacklists).
    EndsWithAny { field: String, suffixes: Vec<String> },
    IsTrue { field: String },
    IsFalse { field: String },
}

impl Predicate {
    pub fn matches(&self, obs: &Observation) -> bool {
        match self {
            Predicate::Contains { field, needle } => obs
                .str_field(field)
                .is_some_and(|v| v.to_lowercase().contains(&needle.to_lowercase())),
            Predicate::ContainsAny { field, needles } => obs.str_field(field).is_some_and(|v| {
                let v = v.to_lowercase();
                needles.iter().any(|n| v.contains(&n.to_lowercase()))
            }),
            Predicate::Matches { field, pattern } => {
                obs.str_field(field).is_some_and(|v| pattern.is_match(v))
            }
            Predicate::GreaterThan { field, threshold } => {
                obs.num_field(field).is_some_and(|v| v > *threshold)
            }
            Predicate::LessThan { field, threshold } => {
                obs.num_field(field).is_some_and(|v| v < *threshold)
            }
            Predicate::InSet { field, values } => obs
                .str_field(field)
                .is_some_and(|v| values.iter().any(|m| m.eq_ignore_ascii_case(v))),
            Predicate::EndsWithAny { field, suffixes } => obs.str_field(field).is_some_and(|v| {
                let v = v.to_lowercase();
                suffixes.iter().any(|s| v.ends_with(&s.to_lowercase()))
            }),
            Predicate::IsTrue { field } => obs.bool_field(field) == Some(true),
            Predicate::IsFalse { field } => obs.bool_field(field) == Some(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub category: String,
    pub reason: String,
    pub predicate: Predicate,
}

impl Rule {
    pub fn new(category: &str, reason: &str, predicate: Predicate) -> Self {
        Self {
            category: category.to_string(),
            reason: reason.to_string(),
            predicate,
        }
    }
}

/// Ordered set of independent rules. Evaluation is commutative: every matching
/// rule appends its reason, and no rule sees another rule's result. Bad regex
/// patterns are rejected when the set is built (config load), so classifying a
/// single observation cannot fail.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify(&self, subject: Observation) -> Finding {
        let reasons: Vec<Reason> = self
            .rules
            .iter()
            .filter(|rule| rule.predicate.matches(&subject))
            .map(|rule| Reason::new(rule.category.clone(), rule.reason.clone()))
            .collect();

        Finding {
            subject,
            flagged: !reasons.is_empty(),
            reasons,
        }
    }

    pub fn classify_all(&self, observations: Vec<Observation>) -> Vec<Finding> {
        observations
            .into_iter()
            .map(|obs| self.classify(obs))
            .collect()
    }
}
