use serde::{Deserialize, Serialize};

use crate::core::Observation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub category: String,
    pub text: String,
}

impl Reason {
    pub fn new(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// Classification result for one observation. Reasons are recorded in rule
/// order; `flagged` holds exactly when at least one rule matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub subject: Observation,
    pub flagged: bool,
    pub reasons: Vec<Reason>,
}

impl Finding {
    pub fn clean(subject: Observation) -> Self {
        Self {
            subject,
            flagged: false,
            reasons: Vec::new(),
        }
    }
}
