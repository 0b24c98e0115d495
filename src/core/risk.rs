use std::collections::BTreeMap;

use crate::core::Finding;

pub const MAX_RISK: u32 = 100;

/// Fixed integer weight per reason category. Categories not present in the
/// table contribute `default_weight`.
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: BTreeMap<String, u32>,
    default_weight: u32,
}

impl WeightTable {
    pub fn new(weights: BTreeMap<String, u32>, default_weight: u32) -> Self {
        Self {
            weights,
            default_weight,
        }
    }

    pub fn weight(&self, category: &str) -> u32 {
        self.weights
            .get(category)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/// Additive, memoryless risk model: every reason of every finding contributes
/// its category weight; the sum is clamped to [0,100] after summation. Summing
/// before clamping keeps the score monotonic in the number of flagged findings
/// and independent of their order.
pub fn risk_score(findings: &[Finding], weights: &WeightTable) -> u8 {
    let total: u64 = findings
        .iter()
        .flat_map(|f| f.reasons.iter())
        .map(|r| u64::from(weights.weight(&r.category)))
        .sum();
    total.min(u64::from(MAX_RISK)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Observation, Reason};

    fn table() -> WeightTable {
        let mut weights = BTreeMap::new();
        weights.insert("suspicious_attachment".to_string(), 20);
        weights.insert("suspicious_url".to_string(), 15);
        weights.insert("missing_auth".to_string(), 10);
        WeightTable::new(weights, 10)
    }

    fn flagged(category: &str) -> Finding {
        Finding {
            subject: Observation::new("x"),
            flagged: true,
            reasons: vec![Reason::new(category, "motivo")],
        }
    }

    #[test]
    fn empty_findings_score_zero() {
        assert_eq!(risk_score(&[], &table()), 0);
    }

    #[test]
    fn weights_are_summed_per_reason() {
        let findings = vec![flagged("suspicious_attachment"), flagged("suspicious_url")];
        assert_eq!(risk_score(&findings, &table()), 35);
    }

    #[test]
    fn unknown_category_uses_default_weight() {
        let findings = vec![flagged("never_configured")];
        assert_eq!(risk_score(&findings, &table()), 10);
    }

    #[test]
    fn score_saturates_at_100() {
        let findings: Vec<Finding> = (0..20).map(|_| flagged("suspicious_attachment")).collect();
        assert_eq!(risk_score(&findings, &table()), 100);
    }

    #[test]
    fn score_is_monotonic_as_findings_are_appended() {
        let mut findings = Vec::new();
        let mut last = 0u8;
        for _ in 0..30 {
            findings.push(flagged("suspicious_url"));
            let score = risk_score(&findings, &table());
            assert!(score >= last);
            assert!(score <= 100);
            last = score;
        }
    }

    #[test]
    fn score_is_order_independent() {
        let a = flagged("suspicious_attachment");
        let b = flagged("suspicious_url");
        let c = flagged("missing_auth");
        let fwd = vec![a.clone(), b.clone(), c.clone()];
        let rev = vec![c, b, a];
        assert_eq!(risk_score(&fwd, &table()), risk_score(&rev, &table()));
    }

    #[test]
    fn unflagged_findings_contribute_nothing() {
        let findings = vec![Finding::clean(Observation::new("x")), flagged("missing_auth")];
        assert_eq!(risk_score(&findings, &table()), 10);
    }
}
