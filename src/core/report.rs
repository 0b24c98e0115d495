use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::Finding;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub flagged: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_findings: u64,
    pub flagged_findings: u64,
    pub by_category: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResults {
    pub findings: Vec<Finding>,
    pub risk_score: u8,
    pub summary: ReportSummary,
}

/// One analysis run, written once. `fecha_analisis` and `resultados` are the
/// wire names the original report consumers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool_version: String,
    pub kind: String,
    pub subject: String,
    #[serde(rename = "fecha_analisis")]
    pub analyzed_at: String,
    #[serde(rename = "resultados")]
    pub results: ReportResults,
    pub notes: Vec<String>,
}

impl ReportSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut by_category: BTreeMap<String, u64> = BTreeMap::new();
        let mut flagged = 0u64;
        for finding in findings {
            if finding.flagged {
                flagged += 1;
            }
            for reason in &finding.reasons {
                *by_category.entry(reason.category.clone()).or_insert(0) += 1;
            }
        }
        Self {
            total_findings: findings.len() as u64,
            flagged_findings: flagged,
            by_category: by_category
                .into_iter()
                .map(|(category, flagged)| CategoryCount { category, flagged })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Observation, Reason};

    #[test]
    fn summary_counts_flagged_and_categories() {
        let findings = vec![
            Finding {
                subject: Observation::new("a"),
                flagged: true,
                reasons: vec![
                    Reason::new("suspicious_extension", "Extensión sospechosa"),
                    Reason::new("hidden_file", "Archivo oculto"),
                ],
            },
            Finding::clean(Observation::new("b")),
        ];

        let summary = ReportSummary::from_findings(&findings);
        assert_eq!(summary.total_findings, 2);
        assert_eq!(summary.flagged_findings, 1);
        assert_eq!(summary.by_category.len(), 2);
        assert_eq!(summary.by_category[0].category, "hidden_file");
        assert_eq!(summary.by_category[0].flagged, 1);
    }
}
