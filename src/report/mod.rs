use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{Finding, Report, ReportResults, ReportSummary, WeightTable, risk_score};

pub const SCHEMA_VERSION: &str = "1.0";

pub fn build(
    kind: &str,
    subject: &str,
    findings: Vec<Finding>,
    weights: &WeightTable,
    notes: Vec<String>,
) -> Report {
    let summary = ReportSummary::from_findings(&findings);
    let risk = risk_score(&findings, weights);
    Report {
        schema_version: SCHEMA_VERSION.to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        kind: kind.to_string(),
        subject: subject.to_string(),
        analyzed_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        results: ReportResults {
            findings,
            risk_score: risk,
            summary,
        },
        notes,
    }
}

/// `centinela-<kind>-<unix-ts>.json` in the current directory, mirroring the
/// timestamped report names downstream tooling already globs for.
pub fn default_path(kind: &str) -> PathBuf {
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    PathBuf::from(format!("centinela-{kind}-{ts}.json"))
}

pub fn write_json(report: &Report, path: &Path) -> Result<()> {
    let buf =
        serde_json::to_vec_pretty(report).context("no se pudo serializar el reporte (JSON)")?;
    std::fs::write(path, buf)
        .with_context(|| format!("no se pudo escribir el reporte: {}", path.display()))?;
    Ok(())
}

/// One-row summary next to the JSON, for spreadsheet triage.
pub fn write_csv(report: &Report, path: &Path) -> Result<()> {
    let csv = csv_summary(report);
    std::fs::write(path, csv)
        .with_context(|| format!("no se pudo escribir el reporte CSV: {}", path.display()))?;
    Ok(())
}

pub fn csv_path(json_path: &Path) -> PathBuf {
    json_path.with_extension("csv")
}

fn csv_summary(report: &Report) -> String {
    let by_category = report
        .results
        .summary
        .by_category
        .iter()
        .map(|c| format!("{}={}", c.category, c.flagged))
        .collect::<Vec<_>>()
        .join(";");

    let mut out = String::new();
    let _ = writeln!(
        out,
        "kind,subject,fecha_analisis,risk_score,total_findings,flagged_findings,flagged_by_category"
    );
    let _ = writeln!(
        out,
        "{},{},{},{},{},{},{}",
        csv_field(&report.kind),
        csv_field(&report.subject),
        csv_field(&report.analyzed_at),
        report.results.risk_score,
        report.results.summary.total_findings,
        report.results.summary.flagged_findings,
        csv_field(&by_category)
    );
    out
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
