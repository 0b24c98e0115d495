use std::io::{self, Write};
use std::time::Duration;

use anyhow::Error;
use indicatif::ProgressBar;

use crate::core::Report;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "Error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "Causas:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "Siguiente:");
    let _ = writeln!(
        stderr,
        "  - vuelva a ejecutar con `--verbose` para más detalle"
    );
    let _ = writeln!(
        stderr,
        "  - consulte `centinela --help` para los comandos disponibles"
    );
}

/// Spinner on stderr while a collection runs. Disabled off-TTY so piped
/// output stays clean.
pub fn spinner(enabled: bool, message: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

pub fn print_report(report: &Report, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let summary = &report.results.summary;
    let _ = writeln!(
        out,
        "Análisis {} de {}: riesgo {}/100",
        report.kind, report.subject, report.results.risk_score
    );
    let _ = writeln!(
        out,
        "Hallazgos: {} marcados de {} observados",
        summary.flagged_findings, summary.total_findings
    );

    for finding in report.results.findings.iter().filter(|f| f.flagged) {
        let _ = writeln!(out, "- {}", finding.subject.subject);
        for reason in &finding.reasons {
            let _ = writeln!(out, "  - {} ({})", reason.text, reason.category);
        }
    }

    if !summary.by_category.is_empty() && cfg.verbose {
        let _ = writeln!(out, "Por categoría:");
        for entry in &summary.by_category {
            let _ = writeln!(out, "  - {}: {}", entry.category, entry.flagged);
        }
    }

    for note in &report.notes {
        let _ = writeln!(out, "Nota: {note}");
    }
}
