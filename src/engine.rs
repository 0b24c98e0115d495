use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::collect::{email, filesystem, hardening, logcheck};
use crate::config::EffectiveConfig;
use crate::core::{Finding, Observation, Report};
use crate::logs::RunLog;
use crate::pwned::PwnedClient;
use crate::report;

/// Orchestration for each analysis kind: collect, classify, score, assemble.
/// Inputs that do not exist are hard errors; degradation inside a collection
/// (unreadable entries, missing host sources) lands in the run log instead.

pub fn analyze_filesystem(
    cfg: &EffectiveConfig,
    root: &Path,
    excludes: &[String],
    budget: Option<Duration>,
    log: &mut RunLog,
) -> Result<Report> {
    let options = filesystem::WalkOptions {
        excludes: excludes.to_vec(),
        deadline: budget.map(|d| Instant::now() + d),
    };
    let observations = filesystem::collect(root, &options, log)?;
    log.info(format!("{} archivos observados", observations.len()));

    let findings = cfg.filesystem_rules().classify_all(observations);
    Ok(report::build(
        "fs",
        &root.display().to_string(),
        findings,
        &cfg.weight_table(),
        warning_notes(log),
    ))
}

pub fn analyze_email(cfg: &EffectiveConfig, path: &Path, log: &mut RunLog) -> Result<Report> {
    let parsed = email::collect(path, &cfg.rules.phishing_keywords)?;
    log.info(format!(
        "{} URLs, {} adjuntos, {} palabras clave",
        parsed.urls.len(),
        parsed.attachments.len(),
        parsed.keywords.len()
    ));

    let mut findings: Vec<Finding> = Vec::new();
    findings.push(cfg.header_rules().classify(parsed.headers));
    findings.extend(cfg.url_rules().classify_all(parsed.urls));
    findings.extend(cfg.attachment_rules().classify_all(parsed.attachments));
    findings.extend(cfg.keyword_rules().classify_all(parsed.keywords));

    Ok(report::build(
        "email",
        &path.display().to_string(),
        findings,
        &cfg.weight_table(),
        warning_notes(log),
    ))
}

pub fn analyze_logs(cfg: &EffectiveConfig, path: &Path, log: &mut RunLog) -> Result<Report> {
    let observations = logcheck::collect(path)?;
    log.info(format!("{} líneas observadas", observations.len()));

    let top = logcheck::top_source_ips(&observations, 10);
    let rules = cfg.log_rules()?;
    let findings = rules.classify_all(observations);

    let mut notes = warning_notes(log);
    for (ip, count) in top {
        notes.push(format!("IP frecuente: {ip} ({count} líneas)"));
    }

    Ok(report::build(
        "logs",
        &path.display().to_string(),
        findings,
        &cfg.weight_table(),
        notes,
    ))
}

pub fn audit_hardening(
    cfg: &EffectiveConfig,
    timeout: Duration,
    log: &mut RunLog,
) -> Result<Report> {
    let observations = hardening::collect(timeout, log);
    log.info(format!("{} fuentes observadas", observations.len()));

    let findings = cfg.hardening_rules().classify_all(observations);
    Ok(report::build(
        "hardening",
        "localhost",
        findings,
        &cfg.weight_table(),
        warning_notes(log),
    ))
}

/// Each line of `path` is a candidate password. Only breach counts reach the
/// report; the passwords themselves stay out of it.
pub fn check_passwords(cfg: &EffectiveConfig, path: &Path, log: &mut RunLog) -> Result<Report> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer el archivo de contraseñas: {}", path.display()))?;
    let passwords: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    if passwords.is_empty() {
        anyhow::bail!("el archivo de contraseñas está vacío: {}", path.display());
    }

    let client = PwnedClient::new(
        &cfg.pwned.api_url,
        Duration::from_secs(cfg.http.timeout_secs),
    );

    let mut observations = Vec::new();
    for (idx, password) in passwords.iter().enumerate() {
        match client.check(password) {
            Ok(count) => {
                observations.push(
                    Observation::new(format!("password:{}", idx + 1))
                        .with("breach_count", count),
                );
            }
            Err(err) => {
                log.warning(format!("consulta fallida para la entrada {}: {err}", idx + 1));
            }
        }
    }

    let findings = cfg.pwned_rules().classify_all(observations);
    Ok(report::build(
        "pwned",
        &path.display().to_string(),
        findings,
        &cfg.weight_table(),
        warning_notes(log),
    ))
}

fn warning_notes(log: &RunLog) -> Vec<String> {
    log.events()
        .iter()
        .filter(|e| e.level == "warning")
        .map(|e| e.message.clone())
        .collect()
}
