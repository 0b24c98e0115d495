use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::WeightTable;
use crate::rules::{Predicate, Rule, RuleSet};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub rules: RulesConfig,
    pub weights: WeightsConfig,
    pub http: HttpConfig,
    pub pwned: PwnedConfig,
    pub report: ReportConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

/// Rule material for every analyzer. Kept in configuration rather than code so
/// deployments (and tests) can supply their own indicator lists.
#[derive(Debug, Clone, Serialize)]
pub struct RulesConfig {
    pub suspicious_extensions: Vec<String>,
    pub suspicious_names: Vec<String>,
    pub risky_modes: Vec<String>,
    pub phishing_keywords: Vec<String>,
    pub url_max_length: u64,
    pub log_patterns: BTreeMap<String, String>,
    pub insecure_services: Vec<String>,
    pub min_password_length: u64,
    pub max_admin_accounts: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightsConfig {
    pub categories: BTreeMap<String, u32>,
    pub default_weight: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpConfig {
    pub workers: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PwnedConfig {
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub csv: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        let mut log_patterns = BTreeMap::new();
        log_patterns.insert("failed_password".to_string(), r"(?i)Failed password".to_string());
        log_patterns.insert("accepted_password".to_string(), r"(?i)Accepted password".to_string());
        log_patterns.insert(
            "privilege_escalation".to_string(),
            r"sudo:.*COMMAND=".to_string(),
        );
        log_patterns.insert("port_scan".to_string(), r"(?i)Port scan detected".to_string());
        log_patterns.insert(
            "brute_force".to_string(),
            r"(?i)Too many authentication failures".to_string(),
        );

        let mut categories = BTreeMap::new();
        categories.insert("suspicious_extension".to_string(), 15);
        categories.insert("suspicious_name".to_string(), 15);
        categories.insert("suspicious_permissions".to_string(), 10);
        categories.insert("hidden_file".to_string(), 5);
        categories.insert("suspicious_url".to_string(), 15);
        categories.insert("suspicious_attachment".to_string(), 20);
        categories.insert("missing_auth".to_string(), 10);
        categories.insert("keyword".to_string(), 5);
        categories.insert("failed_password".to_string(), 10);
        categories.insert("accepted_password".to_string(), 5);
        categories.insert("privilege_escalation".to_string(), 15);
        categories.insert("port_scan".to_string(), 15);
        categories.insert("brute_force".to_string(), 20);
        categories.insert("weak_policy".to_string(), 20);
        categories.insert("breached_password".to_string(), 25);
        categories.insert("insecure_service".to_string(), 10);
        categories.insert("admin_excess".to_string(), 20);
        categories.insert("exposed_resource".to_string(), 15);
        categories.insert("forbidden_resource".to_string(), 10);
        categories.insert("open_port".to_string(), 10);

        Self {
            rules: RulesConfig {
                suspicious_extensions: vec![
                    ".exe", ".dll", ".bat", ".cmd", ".ps1", ".vbs", ".js", ".jse", ".wsf",
                    ".wsh", ".msi", ".scr", ".jar",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                suspicious_names: vec![
                    "cmd.exe",
                    "powershell.exe",
                    "wscript.exe",
                    "cscript.exe",
                    "mshta.exe",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                risky_modes: vec!["777".to_string(), "666".to_string()],
                phishing_keywords: vec![
                    "urgente", "verificar", "cuenta", "contraseña", "seguridad", "banco",
                    "paypal", "amazon", "microsoft", "actualizar", "confirmar", "suspender",
                    "bloquear", "login", "password", "verify", "account",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                url_max_length: 100,
                log_patterns,
                insecure_services: vec![
                    "telnet", "rsh", "rlogin", "rexec", "tftp", "vsftpd", "xinetd",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                min_password_length: 8,
                max_admin_accounts: 2,
            },
            weights: WeightsConfig {
                categories,
                default_weight: 10,
            },
            http: HttpConfig {
                workers: 10,
                timeout_secs: 5,
            },
            pwned: PwnedConfig {
                api_url: "https://api.pwnedpasswords.com".to_string(),
            },
            report: ReportConfig { csv: false },
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    pub fn weight_table(&self) -> WeightTable {
        WeightTable::new(self.weights.categories.clone(), self.weights.default_weight)
    }

    /// Filesystem indicator rules (extensions, known-bad names, world-writable
    /// modes, hidden files).
    pub fn filesystem_rules(&self) -> RuleSet {
        RuleSet::new(vec![
            Rule::new(
                "suspicious_extension",
                "Extensión sospechosa",
                Predicate::EndsWithAny {
                    field: "extension".to_string(),
                    suffixes: self.rules.suspicious_extensions.clone(),
                },
            ),
            Rule::new(
                "suspicious_name",
                "Nombre sospechoso",
                Predicate::ContainsAny {
                    field: "name".to_string(),
                    needles: self.rules.suspicious_names.clone(),
                },
            ),
            Rule::new(
                "suspicious_permissions",
                "Permisos inusuales",
                Predicate::InSet {
                    field: "mode".to_string(),
                    values: self.rules.risky_modes.clone(),
                },
            ),
            Rule::new(
                "hidden_file",
                "Archivo oculto",
                Predicate::IsTrue {
                    field: "hidden".to_string(),
                },
            ),
        ])
    }

    pub fn url_rules(&self) -> RuleSet {
        RuleSet::new(vec![
            Rule::new(
                "suspicious_url",
                "URL muy larga",
                Predicate::GreaterThan {
                    field: "length".to_string(),
                    threshold: self.rules.url_max_length as f64,
                },
            ),
            Rule::new(
                "suspicious_url",
                "Caracteres sospechosos en URL",
                Predicate::IsTrue {
                    field: "has_at".to_string(),
                },
            ),
            Rule::new(
                "suspicious_url",
                "Caracteres sospechosos en URL",
                Predicate::IsTrue {
                    field: "has_percent".to_string(),
                },
            ),
            Rule::new(
                "keyword",
                "Palabra clave de phishing en URL",
                Predicate::ContainsAny {
                    field: "url".to_string(),
                    needles: self.rules.phishing_keywords.clone(),
                },
            ),
        ])
    }

    pub fn attachment_rules(&self) -> RuleSet {
        RuleSet::new(vec![Rule::new(
            "suspicious_attachment",
            "Extensión sospechosa",
            Predicate::EndsWithAny {
                field: "extension".to_string(),
                suffixes: self.rules.suspicious_extensions.clone(),
            },
        )])
    }

    pub fn header_rules(&self) -> RuleSet {
        RuleSet::new(vec![
            Rule::new(
                "missing_auth",
                "Falta verificación SPF",
                Predicate::IsFalse {
                    field: "spf_present".to_string(),
                },
            ),
            Rule::new(
                "missing_auth",
                "Falta firma DKIM",
                Predicate::IsFalse {
                    field: "dkim_present".to_string(),
                },
            ),
        ])
    }

    pub fn keyword_rules(&self) -> RuleSet {
        RuleSet::new(vec![Rule::new(
            "keyword",
            "Palabra clave de phishing",
            Predicate::ContainsAny {
                field: "keyword".to_string(),
                needles: self.rules.phishing_keywords.clone(),
            },
        )])
    }

    /// One regex rule per configured log pattern; the map key doubles as the
    /// reason category so each pattern can carry its own weight.
    pub fn log_rules(&self) -> Result<RuleSet> {
        let mut rules = Vec::new();
        for (category, pattern) in &self.rules.log_patterns {
            let pattern = Regex::new(pattern)
                .with_context(|| format!("patrón de log inválido para `{category}`: {pattern}"))?;
            rules.push(Rule::new(
                category,
                &format!("Patrón de seguridad detectado: {category}"),
                Predicate::Matches {
                    field: "line".to_string(),
                    pattern,
                },
            ));
        }
        Ok(RuleSet::new(rules))
    }

    pub fn pwned_rules(&self) -> RuleSet {
        RuleSet::new(vec![Rule::new(
            "breached_password",
            "Contraseña comprometida en brechas conocidas",
            Predicate::GreaterThan {
                field: "breach_count".to_string(),
                threshold: 0.0,
            },
        )])
    }

    pub fn hardening_rules(&self) -> RuleSet {
        RuleSet::new(vec![
            Rule::new(
                "weak_policy",
                "Longitud mínima de contraseña insuficiente",
                Predicate::LessThan {
                    field: "pass_min_len".to_string(),
                    threshold: self.rules.min_password_length as f64,
                },
            ),
            Rule::new(
                "admin_excess",
                "Demasiados usuarios con privilegios administrativos",
                Predicate::GreaterThan {
                    field: "member_count".to_string(),
                    threshold: self.rules.max_admin_accounts as f64,
                },
            ),
            Rule::new(
                "insecure_service",
                "Servicio inseguro habilitado",
                Predicate::InSet {
                    field: "service".to_string(),
                    values: self.rules.insecure_services.clone(),
                },
            ),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    rules: Option<RawRulesConfig>,
    weights: Option<RawWeightsConfig>,
    http: Option<RawHttpConfig>,
    pwned: Option<RawPwnedConfig>,
    report: Option<RawReportConfig>,
}

#[derive(Debug, Deserialize)]
struct RawRulesConfig {
    suspicious_extensions: Option<Vec<String>>,
    suspicious_names: Option<Vec<String>>,
    risky_modes: Option<Vec<String>>,
    phishing_keywords: Option<Vec<String>>,
    url_max_length: Option<u64>,
    log_patterns: Option<BTreeMap<String, String>>,
    insecure_services: Option<Vec<String>>,
    min_password_length: Option<u64>,
    max_admin_accounts: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawWeightsConfig {
    categories: Option<BTreeMap<String, u32>>,
    default_weight: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawHttpConfig {
    workers: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPwnedConfig {
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReportConfig {
    csv: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/centinela/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path).with_context(|| {
            format!("no se pudo leer el archivo de configuración: {}", path.display())
        })?;
        let raw: RawConfig =
            toml::from_str(&s).context("no se pudo interpretar la configuración (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    // Surface bad regexes at load time, not per-observation.
    cfg.log_rules()?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(rules) = raw.rules {
        if let Some(v) = rules.suspicious_extensions {
            cfg.rules.suspicious_extensions = v;
        }
        if let Some(v) = rules.suspicious_names {
            cfg.rules.suspicious_names = v;
        }
        if let Some(v) = rules.risky_modes {
            cfg.rules.risky_modes = v;
        }
        if let Some(v) = rules.phishing_keywords {
            cfg.rules.phishing_keywords = v;
        }
        if let Some(v) = rules.url_max_length {
            cfg.rules.url_max_length = v;
        }
        if let Some(v) = rules.log_patterns {
            cfg.rules.log_patterns = v;
        }
        if let Some(v) = rules.insecure_services {
            cfg.rules.insecure_services = v;
        }
        if let Some(v) = rules.min_password_length {
            cfg.rules.min_password_length = v;
        }
        if let Some(v) = rules.max_admin_accounts {
            cfg.rules.max_admin_accounts = v;
        }
    }

    if let Some(weights) = raw.weights {
        if let Some(v) = weights.categories {
            cfg.weights.categories = v;
        }
        if let Some(v) = weights.default_weight {
            cfg.weights.default_weight = v;
        }
    }

    if let Some(http) = raw.http {
        if let Some(v) = http.workers {
            cfg.http.workers = v;
        }
        if let Some(v) = http.timeout_secs {
            cfg.http.timeout_secs = v;
        }
    }

    if let Some(pwned) = raw.pwned {
        if let Some(v) = pwned.api_url {
            cfg.pwned.api_url = v;
        }
    }

    if let Some(report) = raw.report {
        if let Some(v) = report.csv {
            cfg.report.csv = v;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("CENTINELA_HTTP_WORKERS") {
        cfg.http.workers = v
            .trim()
            .parse::<usize>()
            .with_context(|| "CENTINELA_HTTP_WORKERS")?;
    }
    if let Ok(v) = std::env::var("CENTINELA_HTTP_TIMEOUT_SECS") {
        cfg.http.timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "CENTINELA_HTTP_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("CENTINELA_PWNED_API_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.pwned.api_url = v.trim_end_matches('/').to_string();
        }
    }
    if let Ok(v) = std::env::var("CENTINELA_REPORT_CSV") {
        cfg.report.csv = parse_bool(&v).with_context(|| "CENTINELA_REPORT_CSV")?;
    }
    if let Ok(v) = std::env::var("CENTINELA_WEIGHT_DEFAULT") {
        cfg.weights.default_weight = v
            .trim()
            .parse::<u32>()
            .with_context(|| "CENTINELA_WEIGHT_DEFAULT")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "valor booleano inválido: {s} (use true|false|1|0|yes|no|on|off)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_rules_compile() {
        let cfg = EffectiveConfig::default();
        let rules = cfg.log_rules().expect("default patterns compile");
        assert_eq!(rules.len(), cfg.rules.log_patterns.len());
    }

    #[test]
    fn bad_log_pattern_is_a_load_error() {
        let mut cfg = EffectiveConfig::default();
        cfg.rules
            .log_patterns
            .insert("broken".to_string(), "(".to_string());
        assert!(cfg.log_rules().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("Yes").expect("yes"));
        assert!(!parse_bool("off").expect("off"));
        assert!(parse_bool("maybe").is_err());
    }
}
