use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::core::{Finding, Observation, Reason, Report};
use crate::enumerate::{Hit, Outcome, Target};
use crate::logs::RunLog;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "centinela",
    version,
    about = "Analizador de seguridad operativa: archivos, correos, logs, hardening y brechas de contraseñas"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
    /// Ruta del reporte JSON (por omisión `centinela-<tipo>-<ts>.json`).
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,
    /// Escribe además un resumen CSV junto al reporte.
    #[arg(long, global = true)]
    pub csv: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analiza archivos sospechosos bajo un directorio.
    Fs(FsArgs),
    /// Analiza un correo guardado (cabeceras, URLs, adjuntos).
    Email(EmailArgs),
    /// Analiza un archivo de log en busca de patrones de seguridad.
    Logs(LogsArgs),
    /// Audita la configuración de seguridad del equipo local.
    Hardening,
    /// Verifica contraseñas contra brechas conocidas (k-anonimato).
    Pwned(PwnedArgs),
    /// Enumeración de rutas o subdominios con diccionario.
    Enum(EnumArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct FsArgs {
    pub dir: PathBuf,
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args)]
pub struct EmailArgs {
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct PwnedArgs {
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct EnumArgs {
    #[command(subcommand)]
    pub command: EnumCommand,
}

#[derive(Debug, Subcommand)]
pub enum EnumCommand {
    /// Prueba rutas `{url}/{palabra}`.
    Dirs { url: String, wordlist: PathBuf },
    /// Prueba hosts `http://{palabra}.{dominio}`.
    Subdomains { domain: String, wordlist: PathBuf },
    /// Prueba puertos TCP (`80`, `22,80,443` o `1-1024`).
    Ports { host: String, range: String },
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let ui_cfg = UiConfig {
        stdout_is_tty: io::stdout().is_terminal(),
        stderr_is_tty: io::stderr().is_terminal(),
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let home_dir = crate::platform::effective_home_dir()?;

    let env_config_path = std::env::var_os("CENTINELA_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let timeout = Duration::from_secs(cli.timeout);
    let show_progress = ui_cfg.stderr_is_tty && !cli.quiet && !cli.json;

    match &cli.command {
        Commands::Fs(args) => {
            let mut log = RunLog::new("fs");
            let mut excludes = args.exclude.clone();
            excludes.sort();
            excludes.dedup();

            let pb = crate::ui::spinner(show_progress, "recorriendo el directorio...");
            let result = crate::engine::analyze_filesystem(
                &cfg,
                &args.dir,
                &excludes,
                Some(timeout),
                &mut log,
            );
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            let report = result.map_err(crate::exit::invalid_args_err)?;
            finish_run(&cli, &ui_cfg, &cfg, &home_dir, &log, &report)?;
        }
        Commands::Email(args) => {
            let mut log = RunLog::new("email");
            let report = crate::engine::analyze_email(&cfg, &args.file, &mut log)
                .map_err(crate::exit::invalid_args_err)?;
            finish_run(&cli, &ui_cfg, &cfg, &home_dir, &log, &report)?;
        }
        Commands::Logs(args) => {
            let mut log = RunLog::new("logs");
            let report = crate::engine::analyze_logs(&cfg, &args.file, &mut log)
                .map_err(crate::exit::invalid_args_err)?;
            finish_run(&cli, &ui_cfg, &cfg, &home_dir, &log, &report)?;
        }
        Commands::Hardening => {
            let mut log = RunLog::new("hardening");
            let pb = crate::ui::spinner(show_progress, "auditando el equipo...");
            let result = crate::engine::audit_hardening(&cfg, timeout, &mut log);
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            let report = result?;
            finish_run(&cli, &ui_cfg, &cfg, &home_dir, &log, &report)?;
        }
        Commands::Pwned(args) => {
            let mut log = RunLog::new("pwned");
            let pb = crate::ui::spinner(show_progress, "consultando brechas...");
            let result = crate::engine::check_passwords(&cfg, &args.file, &mut log);
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            let report = result.map_err(crate::exit::invalid_args_err)?;
            finish_run(&cli, &ui_cfg, &cfg, &home_dir, &log, &report)?;
        }
        Commands::Enum(args) => {
            run_enum(&cli, &ui_cfg, &cfg, &home_dir, &args.command)?;
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "centinela", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    let stdout = std::io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
                    println!();
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `centinela config --show`");
            }
        }
    }

    Ok(())
}

fn run_enum(
    cli: &Cli,
    ui_cfg: &UiConfig,
    cfg: &crate::config::EffectiveConfig,
    home_dir: &Path,
    command: &EnumCommand,
) -> Result<()> {
    let mut log = RunLog::new("enum");

    let (target, words, subject, kind) = match command {
        EnumCommand::Dirs { url, wordlist } => {
            let url = url.trim_end_matches('/');
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(crate::exit::invalid_args(
                    "enum dirs: la URL debe empezar con http:// o https://",
                ));
            }
            let words = crate::enumerate::load_wordlist(wordlist)
                .map_err(crate::exit::invalid_args_err)?;
            (
                Target::Dirs {
                    base_url: url.to_string(),
                },
                words,
                url.to_string(),
                "enum-dirs",
            )
        }
        EnumCommand::Subdomains { domain, wordlist } => {
            let domain = domain.trim();
            if domain.is_empty() || domain.contains('/') {
                return Err(crate::exit::invalid_args(
                    "enum subdomains: dominio inválido",
                ));
            }
            let words = crate::enumerate::load_wordlist(wordlist)
                .map_err(crate::exit::invalid_args_err)?;
            (
                Target::Subdomains {
                    domain: domain.to_string(),
                },
                words,
                domain.to_string(),
                "enum-subdomains",
            )
        }
        EnumCommand::Ports { host, range } => {
            let host = host.trim();
            if host.is_empty() || host.contains('/') || host.contains(':') {
                return Err(crate::exit::invalid_args("enum ports: host inválido"));
            }
            let words = crate::enumerate::expand_ports(range)
                .map_err(crate::exit::invalid_args_err)?;
            (
                Target::Ports {
                    host: host.to_string(),
                },
                words,
                host.to_string(),
                "enum-ports",
            )
        }
    };

    log.info(format!("{} candidatos", words.len()));

    let live = !ui_cfg.quiet && !cli.json;
    let hits = crate::enumerate::run(
        &target,
        words,
        cfg.http.workers,
        Duration::from_secs(cfg.http.timeout_secs),
        |outcome| match outcome {
            Outcome::Found(hit) => {
                if live {
                    if matches!(target, Target::Ports { .. }) {
                        println!("[+] Puerto abierto: {}", hit.url);
                    } else {
                        println!("[+] Encontrado: {}", hit.url);
                    }
                }
            }
            Outcome::Forbidden(hit) => {
                if live {
                    println!("[!] Prohibido: {}", hit.url);
                }
            }
            Outcome::Error { candidate, error } => {
                log.warning(format!("{candidate}: {error}"));
            }
            Outcome::Miss { .. } => {}
        },
    );

    let findings = hits
        .iter()
        .map(|hit| match &target {
            Target::Ports { host } => port_finding(host, hit),
            _ => hit_finding(hit),
        })
        .collect();
    let report = crate::report::build(kind, &subject, findings, &cfg.weight_table(), {
        log.events()
            .iter()
            .filter(|e| e.level == "warning")
            .map(|e| e.message.clone())
            .collect()
    });
    finish_run(cli, ui_cfg, cfg, home_dir, &log, &report)
}

fn hit_finding(hit: &Hit) -> Finding {
    let (category, text) = if hit.status == 403 {
        ("forbidden_resource", "Acceso prohibido (403)")
    } else {
        ("exposed_resource", "Recurso accesible")
    };
    Finding {
        subject: Observation::new(hit.url.clone())
            .with("candidate", hit.candidate.clone())
            .with("status", u64::from(hit.status)),
        flagged: true,
        reasons: vec![Reason::new(category, text)],
    }
}

fn port_finding(host: &str, hit: &Hit) -> Finding {
    Finding {
        subject: Observation::new(hit.url.clone())
            .with("host", host.to_string())
            .with("port", u64::from(hit.status)),
        flagged: true,
        reasons: vec![Reason::new("open_port", "Puerto abierto")],
    }
}

/// Persist the report and the run log, then render. Report and log writes are
/// best-effort once the analysis itself succeeded.
fn finish_run(
    cli: &Cli,
    ui_cfg: &UiConfig,
    cfg: &crate::config::EffectiveConfig,
    home_dir: &Path,
    log: &RunLog,
    report: &Report,
) -> Result<()> {
    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| crate::report::default_path(&report.kind));

    match crate::report::write_json(report, &path) {
        Ok(()) => {
            if !ui_cfg.quiet && !cli.json {
                println!("Reporte generado en {}", path.display());
            }
        }
        Err(err) => {
            if !ui_cfg.quiet {
                eprintln!("Aviso: {err}");
            }
        }
    }

    if cli.csv || cfg.report.csv {
        let csv_path = crate::report::csv_path(&path);
        match crate::report::write_csv(report, &csv_path) {
            Ok(()) => {
                if !ui_cfg.quiet && !cli.json {
                    println!("Resumen CSV en {}", csv_path.display());
                }
            }
            Err(err) => {
                if !ui_cfg.quiet {
                    eprintln!("Aviso: {err}");
                }
            }
        }
    }

    if let Err(err) = log.write(home_dir) {
        if ui_cfg.verbose {
            eprintln!("Aviso: {err}");
        }
    }

    if cli.json {
        write_json(report)?;
    } else {
        crate::ui::print_report(report, ui_cfg);
    }
    Ok(())
}

fn write_json(report: &Report) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(report)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "shell no soportado: {other} (use bash|zsh|fish)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_shell_accepts_known_shells() {
        assert!(matches!(
            parse_shell("Bash"),
            Ok(clap_complete::Shell::Bash)
        ));
        assert!(parse_shell("powershell").is_err());
    }

    #[test]
    fn open_ports_become_open_port_findings() {
        let hit = Hit {
            candidate: "22".to_string(),
            url: "host.example:22".to_string(),
            status: 22,
        };
        let finding = port_finding("host.example", &hit);
        assert!(finding.flagged);
        assert_eq!(finding.reasons[0].category, "open_port");
        assert_eq!(finding.subject.num_field("port"), Some(22.0));
        assert_eq!(finding.subject.str_field("host"), Some("host.example"));
    }

    #[test]
    fn forbidden_hits_become_forbidden_findings() {
        let hit = Hit {
            candidate: "backup".to_string(),
            url: "http://example.test/backup".to_string(),
            status: 403,
        };
        let finding = hit_finding(&hit);
        assert!(finding.flagged);
        assert_eq!(finding.reasons[0].category, "forbidden_resource");
    }
}
