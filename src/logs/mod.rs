use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One recorded event of a run. Collectors that fail open record a `warning`
/// here instead of aborting the analysis.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub at: String,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct RunLogFile {
    schema_version: &'static str,
    tool_version: String,
    command: String,
    started_at: String,
    finished_at: String,
    status: String,
    events: Vec<RunEvent>,
}

/// In-memory event buffer for one analysis run, flushed to a JSON file under
/// the user's log directory at the end. Writing the log is best-effort for
/// the caller: a run that produced a report must not fail because the log
/// could not be persisted.
#[derive(Debug)]
pub struct RunLog {
    command: String,
    started_at: OffsetDateTime,
    events: Vec<RunEvent>,
    warnings: usize,
}

impl RunLog {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            started_at: OffsetDateTime::now_utc(),
            events: Vec::new(),
            warnings: 0,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push("info", message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings += 1;
        self.push("warning", message.into());
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    fn push(&mut self, level: &str, message: String) {
        self.events.push(RunEvent {
            at: format_ts(OffsetDateTime::now_utc()),
            level: level.to_string(),
            message,
        });
    }

    pub fn write(&self, home_dir: &Path) -> Result<PathBuf> {
        let dir = logs_dir(home_dir);
        std::fs::create_dir_all(&dir).with_context(|| {
            format!("no se pudo crear el directorio de logs: {}", dir.display())
        })?;

        let finished_at = OffsetDateTime::now_utc();
        let pid = std::process::id();
        let ts = finished_at.unix_timestamp_nanos();
        let path = dir.join(format!("run-{}-{pid}-{ts}.json", self.command));

        let status = if self.warnings == 0 { "ok" } else { "partial" };
        let log = RunLogFile {
            schema_version: "1.0",
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            command: self.command.clone(),
            started_at: format_ts(self.started_at),
            finished_at: format_ts(finished_at),
            status: status.to_string(),
            events: self.events.clone(),
        };

        let buf =
            serde_json::to_vec_pretty(&log).context("no se pudo serializar el log (JSON)")?;
        std::fs::write(&path, buf)
            .with_context(|| format!("no se pudo escribir el log: {}", path.display()))?;
        Ok(path)
    }
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/centinela/logs")
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}
