use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use walkdir::WalkDir;

use crate::core::Observation;
use crate::logs::RunLog;

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub excludes: Vec<String>,
    pub deadline: Option<Instant>,
}

/// Walks `root` and produces one observation per regular file. Unreadable
/// entries are skipped with a warning; hitting the deadline truncates the
/// walk instead of failing it.
pub fn collect(root: &Path, options: &WalkOptions, log: &mut RunLog) -> Result<Vec<Observation>> {
    if !root.is_dir() {
        anyhow::bail!("el directorio no existe: {}", root.display());
    }

    let exclude_set = build_exclude_set(&options.excludes)?;
    let mut observations = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |e| !exclude_set.is_match(e.path()));

    for entry in walker {
        if let Some(deadline) = options.deadline {
            if Instant::now() >= deadline {
                log.warning(format!(
                    "recorrido truncado por tiempo: {}",
                    root.display()
                ));
                break;
            }
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log.warning(format!("entrada ilegible: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        let mut obs = Observation::new(path.display().to_string())
            .with("name", name.clone())
            .with("hidden", name.starts_with('.'));

        if let Some(ext) = extension_of(&name) {
            obs = obs.with("extension", ext);
        }

        match entry.metadata() {
            Ok(meta) => {
                obs = obs.with("size", meta.len());
                if let Some(mode) = unix_mode(&meta) {
                    obs = obs.with("mode", mode);
                }
                if let Ok(modified) = meta.modified() {
                    let ts = OffsetDateTime::from(modified);
                    if let Ok(s) = ts.format(&Rfc3339) {
                        obs = obs.with("modified", s);
                    }
                }
            }
            Err(err) => {
                log.warning(format!("metadatos ilegibles: {}: {err}", path.display()));
            }
        }

        observations.push(obs);
    }

    Ok(observations)
}

fn build_exclude_set(excludes: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in excludes {
        let glob = Glob::new(pattern)
            .with_context(|| format!("patrón de exclusión inválido: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("no se pudo compilar las exclusiones")
}

/// Last dot-suffix including the dot, lowercased. A leading dot alone (hidden
/// file without extension) does not count.
fn extension_of(name: &str) -> Option<String> {
    let idx = name.rfind('.')?;
    if idx == 0 {
        let rest = &name[1..];
        if !rest.contains('.') {
            return None;
        }
    }
    let ext = &name[idx..];
    if ext.len() < 2 {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(unix)]
fn unix_mode(meta: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(format!("{:03o}", meta.mode() & 0o777))
}

#[cfg(not(unix))]
fn unix_mode(_meta: &std::fs::Metadata) -> Option<String> {
    None
}
