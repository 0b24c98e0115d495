use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::Observation;

/// One observation per log line. The line number keeps the subject stable and
/// unique even when the same line repeats.
pub fn collect(path: &Path) -> Result<Vec<Observation>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer el archivo de log: {}", path.display()))?;
    Ok(observe_lines(&raw))
}

pub fn observe_lines(raw: &str) -> Vec<Observation> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let mut obs = Observation::new(format!("line:{}", idx + 1))
                .with("number", (idx + 1) as u64)
                .with("line", line.to_string());
            if let Some(ip) = first_ipv4(line) {
                obs = obs.with("source_ip", ip);
            }
            obs
        })
        .collect()
}

fn first_ipv4(line: &str) -> Option<String> {
    static IP_RE: OnceLock<Regex> = OnceLock::new();
    let re = IP_RE.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap_or_else(|_| unreachable!())
    });
    re.find(line).map(|m| m.as_str().to_string())
}

/// Most frequent source addresses, descending by count then ascending by
/// address for a stable report.
pub fn top_source_ips(observations: &[Observation], limit: usize) -> Vec<(String, u64)> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for obs in observations {
        if let Some(ip) = obs.str_field("source_ip") {
            *counts.entry(ip.to_string()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Jan 10 03:14:15 host sshd[411]: Failed password for root from 203.0.113.9 port 50122 ssh2
Jan 10 03:14:16 host sshd[411]: Failed password for root from 203.0.113.9 port 50124 ssh2

Jan 10 03:15:01 host sshd[412]: Accepted password for ana from 198.51.100.7 port 40100 ssh2
Jan 10 03:16:44 host sudo:  ana : TTY=pts/0 ; COMMAND=/usr/bin/apt update
";

    #[test]
    fn blank_lines_are_dropped_and_numbering_is_preserved() {
        let obs = observe_lines(SAMPLE);
        assert_eq!(obs.len(), 4);
        assert_eq!(obs[2].subject, "line:4");
    }

    #[test]
    fn source_ip_is_the_first_ipv4_in_the_line() {
        let obs = observe_lines(SAMPLE);
        assert_eq!(obs[0].str_field("source_ip"), Some("203.0.113.9"));
        assert_eq!(obs[3].str_field("source_ip"), None);
    }

    #[test]
    fn top_ips_ranks_by_count_then_address() {
        let obs = observe_lines(SAMPLE);
        let top = top_source_ips(&obs, 10);
        assert_eq!(
            top,
            vec![
                ("203.0.113.9".to_string(), 2),
                ("198.51.100.7".to_string(), 1),
            ]
        );
    }

    #[test]
    fn top_ips_respects_the_limit() {
        let obs = observe_lines(SAMPLE);
        let top = top_source_ips(&obs, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, "203.0.113.9");
    }
}
