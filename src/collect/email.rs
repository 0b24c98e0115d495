use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::Observation;

/// Parsed message split into the observation groups the analyzers consume.
#[derive(Debug, Clone)]
pub struct EmailObservations {
    pub headers: Observation,
    pub urls: Vec<Observation>,
    pub attachments: Vec<Observation>,
    pub keywords: Vec<Observation>,
}

pub fn collect(path: &Path, keywords: &[String]) -> Result<EmailObservations> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer el correo: {}", path.display()))?;
    Ok(parse_message(&raw, keywords))
}

/// RFC 5322-ish split: headers until the first blank line (continuation lines
/// folded into the previous header), everything after is body. Both LF and
/// CRLF line endings occur in saved messages. Header parsing is lenient; a
/// malformed line is kept as body text rather than rejected.
pub fn parse_message(raw: &str, keywords: &[String]) -> EmailObservations {
    let (header_block, body) = split_at_blank_line(raw);

    let headers = parse_headers(header_block);
    let subject = header_value(&headers, "subject").unwrap_or_default();
    let from = header_value(&headers, "from").unwrap_or_default();

    let spf_present = headers
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("received-spf"))
        || header_value(&headers, "authentication-results")
            .is_some_and(|v| v.to_lowercase().contains("spf="));
    let dkim_present = headers
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("dkim-signature"));

    let header_obs = Observation::new("headers")
        .with("from", from.clone())
        .with("subject", subject.clone())
        .with("spf_present", spf_present)
        .with("dkim_present", dkim_present);

    let urls = extract_urls(body)
        .into_iter()
        .map(|url| {
            let mut obs = Observation::new(url.clone())
                .with("length", url.len() as u64)
                .with("has_at", url.contains('@'))
                .with("has_percent", url.contains('%'));
            if let Some(domain) = url_domain(&url) {
                obs = obs.with("domain", domain);
            }
            obs.with("url", url)
        })
        .collect();

    let attachments = extract_attachment_names(raw)
        .into_iter()
        .map(|name| {
            let mut obs = Observation::new(name.clone()).with("filename", name.clone());
            if let Some(idx) = name.rfind('.') {
                obs = obs.with("extension", name[idx..].to_lowercase());
            }
            obs
        })
        .collect();

    let haystack = format!("{}\n{}", subject.to_lowercase(), body.to_lowercase());
    let keywords = keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.to_lowercase()))
        .map(|kw| Observation::new(format!("keyword:{kw}")).with("keyword", kw.clone()))
        .collect();

    EmailObservations {
        headers: header_obs,
        urls,
        attachments,
        keywords,
    }
}

fn split_at_blank_line(raw: &str) -> (&str, &str) {
    if let Some((headers, body)) = raw.split_once("\r\n\r\n") {
        return (headers, body);
    }
    match raw.split_once("\n\n") {
        Some((headers, body)) => (headers, body),
        None => (raw, ""),
    }
}

fn parse_headers(block: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    headers
}

fn header_value(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

fn url_domain(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

fn extract_urls(body: &str) -> Vec<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let re = URL_RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"']+"#).unwrap_or_else(|_| unreachable!())
    });
    re.find_iter(body).map(|m| m.as_str().to_string()).collect()
}

fn extract_attachment_names(raw: &str) -> Vec<String> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r#"filename="?([^";\r\n]+)"?"#).unwrap_or_else(|_| unreachable!())
    });
    re.captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
