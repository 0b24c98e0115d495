use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};

/// k-anonymity client for the Pwned Passwords range API. Only the first five
/// hex digits of the SHA-1 leave the machine; the plaintext never does.
pub struct PwnedClient {
    api_url: String,
    agent: ureq::Agent,
}

impl PwnedClient {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(timeout)
                .build(),
        }
    }

    /// Times the password appeared in known breaches, zero if never.
    pub fn check(&self, password: &str) -> Result<u64> {
        let digest = sha1_hex_upper(password);
        let (prefix, suffix) = digest.split_at(5);
        let body = self.fetch_range(prefix)?;
        Ok(find_suffix(&body, suffix).unwrap_or(0))
    }

    fn fetch_range(&self, prefix: &str) -> Result<String> {
        let url = format!("{}/range/{prefix}", self.api_url);
        let response = self
            .agent
            .get(&url)
            .set("User-Agent", concat!("centinela/", env!("CARGO_PKG_VERSION")))
            .set("Add-Padding", "true")
            .call()
            .with_context(|| format!("fallo la consulta al servicio de brechas: {url}"))?;
        response
            .into_string()
            .context("no se pudo leer la respuesta del servicio de brechas")
    }
}

pub fn sha1_hex_upper(password: &str) -> String {
    let digest = Sha1::digest(password.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02X}");
    }
    hex
}

/// Range responses are `SUFFIX:COUNT` lines. Matching is case-insensitive and
/// malformed lines (padding included) are skipped.
pub fn find_suffix(body: &str, suffix: &str) -> Option<u64> {
    for line in body.lines() {
        let Some((candidate, count)) = line.trim().split_once(':') else {
            continue;
        };
        if candidate.eq_ignore_ascii_case(suffix) {
            if let Ok(count) = count.trim().parse::<u64>() {
                return Some(count);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_matches_the_known_test_vector() {
        // SHA-1("password"), a fixture every breach checker uses.
        assert_eq!(
            sha1_hex_upper("password"),
            "5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8"
        );
    }

    #[test]
    fn suffix_match_is_case_insensitive() {
        let body = "003D68EB55068C33ACE09247EE4C639306B:3\n\
                    1E4C9B93F3F0682250B6CF8331B7EE68FD8:42\n";
        assert_eq!(find_suffix(body, "1e4c9b93f3f0682250b6cf8331b7ee68fd8"), Some(42));
    }

    #[test]
    fn absent_suffix_yields_none() {
        let body = "003D68EB55068C33ACE09247EE4C639306B:3\n";
        assert_eq!(find_suffix(body, "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"), None);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let body = "sin-dos-puntos\n1E4C9B93F3F0682250B6CF8331B7EE68FD8:notanumber\n\
                    1E4C9B93F3F0682250B6CF8331B7EE68FD8:7\n";
        assert_eq!(find_suffix(body, "1E4C9B93F3F0682250B6CF8331B7EE68FD8"), Some(7));
    }
}
