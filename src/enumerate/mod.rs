use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};

/// What to probe with each candidate.
#[derive(Debug, Clone)]
pub enum Target {
    /// `{base_url}/{word}` paths on one host.
    Dirs { base_url: String },
    /// `http://{word}.{domain}` virtual hosts.
    Subdomains { domain: String },
    /// Plain TCP connect to `{host}:{word}`.
    Ports { host: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub candidate: String,
    pub url: String,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(Hit),
    Forbidden(Hit),
    Miss { candidate: String },
    Error { candidate: String, error: String },
}

pub fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer el diccionario: {}", path.display()))?;
    let words: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        anyhow::bail!("el diccionario está vacío: {}", path.display());
    }
    Ok(words)
}

/// Port candidates from `80`, `22,80,443` or `1-1024` (bounds inclusive).
pub fn expand_ports(range: &str) -> Result<Vec<String>> {
    let mut ports = Vec::new();
    for part in range.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            let start: u16 = parse_port(start)?;
            let end: u16 = parse_port(end)?;
            if start > end {
                anyhow::bail!("rango de puertos invertido: {part}");
            }
            ports.extend((start..=end).map(|p| p.to_string()));
        } else {
            ports.push(parse_port(part)?.to_string());
        }
    }
    if ports.is_empty() {
        anyhow::bail!("rango de puertos vacío: {range}");
    }
    Ok(ports)
}

fn parse_port(s: &str) -> Result<u16> {
    let port = s
        .trim()
        .parse::<u16>()
        .with_context(|| format!("puerto inválido: {s}"))?;
    if port == 0 {
        anyhow::bail!("puerto inválido: 0");
    }
    Ok(port)
}

/// Fixed pool of workers draining a shared wordlist. Outcomes flow through a
/// channel so the caller can report hits as they arrive; the returned vector
/// holds only the confirmed hits (200 and 403), in arrival order.
pub fn run(
    target: &Target,
    words: Vec<String>,
    workers: usize,
    timeout: Duration,
    mut on_outcome: impl FnMut(&Outcome),
) -> Vec<Hit> {
    let workers = workers.max(1).min(words.len().max(1));
    let agent = ureq::AgentBuilder::new()
        .timeout(timeout)
        .redirects(0)
        .build();

    let queue = Arc::new(Mutex::new(words.into_iter()));
    let (tx, rx) = mpsc::channel::<Outcome>();

    let mut hits = Vec::new();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let agent = agent.clone();
            let target = target.clone();
            scope.spawn(move || {
                loop {
                    let word = {
                        let Ok(mut it) = queue.lock() else {
                            return;
                        };
                        it.next()
                    };
                    let Some(word) = word else {
                        return;
                    };
                    let outcome = probe(&agent, &target, &word, timeout);
                    if tx.send(outcome).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);

        for outcome in rx {
            match &outcome {
                Outcome::Found(hit) | Outcome::Forbidden(hit) => hits.push(hit.clone()),
                _ => {}
            }
            on_outcome(&outcome);
        }
    });

    hits
}

fn probe(agent: &ureq::Agent, target: &Target, word: &str, timeout: Duration) -> Outcome {
    let url = match target {
        Target::Dirs { base_url } => format!("{}/{word}", base_url.trim_end_matches('/')),
        Target::Subdomains { domain } => format!("http://{word}.{domain}"),
        Target::Ports { host } => return probe_port(host, word, timeout),
    };

    let status = match agent.get(&url).call() {
        Ok(response) => response.status(),
        Err(ureq::Error::Status(code, _)) => code,
        Err(err) => {
            // For subdomains an unresolvable name is the common case, not an
            // incident worth reporting.
            if matches!(target, Target::Subdomains { .. }) {
                return Outcome::Miss {
                    candidate: word.to_string(),
                };
            }
            return Outcome::Error {
                candidate: word.to_string(),
                error: err.to_string(),
            };
        }
    };

    let hit = Hit {
        candidate: word.to_string(),
        url,
        status,
    };
    match status {
        200 => Outcome::Found(hit),
        403 => Outcome::Forbidden(hit),
        _ => {
            if matches!(target, Target::Subdomains { .. }) {
                // Any HTTP answer means the name resolves and something is
                // listening.
                Outcome::Found(hit)
            } else {
                Outcome::Miss {
                    candidate: word.to_string(),
                }
            }
        }
    }
}

/// Connect scan: an accepted TCP handshake marks the port open. Refused or
/// timed-out connections are ordinary misses; only a malformed candidate or
/// an unresolvable host is an error.
fn probe_port(host: &str, word: &str, timeout: Duration) -> Outcome {
    let Ok(port) = word.parse::<u16>() else {
        return Outcome::Error {
            candidate: word.to_string(),
            error: format!("puerto inválido: {word}"),
        };
    };

    let endpoint = format!("{host}:{port}");
    let addr = match endpoint.to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(err) => {
            return Outcome::Error {
                candidate: word.to_string(),
                error: format!("no se pudo resolver {host}: {err}"),
            };
        }
    };
    let Some(addr) = addr else {
        return Outcome::Error {
            candidate: word.to_string(),
            error: format!("no se pudo resolver {host}"),
        };
    };

    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(_) => Outcome::Found(Hit {
            candidate: word.to_string(),
            url: endpoint,
            status: port,
        }),
        Err(_) => Outcome::Miss {
            candidate: word.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    fn spawn_server(
        listener: TcpListener,
        connections: usize,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            for _ in 0..connections {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match path {
                    "/admin" => ("200 OK", "panel"),
                    "/backup" => ("403 Forbidden", "no"),
                    _ => ("404 Not Found", ""),
                };
                let mut stream = reader.into_inner();
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
            }
        })
    }

    #[test]
    fn dir_enumeration_reports_found_and_forbidden() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = spawn_server(listener, 4);

        let words: Vec<String> = ["admin", "backup", "cgi-bin", "uploads"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let target = Target::Dirs {
            base_url: format!("http://{addr}"),
        };

        let mut outcomes = Vec::new();
        let hits = run(&target, words, 2, Duration::from_secs(5), |o| {
            outcomes.push(o.clone())
        });

        assert_eq!(outcomes.len(), 4);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|h| h.candidate == "admin" && h.status == 200));
        assert!(hits.iter().any(|h| h.candidate == "backup" && h.status == 403));
        handle.join().expect("server thread");
    }

    #[test]
    fn port_scan_finds_only_the_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let open_port = listener.local_addr().expect("addr").port();
        // Bound then dropped so the second port is almost certainly closed.
        let closed_port = {
            let spare = TcpListener::bind("127.0.0.1:0").expect("bind");
            spare.local_addr().expect("addr").port()
        };
        let accept = std::thread::spawn(move || {
            let _ = listener.accept();
        });

        let target = Target::Ports {
            host: "127.0.0.1".to_string(),
        };
        let words = vec![open_port.to_string(), closed_port.to_string()];
        let hits = run(&target, words, 2, Duration::from_secs(2), |_| {});

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].candidate, open_port.to_string());
        assert_eq!(hits[0].url, format!("127.0.0.1:{open_port}"));
        accept.join().expect("accept thread");
    }

    #[test]
    fn port_ranges_expand_inclusively() {
        assert_eq!(
            expand_ports("22,80,8000-8002").expect("expand"),
            vec!["22", "80", "8000", "8001", "8002"]
        );
        assert!(expand_ports("80-22").is_err());
        assert!(expand_ports("0").is_err());
        assert!(expand_ports("abc").is_err());
    }

    #[test]
    fn wordlist_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "# común\nadmin\n\n  backup  \n").expect("write");
        let words = load_wordlist(&path).expect("wordlist");
        assert_eq!(words, vec!["admin".to_string(), "backup".to_string()]);
    }

    #[test]
    fn empty_wordlist_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vacío.txt");
        std::fs::write(&path, "# solo comentarios\n").expect("write");
        assert!(load_wordlist(&path).is_err());
    }
}
