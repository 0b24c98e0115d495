use std::time::Duration;

use crate::core::Observation;
use crate::logs::RunLog;
use crate::platform;

#[cfg(not(windows))]
const LOGIN_DEFS: &str = "/etc/login.defs";

/// Local hardening posture: password policy, administrative group size and
/// enabled services. Every source is independent and fails open, so a host
/// without systemd still gets a policy audit.
#[cfg(not(windows))]
pub fn collect(timeout: Duration, log: &mut RunLog) -> Vec<Observation> {
    let mut observations = Vec::new();

    match std::fs::read_to_string(LOGIN_DEFS) {
        Ok(raw) => observations.push(parse_login_defs(&raw)),
        Err(err) => log.warning(format!("no se pudo leer {LOGIN_DEFS}: {err}")),
    }

    // Debian-style hosts use `sudo`, Fedora-style use `wheel`.
    let mut admin_group = None;
    for group in ["sudo", "wheel"] {
        match platform::run_command("getent", &["group", group], timeout) {
            Ok(out) if out.exit_code == 0 => {
                admin_group = parse_getent_group(&out.stdout);
                if admin_group.is_some() {
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => log.warning(format!("no se pudo consultar el grupo {group}: {err}")),
        }
    }
    match admin_group {
        Some(obs) => observations.push(obs),
        None => log.warning("ningún grupo administrativo observado (sudo, wheel)".to_string()),
    }

    match platform::run_command(
        "systemctl",
        &["list-unit-files", "--type=service", "--state=enabled", "--no-legend"],
        timeout,
    ) {
        Ok(out) if out.exit_code == 0 => observations.extend(parse_systemctl_units(&out.stdout)),
        Ok(out) => log.warning(format!(
            "systemctl terminó con código {}",
            out.exit_code
        )),
        Err(err) => log.warning(format!("no se pudo listar los servicios: {err}")),
    }

    observations
}

#[cfg(windows)]
pub fn collect(timeout: Duration, log: &mut RunLog) -> Vec<Observation> {
    let mut observations = Vec::new();

    match platform::run_command("net", &["accounts"], timeout) {
        Ok(out) if out.exit_code == 0 => observations.push(parse_net_accounts(&out.stdout)),
        Ok(out) => log.warning(format!(
            "net accounts terminó con código {}",
            out.exit_code
        )),
        Err(err) => log.warning(format!("no se pudo consultar la política local: {err}")),
    }

    match platform::run_command("sc", &["query", "type=", "service", "state=", "all"], timeout) {
        Ok(out) if out.exit_code == 0 => observations.extend(parse_sc_query(&out.stdout)),
        Ok(out) => log.warning(format!("sc query terminó con código {}", out.exit_code)),
        Err(err) => log.warning(format!("no se pudo listar los servicios: {err}")),
    }

    observations
}

/// Password policy from login.defs. Commented and malformed lines are
/// ignored; only numeric values are observed.
pub fn parse_login_defs(raw: &str) -> Observation {
    let mut obs = Observation::new("login.defs");
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };
        match key {
            "PASS_MIN_LEN" => obs = obs.with("pass_min_len", value),
            "PASS_MAX_DAYS" => obs = obs.with("pass_max_days", value),
            "PASS_MIN_DAYS" => obs = obs.with("pass_min_days", value),
            _ => {}
        }
    }
    obs
}

/// `getent group NAME` output: `name:x:gid:member,member,...`.
pub fn parse_getent_group(raw: &str) -> Option<Observation> {
    let line = raw.lines().next()?.trim();
    let mut parts = line.split(':');
    let name = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let members: Vec<&str> = parts
        .nth(2)
        .map(|m| m.split(',').filter(|s| !s.trim().is_empty()).collect())
        .unwrap_or_default();

    Some(
        Observation::new(format!("group:{name}"))
            .with("group", name.to_string())
            .with("member_count", members.len() as u64),
    )
}

/// `systemctl list-unit-files --state=enabled` lines: `NAME.service enabled`.
pub fn parse_systemctl_units(raw: &str) -> Vec<Observation> {
    raw.lines()
        .filter_map(|line| {
            let unit = line.split_whitespace().next()?;
            let service = unit.strip_suffix(".service")?;
            if service.is_empty() {
                return None;
            }
            Some(
                Observation::new(format!("service:{service}"))
                    .with("service", service.to_string()),
            )
        })
        .collect()
}

/// `net accounts` output: `Minimum password length:   7` style rows, with
/// localized labels left untranslated on Spanish systems, so matching keys
/// off the numeric tail keeps both working.
pub fn parse_net_accounts(raw: &str) -> Observation {
    let mut obs = Observation::new("net accounts");
    for line in raw.lines() {
        let lower = line.to_lowercase();
        let value = line
            .rsplit(|c: char| c == ':' || c.is_whitespace())
            .find(|s| !s.is_empty())
            .and_then(|s| s.parse::<u64>().ok());
        let Some(value) = value else {
            continue;
        };
        if lower.contains("minimum password length") || lower.contains("longitud mínima") {
            obs = obs.with("pass_min_len", value);
        } else if lower.contains("maximum password age") || lower.contains("vigencia máxima") {
            obs = obs.with("pass_max_days", value);
        }
    }
    obs
}

/// `sc query` output: `SERVICE_NAME: Telnet` blocks.
pub fn parse_sc_query(raw: &str) -> Vec<Observation> {
    raw.lines()
        .filter_map(|line| {
            let name = line.trim().strip_prefix("SERVICE_NAME:")?.trim();
            if name.is_empty() {
                return None;
            }
            Some(
                Observation::new(format!("service:{name}"))
                    .with("service", name.to_lowercase()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_defs_numeric_policies_are_observed() {
        let raw = "\
# PASS_MIN_LEN comentado arriba
PASS_MAX_DAYS\t99999
PASS_MIN_DAYS\t0
PASS_MIN_LEN\t5
UMASK\t022
ENCRYPT_METHOD SHA512
";
        let obs = parse_login_defs(raw);
        assert_eq!(obs.num_field("pass_min_len"), Some(5.0));
        assert_eq!(obs.num_field("pass_max_days"), Some(99999.0));
        assert_eq!(obs.str_field("encrypt_method"), None);
    }

    #[test]
    fn getent_group_counts_members() {
        let obs = parse_getent_group("sudo:x:27:ana,luis,mateo\n").expect("observation");
        assert_eq!(obs.str_field("group"), Some("sudo"));
        assert_eq!(obs.num_field("member_count"), Some(3.0));
    }

    #[test]
    fn getent_group_with_no_members_counts_zero() {
        let obs = parse_getent_group("sudo:x:27:\n").expect("observation");
        assert_eq!(obs.num_field("member_count"), Some(0.0));
    }

    #[test]
    fn systemctl_units_strip_the_service_suffix() {
        let raw = "\
telnet.service      enabled  enabled
sshd.service        enabled  enabled
cron.timer          enabled  enabled
";
        let obs = parse_systemctl_units(raw);
        let services: Vec<&str> = obs.iter().filter_map(|o| o.str_field("service")).collect();
        assert_eq!(services, vec!["telnet", "sshd"]);
    }

    #[test]
    fn net_accounts_reads_the_numeric_policies() {
        let raw = "\
Force user logoff how long after time expires?:       Never
Minimum password age (days):                          0
Maximum password age (days):                          42
Minimum password length:                              7
";
        let obs = parse_net_accounts(raw);
        assert_eq!(obs.num_field("pass_min_len"), Some(7.0));
        assert_eq!(obs.num_field("pass_max_days"), Some(42.0));
    }

    #[test]
    fn sc_query_lists_service_names() {
        let raw = "\
SERVICE_NAME: Telnet
DISPLAY_NAME: Telnet
        TYPE               : 20  WIN32_SHARE_PROCESS
        STATE              : 4  RUNNING

SERVICE_NAME: wuauserv
";
        let obs = parse_sc_query(raw);
        let services: Vec<&str> = obs.iter().filter_map(|o| o.str_field("service")).collect();
        assert_eq!(services, vec!["telnet", "wuauserv"]);
    }
}
