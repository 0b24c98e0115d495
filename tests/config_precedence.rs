use std::process::Command;

use centinela::config;

#[test]
fn file_values_override_the_defaults() {
    let home = tempfile::tempdir().expect("tempdir");
    let dir = home.path().join(".config/centinela");
    std::fs::create_dir_all(&dir).expect("config dir");
    std::fs::write(
        dir.join("config.toml"),
        r#"
[rules]
url_max_length = 60
risky_modes = ["777"]

[http]
workers = 4

[weights]
default_weight = 7
"#,
    )
    .expect("write config");

    let cfg = config::load(None, home.path()).expect("load");
    assert_eq!(cfg.rules.url_max_length, 60);
    assert_eq!(cfg.rules.risky_modes, vec!["777".to_string()]);
    assert_eq!(cfg.http.workers, 4);
    assert_eq!(cfg.weights.default_weight, 7);
    // Untouched sections keep their defaults.
    assert_eq!(cfg.http.timeout_secs, 5);
    assert!(!cfg.rules.suspicious_extensions.is_empty());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let home = tempfile::tempdir().expect("tempdir");
    let cfg = config::load(None, home.path()).expect("load");
    assert_eq!(cfg.http.workers, 10);
    assert_eq!(cfg.pwned.api_url, "https://api.pwnedpasswords.com");
    assert!(cfg.config_path.is_none());
}

#[test]
fn malformed_toml_is_rejected() {
    let home = tempfile::tempdir().expect("tempdir");
    let path = home.path().join("rota.toml");
    std::fs::write(&path, "[rules\nurl_max_length = 60").expect("write config");
    assert!(config::load(Some(&path), home.path()).is_err());
}

#[test]
fn environment_overrides_the_file() {
    let home = tempfile::tempdir().expect("tempdir");
    let dir = home.path().join(".config/centinela");
    std::fs::create_dir_all(&dir).expect("config dir");
    std::fs::write(dir.join("config.toml"), "[http]\nworkers = 4\n").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_centinela"))
        .env("HOME", home.path())
        .env_remove("SUDO_UID")
        .env_remove("SUDO_GID")
        .env_remove("CENTINELA_CONFIG")
        .env("CENTINELA_HTTP_WORKERS", "3")
        .args(["--json", "config", "--show"])
        .output()
        .expect("run binary");
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(v.pointer("/http/workers").and_then(|n| n.as_u64()), Some(3));
}
