use std::process::Command;

fn centinela() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_centinela"));
    // Isolated home so runs neither read the developer's config nor litter
    // their log directory.
    let home = std::env::temp_dir().join(format!("centinela-it-{}", std::process::id()));
    let _ = std::fs::create_dir_all(&home);
    cmd.env("HOME", home);
    cmd.env_remove("SUDO_UID");
    cmd.env_remove("SUDO_GID");
    cmd.env_remove("CENTINELA_CONFIG");
    cmd
}

#[test]
fn config_show_exits_zero() {
    let output = centinela()
        .args(["config", "--show"])
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("suspicious_extensions"));
}

#[test]
fn missing_input_file_exits_one() {
    let output = centinela()
        .args(["logs", "/definitivamente/no/existe.log"])
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
}

#[test]
fn fs_analysis_writes_a_report_and_exits_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(".svc.exe"), b"mz").expect("write");
    let report_path = dir.path().join("reporte.json");

    let output = centinela()
        .args([
            "--quiet",
            "--output",
            &report_path.display().to_string(),
            "fs",
            &dir.path().display().to_string(),
        ])
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let raw = std::fs::read(&report_path).expect("report written");
    let v: serde_json::Value = serde_json::from_slice(&raw).expect("report parses");
    assert_eq!(v.get("kind").and_then(|s| s.as_str()), Some("fs"));
    let risk = v
        .pointer("/resultados/risk_score")
        .and_then(|n| n.as_u64())
        .expect("risk present");
    assert!(risk > 0);
    assert!(risk <= 100);
}

#[test]
fn json_flag_prints_the_report_to_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("carta.txt"), b"Subject: hola\n\nnada\n").expect("write");
    let report_path = dir.path().join("reporte.json");

    let output = centinela()
        .args([
            "--json",
            "--output",
            &report_path.display().to_string(),
            "email",
            &dir.path().join("carta.txt").display().to_string(),
        ])
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(v.get("kind").and_then(|s| s.as_str()), Some("email"));
    assert!(v.get("fecha_analisis").is_some());
}
