use centinela::config::EffectiveConfig;
use centinela::core::{Observation, Report};
use centinela::report;

fn golden() -> serde_json::Value {
    let raw = include_str!("golden/report.json");
    serde_json::from_str(raw).expect("golden report parses")
}

fn sample_report() -> Report {
    let cfg = EffectiveConfig::default();
    let observations = vec![
        Observation::new("/srv/datos/.svc.exe")
            .with("name", ".svc.exe")
            .with("extension", ".exe")
            .with("mode", "777")
            .with("hidden", true),
        Observation::new("/srv/datos/notas.txt")
            .with("name", "notas.txt")
            .with("extension", ".txt")
            .with("mode", "644")
            .with("hidden", false),
    ];
    let findings = cfg.filesystem_rules().classify_all(observations);
    let mut report = report::build("fs", "/srv/datos", findings, &cfg.weight_table(), vec![]);
    report.analyzed_at = "2026-01-10T03:14:15Z".to_string();
    report.tool_version = "0.1.0".to_string();
    report
}

#[test]
fn filesystem_report_matches_the_golden_file() {
    let value = serde_json::to_value(sample_report()).expect("serialize");
    assert_eq!(value, golden());
}

#[test]
fn golden_report_round_trips() {
    let report: Report = serde_json::from_value(golden()).expect("deserialize");
    assert_eq!(report.results.risk_score, 30);
    assert_eq!(report.results.summary.flagged_findings, 1);

    let again = serde_json::to_value(&report).expect("serialize");
    assert_eq!(again, golden());
}
