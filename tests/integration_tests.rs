use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn vigil() -> Command {
    let mut cmd = Command::cargo_bin("vigil").expect("binary exists");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn ci_args<'a>(format: &'a str, rest: &[&'a str]) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        fixture("ci"),
        "-f".to_string(),
        format.to_string(),
        "--since-days".to_string(),
        "0".to_string(),
    ];
    args.extend(rest.iter().map(|s| s.to_string()));
    args
}

fn json_output(args: Vec<String>) -> serde_json::Value {
    let output = vigil().args(args).output().expect("run vigil");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ---------------------------------------------------------------------------
// CLI smoke tests
// ---------------------------------------------------------------------------

#[test]
fn test_help_output() {
    vigil()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scorecard"))
        .stdout(predicate::str::contains("impact"));
}

#[test]
fn test_version_output() {
    vigil()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vigil"));
}

#[test]
fn test_unknown_command_fails() {
    vigil().arg("frobnicate").assert().failure();
}

// ---------------------------------------------------------------------------
// Scorecard
// ---------------------------------------------------------------------------

#[test]
fn test_scorecard_json_lists_services() {
    let value = json_output(ci_args("json", &["scorecard"]));
    let services = value["services"].as_array().expect("services array");
    let names: Vec<&str> = services
        .iter()
        .filter_map(|s| s["service"].as_str())
        .collect();
    assert!(names.contains(&"User Service"));
    assert!(names.contains(&"Order Service"));
    assert!(names.contains(&"Unknown Service"));

    for card in services {
        let score = card["overall_score"].as_u64().expect("integer score");
        assert!((1..=10).contains(&score));
    }
    assert_eq!(
        value["summary"]["total_services"].as_u64(),
        Some(services.len() as u64)
    );
}

#[test]
fn test_scorecard_service_filter() {
    let value = json_output(ci_args("json", &["scorecard", "-s", "order service"]));
    let services = value["services"].as_array().expect("services array");
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["service"], "Order Service");
    assert_eq!(value["summary"]["total_services"], 1);
    assert_eq!(
        value["summary"]["average_score"].as_f64(),
        services[0]["overall_score"].as_f64()
    );
}

#[test]
fn test_since_days_beyond_calendar_range() {
    let mut args = ci_args("json", &["scorecard"]);
    args[5] = u32::MAX.to_string();
    let bounded = json_output(args);
    let unbounded = json_output(ci_args("json", &["scorecard"]));
    assert_eq!(
        bounded["summary"]["total_services"],
        unbounded["summary"]["total_services"]
    );
    let names = |v: &serde_json::Value| -> Vec<String> {
        v["services"]
            .as_array()
            .expect("services array")
            .iter()
            .filter_map(|s| s["service"].as_str().map(str::to_string))
            .collect()
    };
    let mut bounded_names = names(&bounded);
    let mut unbounded_names = names(&unbounded);
    bounded_names.sort();
    unbounded_names.sort();
    assert_eq!(bounded_names, unbounded_names);
}

#[test]
fn test_scorecard_text_output() {
    vigil()
        .args(ci_args("text", &["--no-color", "scorecard", "--no-penalty"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("Risk Level"))
        .stdout(predicate::str::contains("User Service"));
}

#[test]
fn test_scorecard_empty_data_sentinel() {
    vigil()
        .args(["-p", &fixture("empty"), "--no-color", "-f", "text", "scorecard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No service data available"));
}

#[test]
fn test_scorecard_markdown_output() {
    vigil()
        .args(ci_args("markdown", &["scorecard"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("# Services"));
}

#[test]
fn test_missing_data_files_fail() {
    let temp = TempDir::new().unwrap();
    vigil()
        .args(["-p", temp.path().to_str().unwrap(), "scorecard"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("test_run.json"));
}

// ---------------------------------------------------------------------------
// Anomalies and quality
// ---------------------------------------------------------------------------

#[test]
fn test_anomalies_per_test_case() {
    let value = json_output(ci_args("json", &["anomalies"]));
    assert_eq!(value["granularity"], "test_case");
    let anomalies = value["anomalies"].as_array().expect("anomalies array");
    let subjects: Vec<&str> = anomalies
        .iter()
        .filter_map(|a| a["subject"].as_str())
        .collect();
    assert!(subjects.contains(&"login"));
    assert!(subjects.contains(&"checkout"));
}

#[test]
fn test_anomalies_limit() {
    let value = json_output(ci_args("json", &["anomalies", "-n", "1"]));
    assert_eq!(value["anomalies"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_anomalies_global_granularity() {
    let value = json_output(ci_args("json", &["anomalies", "-g", "global"]));
    assert_eq!(value["granularity"], "global");
}

#[test]
fn test_quality_json() {
    let value = json_output(ci_args("json", &["quality"]));
    assert_eq!(value["metrics"]["total"].as_u64(), Some(12));
    assert_eq!(value["metrics"]["security"].as_u64(), Some(5));
    assert!(value["quality_score"].as_f64().is_some());
}

// ---------------------------------------------------------------------------
// Impact and registry
// ---------------------------------------------------------------------------

#[test]
fn test_impact_from_change_file() {
    let value = json_output(ci_args(
        "json",
        &[
            "impact",
            "--change",
            &fixture("change.json"),
            "--registry",
            &fixture("services.toml"),
        ],
    ));
    let score = value["impact_score"].as_f64().unwrap();
    assert!((score - 3.0).abs() < 1e-9);
    assert_eq!(value["risk_level"], "LOW");
    let radius: Vec<&str> = value["blast_radius"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["service"].as_str())
        .collect();
    assert_eq!(radius, vec!["notification-service", "payment-service"]);
}

#[test]
fn test_impact_inline_flags() {
    let value = json_output(ci_args(
        "json",
        &[
            "impact",
            "-s",
            "gateway-service",
            "--lines-added",
            "400",
            "--lines-deleted",
            "100",
            "--files-changed",
            "10",
            "--api-endpoint",
            "/api/v1/route",
            "-r",
            &fixture("services.toml"),
        ],
    ));
    let score = value["impact_score"].as_f64().unwrap();
    assert!((score - 8.3).abs() < 1e-9);
    assert_eq!(value["blast_radius"].as_array().map(Vec::len), Some(5));
}

#[test]
fn test_impact_registry_from_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("vigil.toml");
    std::fs::write(
        &config,
        format!(
            "[impact]\nregistry = \"{}\"\n",
            fixture("services.toml").replace('\\', "/")
        ),
    )
    .unwrap();

    let value = json_output(ci_args(
        "json",
        &[
            "-c",
            config.to_str().unwrap(),
            "impact",
            "--change",
            &fixture("change.json"),
        ],
    ));
    assert_eq!(value["blast_radius"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_impact_missing_change_file() {
    vigil()
        .args(ci_args("json", &["impact", "--change", "/nonexistent/change.json"]))
        .assert()
        .failure()
        .stderr(predicate::str::contains("change descriptor"));
}

#[test]
fn test_registry_overview() {
    let value = json_output(vec![
        "-f".to_string(),
        "json".to_string(),
        "registry".to_string(),
        "-r".to_string(),
        fixture("services.toml"),
    ]);
    assert_eq!(value["total_services"].as_u64(), Some(5));
    let gateway = value["services"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["service"] == "gateway-service")
        .expect("gateway listed");
    assert_eq!(gateway["criticality"], "CRITICAL");
    assert_eq!(gateway["dependency_depth"].as_u64(), Some(2));
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_missing_config_file_fails() {
    vigil()
        .args(["-c", "/nonexistent/vigil.toml", "quality"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_config_output_format_default() {
    let temp = TempDir::new().unwrap();
    std::fs::copy(
        fixture("ci/test_run.json"),
        temp.path().join("test_run.json"),
    )
    .unwrap();
    std::fs::copy(
        fixture("ci/test_result.json"),
        temp.path().join("test_result.json"),
    )
    .unwrap();
    std::fs::write(
        temp.path().join("vigil.toml"),
        "[output]\nformat = \"json\"\n\n[source]\nsince_days = 0\n",
    )
    .unwrap();

    let output = vigil()
        .args(["-p", temp.path().to_str().unwrap(), "quality"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["success_rate"].as_f64().is_some());
}
