use std::process::Command;

use serde_json::Value;

fn waypoint() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_waypoint"));
    command
        .env_remove("WAYPOINT_OPENAI_API_KEY")
        .env_remove("WAYPOINT_DATABASE_URL")
        .env_remove("WAYPOINT_GAZETTEER_PATH")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn plan_prints_only_route_json_on_stdout() {
    // no credential: the planner logs a fatal failure and serves the fallback
    let output = waypoint()
        .args([
            "--max-attempts",
            "1",
            "plan",
            "--hub",
            "kutaisi",
            "--tags",
            "nature",
            "--date",
            "2026-10-20",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let route: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        route["stops"],
        serde_json::json!(["Kutaisi", "Prometheus Cave", "Martvili Canyon", "Kutaisi"])
    );

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("route planned"));
}

#[test]
fn plan_without_preferences_fails_with_message() {
    let output = waypoint()
        .args(["plan", "--hub", "batumi", "--date", "2026-10-20"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Pick at least one interest"));
}
