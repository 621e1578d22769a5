//! End-to-end tests driving the tripchain binary with a scripted LM command.
//!
//! The LM is a shell script that swallows the prompt and prints a canned
//! payload, so every completion in the chain returns the same text. That is
//! enough to exercise configuration, the pipelines, extraction, and the
//! validation gate through the real binary.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const CITY_JSON: &str = r#"{
    "recommended_city": [{
        "name": "Valencia",
        "country": "Spain",
        "description": "Coastal city with beaches and a historic centre",
        "match_score": 0.9,
        "highlights": ["City of Arts", "Malvarosa Beach"],
        "estimated_cost": {
            "accommodation": 90,
            "food": 40,
            "activities": 30,
            "total_per_day": 160
        }
    }]
}"#;

fn scripted_lm(dir: &TempDir, payload: &str) -> PathBuf {
    let path = dir.path().join("lm.sh");
    let script = format!("#!/bin/sh\ncat >/dev/null\ncat <<'EOF'\n{payload}\nEOF\n");
    fs::write(&path, script).expect("write lm script");
    let mut perms = fs::metadata(&path).expect("stat lm script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod lm script");
    path
}

fn recommend_cmd(lm: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tripchain"));
    cmd.args([
        "recommend",
        "--preferences",
        "beaches,culture",
        "--budget",
        "160",
        "--duration",
        "5",
        "--season",
        "summer",
        "--no-tools",
        "--lm",
    ]);
    cmd.arg(lm);
    cmd
}

#[test]
fn recommend_renders_a_validated_city() {
    let dir = TempDir::new().expect("temp dir");
    let lm = scripted_lm(&dir, CITY_JSON);

    let output = recommend_cmd(&lm).output().expect("run tripchain");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Valencia"), "got: {stdout}");
    assert!(stdout.contains("Spain"), "got: {stdout}");
}

#[test]
fn recommend_json_output_carries_the_gate_verdict() {
    let dir = TempDir::new().expect("temp dir");
    // Fenced output with trailing junk still extracts and validates.
    let lm = scripted_lm(&dir, &format!("```json\n{CITY_JSON}\n```\nundefined"));

    let output = recommend_cmd(&lm).arg("--json").output().expect("run tripchain");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(parsed["validation"]["is_valid"], true);
    assert_eq!(parsed["artifact"]["kind"], "value");
    assert_eq!(
        parsed["artifact"]["value"]["recommended_city"][0]["name"],
        "Valencia"
    );
    assert_eq!(parsed["steps"][0]["status"], "completed");
}

#[test]
fn incomplete_artifact_fails_the_gate_and_exits_nonzero() {
    let dir = TempDir::new().expect("temp dir");
    let lm = scripted_lm(&dir, r#"{"recommended_city": [{"name": "Valencia"}]}"#);

    let output = recommend_cmd(&lm).output().expect("run tripchain");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing required fields"), "got: {stderr}");
    assert!(stderr.contains("match_score"), "got: {stderr}");
}

#[test]
fn guardrail_rejects_a_zero_budget_before_any_completion() {
    let output = Command::new(env!("CARGO_BIN_EXE_tripchain"))
        .args([
            "recommend",
            "--preferences",
            "beaches",
            "--budget",
            "0",
            "--duration",
            "5",
            "--season",
            "summer",
            "--lm",
            "false",
        ])
        .output()
        .expect("run tripchain");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("budget"), "got: {stderr}");
}

#[test]
fn plan_pipeline_validates_budget_sums_end_to_end() {
    let dir = TempDir::new().expect("temp dir");
    let plan = r#"{
        "itinerary": [{
            "activities": [{"activity": "Beach", "description": "Morning swim",
                            "location": "Malvarosa", "duration": "3 hours", "cost": 0}],
            "meals": [{"type": "Lunch", "suggestion": "Paella at La Pepica", "cost": 25}]
        }],
        "budget_breakdown": {
            "accommodation": 450,
            "food": 200,
            "activities": 150,
            "transportation": 100,
            "total": 1000
        },
        "recommendations": ["Book trains early"]
    }"#;
    let lm = scripted_lm(&dir, plan);

    let output = Command::new(env!("CARGO_BIN_EXE_tripchain"))
        .args([
            "plan",
            "--destination",
            "Valencia",
            "--start-date",
            "2026-09-10",
            "--end-date",
            "2026-09-15",
            "--activities",
            "beaches",
            "--no-tools",
        ])
        .arg("--lm")
        .arg(lm)
        .output()
        .expect("run tripchain");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Budget: total 1000"), "got: {stdout}");
}

#[test]
fn plan_rejects_reversed_dates_up_front() {
    let output = Command::new(env!("CARGO_BIN_EXE_tripchain"))
        .args([
            "plan",
            "--destination",
            "Valencia",
            "--start-date",
            "2026-09-15",
            "--end-date",
            "2026-09-10",
            "--lm",
            "false",
        ])
        .output()
        .expect("run tripchain");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("earlier than"), "got: {stderr}");
}

#[test]
fn tools_lists_the_lookup_roster() {
    let output = Command::new(env!("CARGO_BIN_EXE_tripchain"))
        .args(["tools", "--json"])
        .output()
        .expect("run tripchain");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let names: Vec<&str> = parsed
        .as_array()
        .expect("array of tools")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    for name in ["search_internet", "weather_forecast", "local_events", "safety_info"] {
        assert!(names.contains(&name), "missing {name} in {names:?}");
    }
}
