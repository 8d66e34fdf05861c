use assert_cmd::Command;
use predicates::str::contains;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const PRIMARY: &str = "https://proxy.opinion.trade:8443/api/bsc/api/v2/topic/multi";

#[allow(deprecated)]
fn cli() -> Command {
    Command::cargo_bin("topic-helper").expect("binary")
}

fn run_json(args: &[&str]) -> Value {
    let output = cli().arg("--quiet").args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

fn badge_texts(output: &Value) -> Vec<String> {
    output["report"]["badges"]
        .as_array()
        .expect("badges array")
        .iter()
        .map(|badge| badge["text"].as_str().expect("text").to_string())
        .collect()
}

#[test]
fn demo_single_topic_skips_hidden_heading() {
    let output = run_json(&["replay", demo("single_topic.json").to_str().unwrap()]);
    assert_eq!(badge_texts(&output), vec!["TopicID: 42"]);
    assert_eq!(output["report"]["badges"][0]["target_text"], "Election Outcome");
    assert_eq!(output["report"]["enabled"], true);
}

#[test]
fn demo_navigation_ends_on_single_topic() {
    let output = run_json(&[
        "replay",
        demo("multi_topic_navigation.json").to_str().unwrap(),
    ]);
    assert_eq!(badge_texts(&output), vec!["TopicID: 7"]);
    assert_eq!(output["report"]["context"]["topic_id"], "7");
    assert_eq!(output["stats"]["navigations"], 1);
}

#[test]
fn external_fixtures_feed_multi_topic_lookup() {
    let temp = tempdir().unwrap();
    let scenario = temp.path().join("scenario.json");
    let fixtures = temp.path().join("fixtures.json");
    fs::write(
        &scenario,
        json!({
            "url": "https://app.opinion.trade/detail?topicId=9&type=MULTI",
            "body": [
                { "tag": "p", "classes": ["text-bodyL"], "text": "Yes" },
                { "tag": "p", "classes": ["text-bodyL"], "text": " No " }
            ]
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        &fixtures,
        json!({
            format!("{PRIMARY}/9"): {
                "result": { "data": { "childList": [
                    { "title": "Yes", "topicId": 91 },
                    { "title": "No", "topicId": 92 }
                ]}}
            }
        })
        .to_string(),
    )
    .unwrap();

    let output = run_json(&[
        "replay",
        scenario.to_str().unwrap(),
        "--lookup-fixtures",
        fixtures.to_str().unwrap(),
    ]);
    assert_eq!(badge_texts(&output), vec!["(topicID: 91)", "(topicID: 92)"]);
    assert_eq!(output["stats"]["lookups_started"], 1);
}

#[test]
fn url_context_prints_parsed_location() {
    let output = run_json(&[
        "url-context",
        "https://app.opinion.trade/detail?type=Multi&topicId=%2015%20",
    ]);
    assert_eq!(output, json!({ "topic_id": "15", "is_multi": true }));
}

#[test]
fn url_context_honours_config_file() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("topic-helper.toml");
    fs::write(&config, "[query]\ntopic_param = \"id\"\n").unwrap();

    let output = run_json(&[
        "--config",
        config.to_str().unwrap(),
        "url-context",
        "https://example.com/t?id=3&topicId=4",
    ]);
    assert_eq!(output["topic_id"], "3");
}

#[test]
fn schema_lists_scenario_and_report() {
    let output = run_json(&["schema"]);
    assert!(output["scenario"].is_object());
    assert!(output["report"].is_object());
}

#[test]
fn broken_scenario_reports_failing_step() {
    let temp = tempdir().unwrap();
    let scenario = temp.path().join("scenario.json");
    fs::write(
        &scenario,
        json!({
            "url": "https://app.opinion.trade/detail?topicId=1",
            "steps": [{ "action": "back" }]
        })
        .to_string(),
    )
    .unwrap();

    cli()
        .arg("replay")
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(contains("step 1 (back)"));
}
