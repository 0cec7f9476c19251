#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    write(dir, name, &value.to_string())
}

fn forumql() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("forumql");
    cmd.env_remove("FORUMQL_CONFIG").env("RUST_LOG", "off");
    cmd
}

fn seed(dir: &Path) -> (PathBuf, PathBuf) {
    let data = write_json(
        dir,
        "data.json",
        &json!({
            "Post": [
                {"id": 1, "title": "x", "votes": 20},
                {"id": 2, "title": "x", "votes": 5},
                {"id": 3, "title": "x", "votes": 15},
                {"id": 4, "title": "y", "votes": 30},
                {"id": 5, "title": "z", "votes": 1}
            ]
        }),
    );
    let request = write_json(
        dir,
        "request.json",
        &json!({
            "startIndex": 0,
            "count": 10,
            "filter": {
                "operator": "And",
                "operands": [
                    {"operator": "Equal", "property": "title", "value": "x"},
                    {"operator": "GreaterThan", "property": "votes", "value": "10"}
                ]
            },
            "sorts": [{"property": "votes", "mode": "Desc"}]
        }),
    );
    (data, request)
}

#[test]
fn validate_accepts_well_formed_filter() {
    let dir = TempDir::new().expect("tempdir");
    let filter = write_json(
        dir.path(),
        "filter.json",
        &json!({"operator": "In", "property": "id", "values": ["1", "2"]}),
    );
    let output = forumql()
        .args(["--format", "json", "validate"])
        .arg(&filter)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["valid"], Value::Bool(true));
}

#[test]
fn validate_reports_structural_errors_with_code() {
    let dir = TempDir::new().expect("tempdir");
    let filter = write_json(
        dir.path(),
        "filter.json",
        &json!({"operator": "Or", "operands": [
            {"operator": "Equal", "property": "title", "value": "x"}
        ]}),
    );
    let output = forumql().arg("validate").arg(&filter).assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("error[Validation]"), "{stderr}");
}

#[test]
fn validate_reports_malformed_json() {
    let dir = TempDir::new().expect("tempdir");
    let filter = write(dir.path(), "filter.json", r#"{"operator": "Like", "property": "t", "value": "x"}"#);
    let output = forumql().arg("validate").arg(&filter).assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("error[MalformedExpression]"), "{stderr}");
}

#[test]
fn search_prints_items_and_total_as_json() {
    let dir = TempDir::new().expect("tempdir");
    let (data, request) = seed(dir.path());
    let output = forumql()
        .args(["--format", "json", "search", "--entity", "Post"])
        .arg("--request")
        .arg(&request)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["totalCount"], json!(2));
    let ids: Vec<_> = json["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(1), json!(3)]);
}

#[test]
fn search_without_total_omits_count() {
    let dir = TempDir::new().expect("tempdir");
    let (data, request) = seed(dir.path());
    let output = forumql()
        .args(["--format", "json", "search", "--entity", "Post", "--no-total"])
        .arg("--request")
        .arg(&request)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["totalCount"], Value::Null);
    assert_eq!(json["items"].as_array().map(Vec::len), Some(2));
}

#[test]
fn explain_prints_joins_and_order() {
    let dir = TempDir::new().expect("tempdir");
    let request = write_json(
        dir.path(),
        "request.json",
        &json!({
            "count": 5,
            "filter": {"operator": "Equal", "property": "members.username", "value": "alice"},
            "sorts": [{"property": "name"}]
        }),
    );
    let output = forumql()
        .args(["explain", "--entity", "Community", "--request"])
        .arg(&request)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("LEFT JOIN User j0"), "{text}");
    assert!(text.contains("ORDER BY root.name ASC"), "{text}");
}

#[test]
fn config_file_limits_page_size() {
    let dir = TempDir::new().expect("tempdir");
    let (data, request) = seed(dir.path());
    let config = write(dir.path(), "search.toml", "max_page_size = 3\n");
    let output = forumql()
        .arg("--config")
        .arg(&config)
        .args(["search", "--entity", "Post", "--request"])
        .arg(&request)
        .arg("--data")
        .arg(&data)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("error[Validation]"), "{stderr}");
}

#[test]
fn custom_schema_from_toml_is_used() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write(
        dir.path(),
        "schema.toml",
        r#"
[entities.Product]
id = "integer"
name = "string"
price = "decimal"
"#,
    );
    let data = write_json(
        dir.path(),
        "data.json",
        &json!({"Product": [
            {"id": 1, "name": "pen", "price": "1.50"},
            {"id": 2, "name": "book", "price": "12.00"}
        ]}),
    );
    let request = write_json(
        dir.path(),
        "request.json",
        &json!({
            "count": 10,
            "filter": {"operator": "Between", "property": "price", "start": "1", "end": "2"}
        }),
    );
    let output = forumql()
        .args(["--format", "json", "search", "--entity", "Product", "--schema"])
        .arg(&schema)
        .arg("--request")
        .arg(&request)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["totalCount"], json!(1));
    assert_eq!(json["items"][0]["name"], json!("pen"));
}
