mod common;

use classweave::formatters::JsonCompactFormatter;
use classweave::parsers::AnnotationRecord;
use classweave::{ClasspathScanner, ScanConfig, ScanResult};
use common::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn sample_result(temp: &TempDir) -> ScanResult {
    let dir = temp.path().join("classes");
    fs::create_dir_all(&dir).unwrap();
    write_classes(
        &dir,
        &[
            interface("j.Api"),
            class("j.Impl")
                .with_interface("j.Api")
                .with_annotation(AnnotationRecord::new("j.Marker"))
                .with_field(field("count", "I", PRIVATE))
                .with_method(method("run", "(Lj/Api;)V", PUBLIC)),
        ],
    );
    ClasspathScanner::new(ScanConfig::default())
        .scan_paths(&[dir, temp.path().join("missing")])
        .unwrap()
}

#[test]
fn test_compact_output_structure() {
    let temp = TempDir::new().unwrap();
    let result = sample_result(&temp);
    let value = JsonCompactFormatter::new().to_value(&result);

    assert_eq!(value["meta"]["classes"], 2);
    assert_eq!(value["meta"]["roots"], 1);
    assert_eq!(value["meta"]["format"], "compact");
    assert_eq!(value["meta"]["completion"], "complete");

    let classes = value["classes"].as_array().unwrap();
    assert_eq!(classes[0]["n"], "j.Api");
    assert_eq!(classes[0]["t"], 1);
    assert_eq!(classes[1]["n"], "j.Impl");
    assert_eq!(classes[1]["t"], 0);
    assert_eq!(classes[1]["v"], 0);
    assert!(classes[1].get("f").is_none());

    // Impl implements Api and takes it as a method parameter.
    let edges = value["edges"].as_array().unwrap();
    assert!(edges.contains(&serde_json::json!([1, 0, 1])));
    assert!(edges.contains(&serde_json::json!([1, 0, 4])));

    let dangling = value["dangling"].as_array().unwrap();
    assert!(dangling
        .iter()
        .any(|d| d[1] == "j.Marker" && d[2] == 2));

    let diagnostics = value["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["k"], "PathNotFound");
}

#[test]
fn test_full_output_includes_members() {
    let temp = TempDir::new().unwrap();
    let result = sample_result(&temp);
    let value = JsonCompactFormatter::full().to_value(&result);

    assert_eq!(value["meta"]["format"], "full");
    let class = &value["classes"][1];
    assert_eq!(class["ifs"], serde_json::json!(["j.Api"]));
    assert_eq!(class["ann"], serde_json::json!(["j.Marker"]));
    assert_eq!(class["f"], serde_json::json!([["count", "I", 3]]));
    assert_eq!(class["m"], serde_json::json!([["run", "(Lj/Api;)V", 0]]));
    assert!(class["loc"].as_str().unwrap().ends_with("Impl.class"));

    let edges = value["edges"].as_array().unwrap();
    let param = edges
        .iter()
        .find(|e| e["type"] == "method_param_type")
        .unwrap();
    assert_eq!(param["at"], "method:run(Lj/Api;)V");
    assert_eq!(param["sub"], true);
}

#[test]
fn test_format_to_file() {
    let temp = TempDir::new().unwrap();
    let result = sample_result(&temp);
    let output = temp.path().join("graph.json");

    JsonCompactFormatter::default()
        .format_to_file(&result, &output)
        .unwrap();

    let written: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, JsonCompactFormatter::new().to_value(&result));
}
