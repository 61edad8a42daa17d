//! Integration tests for configuration loading

use codegrade::config::{GraderConfig, HintConfig};
use codegrade::hints::HintGenerator;
use codegrade::{Error, TestResult, TestRunner};
use pretty_assertions::assert_eq;
use std::io::Write;

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"{
            "runner": { "timeout_ms": 150, "max_call_depth": 50 },
            "hints": { "max_level": 2, "docs_base_url": "https://docs.example.org/" }
        }"#,
    );
    let config = GraderConfig::from_file(file.path()).unwrap();
    assert_eq!(config.runner.timeout_ms, 150);
    assert_eq!(config.runner.max_call_depth, 50);
    assert_eq!(config.runner.max_log_entries, 1000);
    assert_eq!(config.hints.max_level, 2);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GraderConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::IoError { .. }));
}

#[test]
fn test_invalid_file_is_config_error() {
    let file = write_config(r#"{ "runner": { "timeout_ms": "soon" } }"#);
    let err = GraderConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
    assert!(err.to_string().starts_with("ConfigError: invalid configuration"));
}

#[test]
fn test_runner_uses_loaded_limits() {
    let file = write_config(r#"{ "runner": { "max_call_depth": 20, "max_log_entries": 2 } }"#);
    let config = GraderConfig::from_file(file.path()).unwrap();
    let run = TestRunner::with_config(&config.runner).run(
        r#"
        function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); }
        console.log(1); console.log(2); console.log(3);
        test("shallow", () => expect(depth(5)).toBe(5));
        test("deep", () => depth(100));
        "#,
    );
    assert!(run.results[0].passed);
    assert_eq!(
        run.results[1].error.as_deref(),
        Some("Maximum call stack size exceeded")
    );
    assert_eq!(run.logs.len(), 2);
}

#[test]
fn test_hint_settings_apply() {
    let config = GraderConfig::from_json_str(
        r#"{ "hints": { "max_level": 3, "docs_base_url": "https://docs.example.org/" } }"#,
    )
    .unwrap();
    let generator = HintGenerator::new(&config.hints);
    let result = TestResult::fail("t", "x is not defined", 0);
    let link = generator
        .progressive_hints(&result, 3)
        .into_iter()
        .find_map(|h| h.link)
        .unwrap();
    assert!(link.starts_with("https://docs.example.org/Web/"));

    let limited = HintGenerator::new(&HintConfig {
        max_level: 2,
        ..config.hints
    });
    assert!(limited
        .progressive_hints(&result, 3)
        .iter()
        .all(|h| h.link.is_none()));
}
