//! Integration tests for the `logsieve` subcommand handlers.
//!
//! Each test writes a config pointing at temp directories and calls the
//! handler functions directly.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use logsieve_cli::commands::{clear, config, rules, show};
use logsieve_cli::error::CliError;
use logsieve_core::config::LogsieveConfig;
use logsieve_log_pipeline::state::StateStore;
use logsieve_log_pipeline::FileStateStore;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("should create temp dir");
        fs::create_dir_all(dir.path().join("rules")).expect("rules dir");
        fs::create_dir_all(dir.path().join("triggers")).expect("trigger dir");
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn write_config(&self) -> std::path::PathBuf {
        let config = format!(
            r#"
[general]
log_level = "info"
log_format = "json"

[log_pipeline]
enabled = true
sources = ["events"]
rule_dir = "{rules}"
state_path = "{state}"
trigger_dir = "{triggers}"
global_blacklist = ["heartbeat"]
"#,
            rules = self.path("rules").display(),
            state = self.path("state.json").display(),
            triggers = self.path("triggers").display(),
        );
        let path = self.path("logsieve.toml");
        fs::write(&path, config).expect("should write config");
        path
    }

    fn write_rule(&self, file: &str, body: &str) {
        fs::write(self.path("rules").join(file), body).expect("should write rule");
    }
}

async fn load(path: &Path) -> LogsieveConfig {
    LogsieveConfig::load(path).await.expect("config should load")
}

#[tokio::test]
async fn config_validate_reports_valid_file() {
    let fixture = Fixture::new();
    let path = fixture.write_config();

    let report = config::validate(&path).await;
    assert!(report.valid, "errors: {:?}", report.errors);
}

#[tokio::test]
async fn config_validate_reports_bad_source() {
    let fixture = Fixture::new();
    let path = fixture.path("bad.toml");
    fs::write(&path, "[log_pipeline]\nenabled = true\nsources = [\"syslog\"]\n").unwrap();

    let report = config::validate(&path).await;
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("syslog")));
}

#[tokio::test]
async fn config_show_rejects_unknown_section() {
    let fixture = Fixture::new();
    let path = fixture.write_config();

    assert!(config::show(&path, Some("log_pipeline")).await.is_ok());
    assert!(config::show(&path, Some("alerts")).await.is_err());
}

#[tokio::test]
async fn rules_list_and_validate() {
    let fixture = Fixture::new();
    fixture.write_rule("warn.yml", "id: warn\nfilter_all:\n  - \" - warn: \"\nmerge: true\n");
    fixture.write_rule("all.yaml", "id: all\n");
    fixture.write_rule("broken.yml", "id: [unterminated");

    let report = rules::validate(&fixture.path("rules")).await.unwrap();
    assert_eq!(report.total_files, 3);
    assert_eq!(report.valid, 2);
    assert_eq!(report.invalid, 1);
    assert!(report.errors[0].file.ends_with("broken.yml"));

    fs::remove_file(fixture.path("rules").join("broken.yml")).unwrap();
    let list = rules::list(&fixture.path("rules")).await.unwrap();
    assert_eq!(list.total, 2);
    assert!(list.rules.iter().any(|r| r.id == "warn" && r.merge));
}

#[tokio::test]
async fn rules_validate_flags_duplicate_ids() {
    let fixture = Fixture::new();
    fixture.write_rule("a.yml", "id: same\n");
    fixture.write_rule("b.yml", "id: same\n");

    let report = rules::validate(&fixture.path("rules")).await.unwrap();
    assert_eq!(report.valid, 1);
    assert_eq!(report.invalid, 1);
}

#[tokio::test]
async fn rules_test_line_matches_and_drops() {
    let fixture = Fixture::new();
    fixture.write_rule("warn.yml", "id: warn\nfilter_all:\n  - \" - warn: \"\n");
    fixture.write_rule("info.yml", "id: info\nfilter_all:\n  - \" - info: \"\n");
    let config = load(&fixture.write_config()).await;

    let report = rules::test_line(
        &config,
        "2024-01-05 08:01:00.000  - warn: hue.0 bridge unreachable",
    )
    .await
    .unwrap();
    assert!(!report.dropped);
    let parsed = report.parsed.as_ref().expect("line should parse");
    assert_eq!(parsed.source, "hue.0");
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].rule_id, "warn");

    let dropped = rules::test_line(&config, "2024-01-05 08:01:00.000  - info: a.0 heartbeat ok")
        .await
        .unwrap();
    assert!(dropped.dropped);
    assert!(dropped.matches.is_empty());

    let unparsed = rules::test_line(&config, "not a log line").await.unwrap();
    assert!(!unparsed.dropped);
    assert!(unparsed.parsed.is_none());
}

#[tokio::test]
async fn show_reads_persisted_history() {
    let fixture = Fixture::new();
    let state_path = fixture.path("state.json");

    let store = FileStateStore::open(&state_path).await.unwrap();
    store
        .set(
            "warn.log",
            "2024-01-05 08:03:00.000 - warn: hue.0 b\n2024-01-05 08:01:00.000 - warn: hue.0 a"
                .to_owned(),
        )
        .await
        .unwrap();
    store
        .set("warn.json", r#"[{"date":"08:03","message":"b"}]"#.to_owned())
        .await
        .unwrap();
    store.set("warn.jsonCount", "1".to_owned()).await.unwrap();
    store.flush().await.unwrap();

    let text = show::load(&state_path, "warn", false).await.unwrap();
    assert_eq!(text.line_count, 2);
    assert_eq!(text.json_count, 1);
    assert_eq!(text.lines[0], "2024-01-05 08:03:00.000 - warn: hue.0 b");
    assert!(text.rows.is_none());

    let json = show::load(&state_path, "warn", true).await.unwrap();
    let rows = json.rows.expect("rows should be present");
    assert_eq!(rows[0]["message"], "b");
}

#[tokio::test]
async fn show_unknown_rule_is_an_error() {
    let fixture = Fixture::new();
    let err = show::load(&fixture.path("state.json"), "missing", false)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Command(_)));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn clear_writes_trigger_for_known_rule() {
    let fixture = Fixture::new();
    fixture.write_rule("all.yml", "id: all\n");

    let report = clear::clear(&fixture.path("rules"), &fixture.path("triggers"), "all")
        .await
        .unwrap();
    assert_eq!(report.rule_id, "all");
    assert!(Path::new(&report.trigger).exists());
}

#[tokio::test]
async fn clear_rejects_unknown_rule() {
    let fixture = Fixture::new();
    fixture.write_rule("all.yml", "id: all\n");

    let err = clear::clear(&fixture.path("rules"), &fixture.path("triggers"), "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Rule(_)));
    assert_eq!(
        fs::read_dir(fixture.path("triggers")).unwrap().count(),
        0
    );
}
