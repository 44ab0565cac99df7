//! `logsieve show` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logsieve_core::config::LogsieveConfig;
use logsieve_log_pipeline::state::{self, StateStore};
use logsieve_log_pipeline::FileStateStore;

use crate::cli::ShowArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `show` command.
pub async fn execute(
    args: ShowArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogsieveConfig::load(config_path).await?;
    let report = load(Path::new(&config.log_pipeline.state_path), &args.rule, args.json).await?;
    writer.render(&report)
}

/// Read a rule's persisted projection from the state file.
pub async fn load(state_path: &Path, rule_id: &str, json: bool) -> Result<HistoryReport, CliError> {
    info!(path = %state_path.display(), rule_id, "reading rule history");

    let store = FileStateStore::open(state_path).await?;
    let log = read_text(&store, &state::log_key(rule_id)).await?;
    let json_rows = read_text(&store, &state::json_key(rule_id)).await?;
    let json_count = read_text(&store, &state::json_count_key(rule_id))
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let cleared_at = state::clear_marker(store.get(&state::clear_key(rule_id)).await?.as_ref())
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());

    if log.is_none() && json_rows.is_none() {
        return Err(CliError::Command(format!(
            "no history stored for rule '{rule_id}'"
        )));
    }

    let lines: Vec<String> = log
        .as_deref()
        .map(|l| l.lines().map(str::to_owned).collect())
        .unwrap_or_default();

    let rows = if json {
        json_rows
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?
    } else {
        None
    };

    Ok(HistoryReport {
        rule_id: rule_id.to_owned(),
        line_count: lines.len(),
        json_count,
        cleared_at,
        lines: if json { Vec::new() } else { lines },
        rows,
    })
}

async fn read_text(store: &FileStateStore, key: &str) -> Result<Option<String>, CliError> {
    Ok(store.get(key).await?.map(|v| v.value))
}

#[derive(Debug, Serialize)]
pub struct HistoryReport {
    pub rule_id: String,
    pub line_count: usize,
    pub json_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<serde_json::Value>,
}

impl Render for HistoryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Rule {} ({} lines, {} JSON rows)",
            self.rule_id.bold(),
            self.line_count,
            self.json_count
        )?;
        if let Some(ref cleared) = self.cleared_at {
            writeln!(w, "  Cleared at: {}", cleared.yellow())?;
        }
        writeln!(w)?;

        if let Some(ref rows) = self.rows {
            let pretty = serde_json::to_string_pretty(rows).map_err(std::io::Error::other)?;
            writeln!(w, "{pretty}")?;
        } else {
            for line in &self.lines {
                writeln!(w, "{line}")?;
            }
        }
        Ok(())
    }
}
