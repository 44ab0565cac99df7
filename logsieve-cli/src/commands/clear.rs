//! `logsieve clear` command handler
//!
//! Drops a trigger file into `log_pipeline.trigger_dir`; the running daemon
//! picks it up and rebuilds the rule's JSON view from the current time.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use logsieve_core::config::LogsieveConfig;
use logsieve_log_pipeline::{RuleLoader, request_clear};

use crate::cli::ClearArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `clear` command.
pub async fn execute(
    args: ClearArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogsieveConfig::load(config_path).await?;
    let report = clear(
        Path::new(&config.log_pipeline.rule_dir),
        Path::new(&config.log_pipeline.trigger_dir),
        &args.rule,
    )
    .await?;
    writer.render(&report)
}

/// Check the rule exists, then write its trigger file.
pub async fn clear(rule_dir: &Path, trigger_dir: &Path, rule_id: &str) -> Result<ClearReport, CliError> {
    match RuleLoader::load_directory(rule_dir).await {
        Ok(rules) if !rules.iter().any(|r| r.id == rule_id) => {
            return Err(CliError::Rule(format!(
                "unknown rule '{rule_id}' in {}",
                rule_dir.display()
            )));
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "could not verify rule id, writing trigger anyway"),
    }

    let path = request_clear(trigger_dir, rule_id).await?;
    info!(rule_id, path = %path.display(), "clear trigger written");

    Ok(ClearReport {
        rule_id: rule_id.to_owned(),
        trigger: path.display().to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub rule_id: String,
    pub trigger: String,
}

impl Render for ClearReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} clear requested for rule {} ({})",
            "✓".green(),
            self.rule_id.bold(),
            self.trigger
        )
    }
}
