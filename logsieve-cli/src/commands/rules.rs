//! `logsieve rules` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use logsieve_core::config::LogsieveConfig;
use logsieve_log_pipeline::{
    FilterEngine, FilterRule, LineNormalizer, LineParser, PipelineConfig, RuleLoader,
};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogsieveConfig::load(config_path).await?;

    match args.action {
        RulesAction::List => {
            let report = list(Path::new(&config.log_pipeline.rule_dir)).await?;
            writer.render(&report)
        }
        RulesAction::Validate { path } => {
            let dir = path.unwrap_or_else(|| PathBuf::from(&config.log_pipeline.rule_dir));
            let report = validate(&dir).await?;
            writer.render(&report)?;
            if report.invalid > 0 {
                return Err(CliError::Rule(format!("{} invalid rules", report.invalid)));
            }
            Ok(())
        }
        RulesAction::Test { line } => {
            let report = test_line(&config, &line).await?;
            writer.render(&report)
        }
    }
}

/// List the rules that load from `dir`.
pub async fn list(dir: &Path) -> Result<RuleListReport, CliError> {
    info!(dir = %dir.display(), "loading filter rules");

    let rules = RuleLoader::load_directory(dir).await?;
    Ok(RuleListReport {
        total: rules.len(),
        rules: rules.iter().map(RuleEntry::from).collect(),
    })
}

/// Validate every YAML file in `dir` independently.
pub async fn validate(dir: &Path) -> Result<RuleValidationReport, CliError> {
    info!(dir = %dir.display(), "validating filter rules");

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            paths.push(path);
        }
    }
    paths.sort();

    // add_rule compiles clean tokens and rejects duplicate ids
    let mut engine = FilterEngine::new();
    let mut errors = Vec::new();
    for path in &paths {
        let result = match RuleLoader::load_file(path).await {
            Ok(rule) => engine.add_rule(rule),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            errors.push(RuleError {
                file: path.display().to_string(),
                error: e.to_string(),
            });
        }
    }

    Ok(RuleValidationReport {
        path: dir.display().to_string(),
        total_files: paths.len(),
        valid: paths.len() - errors.len(),
        invalid: errors.len(),
        errors,
    })
}

/// Run one raw line through the normalizer, the parser and every rule.
pub async fn test_line(config: &LogsieveConfig, line: &str) -> Result<LineTestReport, CliError> {
    let pipeline = PipelineConfig::from_core(&config.log_pipeline);
    let normalizer = LineNormalizer::new(pipeline.global_blacklist.clone(), pipeline.clean_whitespace)?;
    let parser = LineParser::new()?;

    let normalized = normalizer.normalize(line);
    let mut report = LineTestReport {
        input: line.to_owned(),
        normalized: normalized.clone(),
        dropped: normalized.is_empty(),
        parsed: None,
        matches: Vec::new(),
    };
    if report.dropped {
        return Ok(report);
    }

    let Some(entry) = parser.parse(&normalized) else {
        return Ok(report);
    };
    report.parsed = Some(ParsedFields {
        timestamp: entry.timestamp.clone(),
        level: entry.level.to_string(),
        source: entry.source.clone(),
        message: entry.message.clone(),
    });

    let mut engine = FilterEngine::new();
    engine.load_rules_from_dir(&pipeline.rule_dir).await?;
    report.matches = engine
        .rules()
        .iter()
        .filter(|rule| engine.matches(rule, &normalized))
        .map(|rule| RuleMatch {
            rule_id: rule.id.clone(),
            cleaned: engine.clean_line(rule, &normalized),
        })
        .collect();

    Ok(report)
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub id: String,
    pub filter_all: Vec<String>,
    pub filter_any: Vec<String>,
    pub blacklist: Vec<String>,
    pub merge: bool,
    pub sort_descending: bool,
    pub json_max_lines: usize,
}

impl From<&FilterRule> for RuleEntry {
    fn from(rule: &FilterRule) -> Self {
        Self {
            id: rule.id.clone(),
            filter_all: rule.filter_all.clone(),
            filter_any: rule.filter_any.clone(),
            blacklist: rule.blacklist.clone(),
            merge: rule.merge,
            sort_descending: rule.sort_descending,
            json_max_lines: rule.json_max_lines,
        }
    }
}

fn terms(list: &[String]) -> String {
    if list.is_empty() {
        "-".to_owned()
    } else {
        list.join(", ")
    }
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Filter Rules ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<20} {:<6} {:<6} {:<25} {:<25} Blacklist",
            "ID", "Merge", "Order", "All", "Any"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for r in &self.rules {
            let merge = if r.merge { "yes".green() } else { "no".normal() };
            let order = if r.sort_descending { "desc" } else { "asc" };
            writeln!(
                w,
                "{:<20} {:<6} {:<6} {:<25} {:<25} {}",
                r.id,
                merge,
                order,
                terms(&r.filter_all),
                terms(&r.filter_any),
                terms(&r.blacklist)
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<RuleError>,
}

#[derive(Serialize)]
pub struct RuleError {
    pub file: String,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Files: {} total, {} valid, {} invalid",
            self.total_files,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.file.red(), e.error)?;
            }
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct ParsedFields {
    pub timestamp: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub cleaned: String,
}

#[derive(Serialize)]
pub struct LineTestReport {
    pub input: String,
    pub normalized: String,
    pub dropped: bool,
    pub parsed: Option<ParsedFields>,
    pub matches: Vec<RuleMatch>,
}

impl Render for LineTestReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.dropped {
            writeln!(w, "{} (blacklisted or empty after normalization)", "DROPPED".yellow().bold())?;
            return Ok(());
        }
        writeln!(w, "Normalized: {}", self.normalized)?;

        let Some(parsed) = &self.parsed else {
            writeln!(w, "{} (line does not match the log line pattern)", "UNPARSED".red().bold())?;
            return Ok(());
        };
        writeln!(w, "  Timestamp: {}", parsed.timestamp)?;
        writeln!(w, "  Level:     {}", parsed.level)?;
        writeln!(w, "  Source:    {}", parsed.source)?;
        writeln!(w, "  Message:   {}", parsed.message)?;
        writeln!(w)?;

        if self.matches.is_empty() {
            writeln!(w, "No rule matches")?;
        } else {
            writeln!(w, "Matching rules ({}):", self.matches.len().to_string().bold())?;
            for m in &self.matches {
                writeln!(w, "  {:<20} {}", m.rule_id.green(), m.cleaned)?;
            }
        }
        Ok(())
    }
}
