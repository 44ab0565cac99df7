//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// logsieve -- rule-based log filtering for home automation hosts.
///
/// Use `logsieve <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logsieve", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logsieve.toml configuration file.
    #[arg(short, long, default_value = "/etc/logsieve/logsieve.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration.
    Config(ConfigArgs),

    /// Inspect and test filter rules.
    Rules(RulesArgs),

    /// Print the persisted history of a rule.
    Show(ShowArgs),

    /// Ask the running daemon to clear a rule's JSON view.
    Clear(ClearArgs),
}

// ---- config ----

/// Manage logsieve configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, log_pipeline, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- rules ----

/// Inspect and test filter rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List the rules in the configured rule directory.
    List,
    /// Validate rule files one by one.
    Validate {
        /// Directory containing YAML rule files (default: `log_pipeline.rule_dir`).
        path: Option<PathBuf>,
    },
    /// Run a log line through normalization, parsing and every rule.
    Test {
        /// The raw log line.
        line: String,
    },
}

// ---- show ----

/// Print the persisted projection of a rule.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Rule id.
    pub rule: String,

    /// Print the JSON rows instead of the flat text history.
    #[arg(long)]
    pub json: bool,
}

// ---- clear ----

/// Drop a clear trigger file for a rule.
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Rule id.
    pub rule: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parse_config_validate() {
        let cli = Cli::try_parse_from(["logsieve", "config", "validate"]).expect("parse");
        match cli.command {
            Commands::Config(args) => assert!(matches!(args.action, ConfigAction::Validate)),
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn parse_config_show_section() {
        let cli = Cli::try_parse_from(["logsieve", "config", "show", "--section", "metrics"])
            .expect("parse");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("metrics")),
            _ => panic!("expected Config Show"),
        }
    }

    #[test]
    fn parse_rules_validate_default_path() {
        let cli = Cli::try_parse_from(["logsieve", "rules", "validate"]).expect("parse");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Validate { path },
            }) => assert!(path.is_none()),
            _ => panic!("expected Rules Validate"),
        }
    }

    #[test]
    fn parse_rules_test_line() {
        let cli = Cli::try_parse_from([
            "logsieve",
            "rules",
            "test",
            "2024-01-05 08:00:00.000  - info: hue.0 connected",
        ])
        .expect("parse");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Test { line },
            }) => assert!(line.contains("hue.0")),
            _ => panic!("expected Rules Test"),
        }
    }

    #[test]
    fn parse_show_json() {
        let cli = Cli::try_parse_from(["logsieve", "show", "warn", "--json"]).expect("parse");
        match cli.command {
            Commands::Show(args) => {
                assert_eq!(args.rule, "warn");
                assert!(args.json);
            }
            _ => panic!("expected Show command"),
        }
    }

    #[test]
    fn parse_clear() {
        let cli = Cli::try_parse_from(["logsieve", "clear", "warn"]).expect("parse");
        assert!(matches!(cli.command, Commands::Clear(ClearArgs { ref rule }) if rule == "warn"));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "logsieve",
            "-c",
            "/tmp/logsieve.toml",
            "--output",
            "json",
            "rules",
            "list",
            "--log-level",
            "debug",
        ])
        .expect("parse");
        assert_eq!(cli.config, PathBuf::from("/tmp/logsieve.toml"));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn missing_or_invalid_command_fails() {
        assert!(Cli::try_parse_from(["logsieve"]).is_err());
        assert!(Cli::try_parse_from(["logsieve", "start"]).is_err());
    }

    #[test]
    fn command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "logsieve");
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in ["config", "rules", "show", "clear"] {
            assert!(subcommands.contains(&name), "missing subcommand {name}");
        }
    }
}
