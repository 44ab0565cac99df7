use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use logsieve_cli::cli::{Cli, Commands};
use logsieve_cli::commands;
use logsieve_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays parseable.
    let filter = cli.log_level.as_deref().unwrap_or("warn");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(config = %cli.config.display(), "logsieve cli starting");

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &cli.config, &writer).await,
        Commands::Show(args) => commands::show::execute(args, &cli.config, &writer).await,
        Commands::Clear(args) => commands::clear::execute(args, &cli.config, &writer).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
