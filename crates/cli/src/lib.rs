pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quotesmith_core::config::{AppConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "quotesmith",
    about = "Quotesmith operator CLI",
    long_about = "Inspect configuration, check provider readiness, and run the \
                  document-to-quote agent pipeline.",
    after_help = "Examples:\n  quotesmith doctor --json\n  quotesmith config\n  \
                  quotesmith run --document rfq.txt --pricing '{\"tax_rate\": 0.2}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, prompt templates and completion provider readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the resolved role registry as JSON")]
    Roles,
    #[command(about = "Analyze a document and generate a quote with the configured provider")]
    Run {
        #[arg(long, help = "Path to the source document")]
        document: PathBuf,
        #[arg(long, help = "Caller metadata as a JSON object")]
        metadata: Option<String>,
        #[arg(long, help = "Pricing configuration as a JSON object")]
        pricing: Option<String>,
        #[arg(
            long,
            help = "Confirmed project data as a JSON object; defaults to the extracted data"
        )]
        confirmed: Option<String>,
        #[arg(long, help = "Stop after the analysis phase")]
        analyze_only: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Roles => commands::roles::run(),
        Command::Run { document, metadata, pricing, confirmed, analyze_only } => {
            commands::run::run(commands::run::RunArgs {
                document,
                metadata,
                pricing,
                confirmed,
                analyze_only,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_logging(config: &AppConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when the CLI is driven from tests.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
