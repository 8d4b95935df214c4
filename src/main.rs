use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use doctrack::{commands, diagnostics, info};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "DOCTRACK_LOG";

/// Incremental document inventory and cross-reference resolution.
#[derive(Parser)]
#[command(name = "doctrack", version, about = "Incremental document inventory and cross-reference resolution")]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
    /// Number of worker threads used to read documents.
    #[arg(long, short = 'j', global = true, default_value_t = 1)]
    jobs: usize,
    /// Source root directory.
    #[arg(long, short = 'C', global = true, default_value = ".")]
    root: PathBuf,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Refresh the inventory and check consistency (exit 1 on warnings)
    Check,
    /// Print the reference sheet and the inventory summary
    Info {
        /// Output as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Refresh the inventory and print the navigation relation table
    Relations,
    /// Refresh the inventory and print the resolved tree of a document
    Resolve {
        /// Docname to resolve
        docname: String,
        /// Renderer name passes are selected for
        #[arg(long, default_value = "html")]
        builder: String,
    },
    /// Show which documents are added, changed or removed
    Status,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check => commands::check(&cli.root, cli.jobs),
        Commands::Info { json } => {
            info::run(&cli.root, json);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Relations => commands::relations(&cli.root, cli.jobs).map(|()| return ExitCode::SUCCESS),
        Commands::Resolve { docname, builder } => {
            commands::resolve(&cli.root, cli.jobs, &docname, &builder).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Status => commands::status(&cli.root).map(|()| return ExitCode::SUCCESS),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3)
        },
    };
}

/// Install the stderr log subscriber, filtered by `DOCTRACK_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| return EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    return;
}
