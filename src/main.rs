use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use folio::cli::setup::setup;
use folio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for folio::AppCommand {
    fn from(cmd: Commands) -> folio::AppCommand {
        match cmd {
            Commands::Summary { refresh } => folio::AppCommand::Summary { force: refresh },
            Commands::Watch => folio::AppCommand::Watch,
            Commands::Search { query } => folio::AppCommand::Search(query),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Value the portfolio once and display it
    Summary {
        /// Ignore cached and manual prices and fetch everything again
        #[arg(short, long)]
        refresh: bool,
    },
    /// Keep the portfolio summary refreshed until interrupted
    Watch,
    /// Search for a coin id by name or symbol
    Search {
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => folio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
