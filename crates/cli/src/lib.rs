mod dump;
mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use structscope_core::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "structscope",
    version,
    about = "Live structural graph of a Go source tree",
    long_about = "Structscope extracts packages, structs, fields, methods and the references between \
                  them from a Go source tree, keeps that graph in sync with the files on disk and \
                  writes edits made by connected observers back into the sources."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a source tree and serve its graph over a websocket
    #[command(
        long_about = "Loads the configuration file, watches the configured directory and serves \
                      the extracted graph on /ws. The configuration is re-read periodically."
    )]
    Serve {
        /// Path to the JSON configuration file
        #[arg(long, value_name = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Extract a source tree once and print the graph as JSON
    Dump {
        /// Root directory of the Go sources
        #[arg(value_name = "DIR")]
        path: PathBuf,
        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = match &cli.command {
        Commands::Serve { .. } => structscope_core::logging::init_logging("server", true),
        Commands::Dump { .. } => structscope_core::logging::init_logging("cli", false),
    };

    match cli.command {
        Commands::Serve { config } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve::run(config))
        }
        Commands::Dump { path, pretty } => dump::run(&path, pretty),
    }
}
