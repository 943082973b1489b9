//! PocketChat CLI - chat with a locally hosted language model.

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use std::path::PathBuf;

mod commands;
mod config;

use config::{AppConfig, AppConfigBuilder};

/// PocketChat - talk to a model running on this machine
#[derive(Parser)]
#[command(name = "pocketchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (overrides POCKETCHAT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Model download URL (overrides POCKETCHAT_MODEL_URL)
    #[arg(long, global = true)]
    model_url: Option<String>,

    /// llama-server binary (overrides POCKETCHAT_LLAMA_SERVER)
    #[arg(long, global = true)]
    llama_server: Option<PathBuf>,

    /// llama-server port (overrides POCKETCHAT_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Let llama-server fetch the model URL itself (POCKETCHAT_STREAM_MODEL)
    #[arg(long, global = true)]
    stream_model: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat {
        /// Print the final session as JSON on exit
        #[arg(long)]
        json: bool,
    },

    /// Show model status and settings
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the local model
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
}

#[derive(Subcommand)]
enum ModelCommand {
    /// Download the model if it is not present
    Pull,
    /// Show where models and binaries are stored
    Path,
    /// Delete the downloaded model
    Remove,
}

impl Cli {
    fn config(&self) -> AppConfig {
        let mut builder = AppConfigBuilder::from_config(AppConfig::from_env());
        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir);
        }
        if let Some(url) = &self.model_url {
            builder = builder.model_url(url);
        }
        if let Some(path) = &self.llama_server {
            builder = builder.llama_server(path);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if self.stream_model {
            builder = builder.stream_model(true);
        }
        builder.build()
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = cli.config();
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;

    match cli.command {
        Commands::Chat { json } => runtime.block_on(commands::chat::run(&config, json)),
        Commands::Status { json } => runtime.block_on(commands::status::run(&config, json)),
        Commands::Model { command } => match command {
            ModelCommand::Pull => runtime.block_on(commands::model::pull(&config)),
            ModelCommand::Path => commands::model::path(&config),
            ModelCommand::Remove => commands::model::remove(&config),
        },
    }
}
