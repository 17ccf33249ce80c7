//! Nexus CLI: the main entry point.
//!
//! Commands:
//! - `serve`: start the HTTP gateway
//! - `chat`: run one turn in-process and stream the answer
//! - `tools`: list registered tools and their cache TTLs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "nexus",
    about = "Nexus: streaming, tool-orchestrating conversation runtime",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (defaults to ~/.nexus/config.toml)
    #[arg(long, global = true, env = "NEXUS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message and stream the reply
    Chat {
        /// Thread to continue (created if unknown)
        #[arg(short, long, default_value = "cli")]
        thread: String,

        /// The message to send
        message: String,
    },

    /// List registered tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // Logs go to stderr so `chat` output stays clean on stdout
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Chat { thread, message } => commands::chat::run(config, thread, message).await?,
        Commands::Tools => commands::tools::run(&config)?,
    }

    Ok(())
}
