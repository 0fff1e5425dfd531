//! agentloop CLI: the main entry point.
//!
//! Commands:
//! - `run`     Run the agent once and print the final answer
//! - `stream`  Run the agent once, printing events as they arrive
//! - `chat`    Interactive mode, one streamed run per line
//! - `tools`   List the demo tools and their schemas
//! - `config`  Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::ToolSet;

#[derive(Parser)]
#[command(
    name = "agentloop",
    about = "agentloop: an LLM agent loop with tool calling and streaming",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.agentloop/config.toml
    #[arg(short, long, global = true, env = "AGENTLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Which demo tools to give the agent
    #[arg(long, global = true, value_enum, default_value_t = ToolSet::Demo)]
    toolset: ToolSet,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent once and print the final answer
    Run {
        /// The user input
        input: String,

        /// Ask for a structured task analysis (implies the task tools)
        #[arg(long)]
        analyze_tasks: bool,
    },

    /// Run the agent once, streaming events
    Stream {
        /// The user input
        input: String,
    },

    /// Interactive chat
    Chat,

    /// List available tools and their parameter schemas
    Tools,

    /// Show the effective configuration (API key redacted)
    Config {
        /// Print the default config file instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run { input, analyze_tasks } => {
            commands::agent::run(config, cli.toolset, &input, analyze_tasks).await?
        }
        Commands::Stream { input } => commands::agent::stream(config, cli.toolset, &input).await?,
        Commands::Chat => commands::agent::chat(config, cli.toolset).await?,
        Commands::Tools => commands::tools::run(cli.toolset)?,
        Commands::Config { default } => commands::config_cmd::show(config, default)?,
    }

    Ok(())
}
