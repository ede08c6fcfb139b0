//! Hestia CLI: the main entry point.
//!
//! Commands:
//! - `lambda` Serve invocations from the Lambda Runtime API (default)
//! - `serve`  Start the local HTTP gateway
//! - `ask`    Answer one query and print the envelope
//! - `env`    Show the environment label and resolved settings

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(
    name = "hestia",
    about = "Hestia: a household assistant behind a single query endpoint",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "HESTIA_LOG_JSON")]
    json: bool,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Commands {
    /// Serve invocations from the Lambda Runtime API
    Lambda,

    /// Start the local HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Answer a single query and print the response envelope
    Ask {
        query: String,

        /// Function ARN to resolve the environment label from
        #[arg(long)]
        arn: Option<String>,
    },

    /// Show the environment label for an ARN and the resolved settings
    Env {
        arn: Option<String>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    // A custom runtime bootstrap starts the binary without arguments
    match cli.command.unwrap_or(Commands::Lambda) {
        Commands::Lambda => commands::lambda::run().await?,
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Ask { query, arn } => commands::ask::run(query, arn).await?,
        Commands::Env { arn } => commands::env::run(arn)?,
    }

    Ok(())
}
