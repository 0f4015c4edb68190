//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`        Run one task through the reasoning loop
//! - `providers`  Show which decoding backend would be selected
//! - `config`     Print the resolved configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: one structured decision per step against a business API",
    version,
    author
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
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task to completion
    Run {
        /// Task identifier (a random one is generated when omitted)
        #[arg(long)]
        task_id: Option<String>,

        /// The caller's request
        #[arg(long)]
        text: String,

        /// Override the business API base URL
        #[arg(long)]
        api_url: Option<String>,

        /// Print the full task report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which decoding backend is selected and why
    Providers,

    /// Print the resolved configuration (secrets redacted)
    Config {
        /// Print a default config.toml instead
        #[arg(long)]
        default: bool,

        /// Print the config file path
        #[arg(long, conflicts_with = "default")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run {
            task_id,
            text,
            api_url,
            json,
        } => {
            commands::run::run(commands::run::RunArgs {
                task_id,
                text,
                api_url,
                json,
            })
            .await?
        }
        Commands::Providers => commands::providers::run().await?,
        Commands::Config { default, path } => {
            if path {
                commands::config_cmd::path().await?
            } else {
                commands::config_cmd::show(default).await?
            }
        }
    }

    Ok(())
}
