//! `ethical-guard` -- screen LLM prompts for ethical, legal and bias risk.
//!
//! - `ethical-guard serve` -- run the HTTP gateway.
//! - `ethical-guard check "<prompt>"` -- screen one prompt and print the verdict.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ethical_guard::config::Config;
use ethical_guard::gateway;
use ethical_guard::guard::{AgentModel, EthicalGuard};
use ethical_guard::providers::{self, Provider};

#[derive(Parser)]
#[command(name = "ethical-guard", about = "Multi-agent prompt safety screening", version)]
struct Cli {
    /// Config file path (overrides ETHICAL_GUARD_CONFIG and auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    Serve {
        /// Listen host (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config and PORT).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Screen a single prompt and print the assessment.
    Check {
        /// Prompt text to screen.
        prompt: String,

        /// Print the assessment as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config.validate()?;
            let provider: Arc<dyn Provider> = match providers::create_provider(&config.model) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "No usable model provider; /health stays up but pipeline requests will fail"
                    );
                    Arc::new(providers::UnconfiguredProvider::new(e.to_string()))
                }
            };
            gateway::run_gateway(config, provider).await?;
        }
        Commands::Check { prompt, json } => {
            let provider = providers::create_provider(&config.model)?;
            let settings = AgentModel {
                model: config.model.model.clone(),
                temperature: config.model.temperature,
            };
            let guard = EthicalGuard::new(provider, &settings);
            let assessment = guard.assess(&prompt).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                println!("{}", assessment.to_markdown());
            }
        }
    }

    Ok(())
}
