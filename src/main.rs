use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "infersim")]
#[command(version, about = "Pausable, steppable inference-pipeline simulator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one simulation in the terminal
    Run {
        /// Prompt to push through the pipeline
        prompt: String,

        /// Step manually (press Enter to advance) instead of auto-play
        #[arg(long)]
        manual: bool,

        /// Use shorter stage delays
        #[arg(long)]
        fast: bool,

        /// Stream from an OpenAI-compatible endpoint instead of the
        /// built-in scripted output
        #[arg(long)]
        endpoint: Option<String>,

        /// Model name sent to the endpoint
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,

        /// Comma-separated scripted chunks (ignored with --endpoint)
        #[arg(long)]
        chunks: Option<String>,
    },
    /// List pipeline stages and their metadata
    Stages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "infersim=debug"
    } else {
        "infersim=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Run {
            prompt,
            manual,
            fast,
            endpoint,
            model,
            chunks,
        } => {
            cli::run::cmd_run(
                prompt,
                *manual,
                *fast,
                endpoint.as_deref(),
                model,
                chunks.as_deref(),
            )
            .await
        }
        Commands::Stages => cli::stages::cmd_stages(),
    }
}
