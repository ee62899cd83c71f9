use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use stackchat_core::device::Device;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stackchat")]
#[command(
    about = "StackChat - setup and test utilities for a local GPUStack server",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override `config.toml` and the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// GPUStack API base URL (e.g. http://localhost:8000/v1)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, global = true)]
    pub api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the GPUStack server answers
    Check,
    /// List deployed models and their status
    Models {
        /// List the models available for deployment instead
        #[arg(long)]
        available: bool,
    },
    /// Show backend usage metrics
    Metrics,
    /// Deploy a model
    Deploy {
        /// Model to deploy (defaults to MODEL_ID or deploy.model_id)
        #[arg(long)]
        model_id: Option<String>,

        /// Device override: mps, cuda or cpu
        #[arg(long)]
        device: Option<Device>,
    },
    /// Interactive first-run setup: API key and model deployment
    Setup {
        /// Run `gpustack start` before waiting for the server
        #[arg(long)]
        start_backend: bool,

        /// Device override: mps, cuda or cpu
        #[arg(long)]
        device: Option<Device>,
    },
    /// Verify the API end to end with a short completion
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = commands::utils::CommandContext::load(&cli.global)?;

    match cli.command {
        Commands::Check => commands::check::run(&context).await?,
        Commands::Models { available } => commands::models::run(&context, available).await?,
        Commands::Metrics => commands::metrics::run(&context).await?,
        Commands::Deploy { model_id, device } => {
            commands::deploy::run(&context, model_id, device).await?
        }
        Commands::Setup {
            start_backend,
            device,
        } => commands::setup::run(&context, start_backend, device).await?,
        Commands::Test => commands::test::run(&context).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stackchat",
            "deploy",
            "--model-id",
            "tiny",
            "--base-url",
            "http://gpu:8000/v1",
            "--device",
            "cpu",
        ])
        .unwrap();

        assert_eq!(cli.global.base_url.as_deref(), Some("http://gpu:8000/v1"));
        match cli.command {
            Commands::Deploy { model_id, device } => {
                assert_eq!(model_id.as_deref(), Some("tiny"));
                assert_eq!(device, Some(Device::Cpu));
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_rejects_unknown_device() {
        assert!(Cli::try_parse_from(["stackchat", "setup", "--device", "tpu"]).is_err());
    }

    #[test]
    fn test_setup_start_backend_flag() {
        let cli =
            Cli::try_parse_from(["stackchat", "--api-key", "k", "setup", "--start-backend"])
                .unwrap();
        assert_eq!(cli.global.api_key.as_deref(), Some("k"));
        assert!(matches!(
            cli.command,
            Commands::Setup {
                start_backend: true,
                device: None
            }
        ));
    }
}
