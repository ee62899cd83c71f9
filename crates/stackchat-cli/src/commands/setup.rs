use anyhow::{Context, Result};
use stackchat_application::model_setup_service::RECOMMENDED_MODELS;
use stackchat_core::device::Device;
use std::process::{Command, Stdio};

use super::utils::{CommandContext, acquire_api_key, print_models, read_line, wait_for_backend};

/// First-run setup: server readiness, API key, then a model deployment when
/// nothing is deployed yet.
pub async fn run(
    context: &CommandContext,
    start_backend: bool,
    device: Option<Device>,
) -> Result<()> {
    println!("🛠  StackChat setup");

    if start_backend {
        start_gpustack()?;
    }

    let probe = context.setup_service(context.configured_api_key(), device);
    wait_for_backend(&probe, &context.config.setup.retry, context.base_url()).await?;

    let api_key = acquire_api_key(context)?;
    let service = context.setup_service(api_key, device);

    let deployed = service
        .deployed_models()
        .await
        .context("Failed to list deployed models")?;
    if !deployed.is_empty() {
        println!("📋 Models already deployed:");
        print_models(&deployed);
        print_next_steps();
        return Ok(());
    }

    let available = service
        .available_models()
        .await
        .context("Failed to list available models")?;
    println!("📦 Models available for deployment:");
    println!("{}", serde_json::to_string_pretty(&available)?);

    println!("\nRecommended models:");
    for (index, model) in RECOMMENDED_MODELS.iter().enumerate() {
        println!("  {}. {}", index + 1, model);
    }

    let prompt = format!("Select a model (1-{}): ", RECOMMENDED_MODELS.len());
    let model_id = choose_model(|| Ok(read_line(&prompt)?))?;

    println!("🚀 Deploying {} on {}...", model_id, service.device());
    service
        .deploy(model_id)
        .await
        .with_context(|| format!("Failed to deploy {}", model_id))?;
    println!("✅ Deployment of {} requested", model_id);

    print_next_steps();
    Ok(())
}

/// Spawns `gpustack start` in the background.
fn start_gpustack() -> Result<()> {
    println!("▶️  Starting GPUStack server...");
    let child = Command::new("gpustack")
        .arg("start")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to run 'gpustack start'. Is GPUStack installed?")?;
    tracing::info!("[Setup] Spawned gpustack start (pid {})", child.id());
    Ok(())
}

/// Asks until the answer names a recommended model. An empty answer or end
/// of input cancels the setup.
fn choose_model(mut next_answer: impl FnMut() -> Result<String>) -> Result<&'static str> {
    loop {
        let answer = next_answer()?;
        if answer.trim().is_empty() {
            anyhow::bail!("No model selected");
        }
        match parse_choice(&answer) {
            Some(model_id) => return Ok(model_id),
            None => println!(
                "⚠️  '{}' is not a choice. Enter a number between 1 and {}.",
                answer.trim(),
                RECOMMENDED_MODELS.len()
            ),
        }
    }
}

/// Maps a 1-based menu answer to a recommended model.
fn parse_choice(answer: &str) -> Option<&'static str> {
    let index: usize = answer.trim().parse().ok()?;
    index.checked_sub(1).and_then(|i| RECOMMENDED_MODELS.get(i)).copied()
}

fn print_next_steps() {
    println!("\n💡 Next steps:");
    println!("  1. Check the deployment: stackchat models");
    println!("  2. Verify the API: stackchat test");
    println!("  3. Start chatting: stackchat-chat");
}
