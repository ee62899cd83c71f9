use anyhow::{Context, Result};

use super::utils::{CommandContext, print_models};

pub async fn run(context: &CommandContext, available: bool) -> Result<()> {
    let backend = context.backend(context.configured_api_key());

    if available {
        let models = backend
            .list_available_models()
            .await
            .context("Failed to list available models")?;
        println!("📦 Models available for deployment:");
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    let models = backend.list_models().await.context("Failed to list models")?;
    if models.is_empty() {
        println!("No models are deployed. Run: stackchat setup");
        return Ok(());
    }

    println!("📋 Deployed models:");
    print_models(&models);
    Ok(())
}
