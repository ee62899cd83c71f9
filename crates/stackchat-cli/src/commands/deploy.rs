use anyhow::{Context, Result};
use stackchat_core::device::Device;

use super::utils::{CommandContext, wait_for_backend};

/// Deploys `model_id`, falling back to `MODEL_ID` / `deploy.model_id`.
pub async fn run(
    context: &CommandContext,
    model_id: Option<String>,
    device: Option<Device>,
) -> Result<()> {
    let model_id = model_id.unwrap_or_else(|| context.config.deploy.model_id.clone());
    let service = context.setup_service(context.configured_api_key(), device);

    wait_for_backend(&service, &context.config.setup.retry, context.base_url()).await?;

    println!("🚀 Deploying {} on {}...", model_id, service.device());
    service
        .deploy(&model_id)
        .await
        .with_context(|| format!("Failed to deploy {}", model_id))?;

    println!("✅ Deployment of {} requested", model_id);
    println!("\n💡 Check its status with: stackchat models");
    Ok(())
}
