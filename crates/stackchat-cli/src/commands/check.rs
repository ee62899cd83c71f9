use anyhow::Result;
use stackchat_core::backend::Readiness;

use super::utils::CommandContext;

/// Probes the server once.
pub async fn run(context: &CommandContext) -> Result<()> {
    println!("🔍 Checking GPUStack server at {}...", context.base_url());

    let backend = context.backend(context.configured_api_key());
    match backend.probe().await {
        Readiness::Ready => {
            println!("✅ GPUStack server is ready");
            Ok(())
        }
        readiness => {
            println!("\n💡 Start the server with: gpustack start");
            anyhow::bail!("GPUStack server is not ready: {}", readiness)
        }
    }
}
