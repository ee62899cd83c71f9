use anyhow::{Context, Result};

use super::utils::CommandContext;

pub async fn run(context: &CommandContext) -> Result<()> {
    let backend = context.backend(context.configured_api_key());
    let metrics = backend
        .fetch_usage_metrics()
        .await
        .context("Failed to fetch usage metrics")?;

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
