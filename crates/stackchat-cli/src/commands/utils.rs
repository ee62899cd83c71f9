use anyhow::{Context, Result};
use rustyline::completion::Completer;
use rustyline::config::{ColorMode, Config};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{DefaultEditor, Editor, Helper};
use std::borrow::Cow::{self, Owned};
use stackchat_application::{ApiKeyPrompt, ApiKeyService, ApiKeySource, ModelSetupService};
use stackchat_core::StackChatError;
use stackchat_core::backend::{Backend, ModelDescriptor};
use stackchat_core::config::RootConfig;
use stackchat_core::device::Device;
use stackchat_core::retry::RetryPolicy;
use stackchat_infrastructure::{ApiKeyStorage, ConfigService};
use stackchat_interaction::BackendClient;
use std::sync::Arc;

use crate::GlobalArgs;

/// Configuration resolved for one command invocation.
///
/// Precedence: command-line flags, environment, `config.toml`, defaults.
pub struct CommandContext {
    pub config: RootConfig,
}

impl CommandContext {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let service = ConfigService::new().context("Failed to locate config directory")?;
        let mut config = service
            .get_config()
            .with_context(|| format!("Invalid configuration in {}", service.path().display()))?;
        apply_flags(&mut config, global);
        Ok(Self { config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.backend.base_url
    }

    /// Key given by `--api-key`, `GPUSTACK_API_KEY` or `backend.api_key`.
    pub fn configured_api_key(&self) -> Option<String> {
        self.config.backend.api_key().map(str::to_string)
    }

    pub fn backend(&self, api_key: Option<String>) -> Arc<dyn Backend> {
        Arc::new(BackendClient::from_config(&self.config.backend).with_api_key(api_key))
    }

    pub fn setup_service(
        &self,
        api_key: Option<String>,
        device: Option<Device>,
    ) -> ModelSetupService {
        ModelSetupService::new(self.backend(api_key))
            .with_device_override(device.or(self.config.deploy.device))
    }
}

pub fn apply_flags(config: &mut RootConfig, global: &GlobalArgs) {
    if let Some(base_url) = &global.base_url {
        config.backend.base_url = base_url.clone();
    }
    if let Some(api_key) = &global.api_key {
        config.backend.api_key = api_key.clone();
    }
}

/// Polls the server with `policy`, printing progress. Fails when it never
/// becomes ready.
pub async fn wait_for_backend(
    service: &ModelSetupService,
    policy: &RetryPolicy,
    base_url: &str,
) -> Result<()> {
    println!("⏳ Waiting for GPUStack server at {}...", base_url);

    let ready = service
        .wait_until_ready(policy, |attempt| {
            println!(
                "  Attempting to connect... ({}/{}) {}",
                attempt.attempt, attempt.max_attempts, attempt.readiness
            );
        })
        .await;

    if !ready {
        println!("\n💡 Start the server with: gpustack start");
        anyhow::bail!("GPUStack server at {} is not reachable", base_url);
    }

    println!("✅ GPUStack server is ready");
    Ok(())
}

/// Uses the configured key, otherwise the cached key file, otherwise asks.
pub fn acquire_api_key(context: &CommandContext) -> Result<Option<String>> {
    if let Some(key) = context.configured_api_key() {
        return Ok(Some(key));
    }

    let storage = ApiKeyStorage::new().context("Failed to locate the API key file")?;
    let service = ApiKeyService::new(Arc::new(storage));
    let source = service.acquire(&ReadlinePrompt)?;

    match &source {
        ApiKeySource::Cached(_) => println!("🔑 Using cached API key"),
        ApiKeySource::Entered(_) => println!("🔑 API key saved"),
        ApiKeySource::None => println!("⚠️  Continuing without an API key"),
    }
    Ok(source.into_key())
}

/// Reads the API key from the terminal, shown as `*` while typing.
struct ReadlinePrompt;

impl ApiKeyPrompt for ReadlinePrompt {
    fn prompt_api_key(&self) -> stackchat_core::Result<String> {
        println!("Enter your GPUStack API key (leave empty to continue without one).");
        read_secret("API key: ").map_err(|e| StackChatError::io(e.to_string()))
    }
}

/// Rustyline helper that renders every typed character as `*`.
struct MaskingHelper;

impl Helper for MaskingHelper {}

impl Completer for MaskingHelper {
    type Candidate = String;
}

impl Hinter for MaskingHelper {
    type Hint = String;
}

impl Validator for MaskingHelper {}

impl Highlighter for MaskingHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Owned("*".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Like [`read_line`], but masked and kept out of the history.
fn read_secret(prompt: &str) -> rustyline::Result<String> {
    // Masking goes through the highlighter, so colors must stay on.
    let config = Config::builder()
        .color_mode(ColorMode::Forced)
        .auto_add_history(false)
        .build();
    let mut rl: Editor<MaskingHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(MaskingHelper));
    match rl.readline(prompt) {
        Ok(line) => Ok(line.trim().to_string()),
        Err(ReadlineError::Eof) => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Reads one line. End of input counts as an empty answer.
pub fn read_line(prompt: &str) -> rustyline::Result<String> {
    let mut rl = DefaultEditor::new()?;
    match rl.readline(prompt) {
        Ok(line) => Ok(line.trim().to_string()),
        Err(ReadlineError::Eof) => Ok(String::new()),
        Err(e) => Err(e),
    }
}

pub fn status_marker(model: &ModelDescriptor) -> &'static str {
    if model.is_running() { "✓" } else { "○" }
}

pub fn print_models(models: &[ModelDescriptor]) {
    for model in models {
        println!("  {} {} ({})", status_marker(model), model.id, model.status);
    }
}
