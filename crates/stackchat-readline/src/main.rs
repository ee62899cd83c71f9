use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use stackchat_application::{
    ChatTurnOrchestrator, ModelAvailability, ModelSetupService, TurnOutcome,
};
use stackchat_core::backend::Backend;
use stackchat_core::config::RootConfig;
use stackchat_core::secret::ApiKeyStore;
use stackchat_core::session::Session;
use stackchat_infrastructure::{ApiKeyStorage, ConfigService, StackChatPaths};
use stackchat_interaction::BackendClient;

mod display;
mod repl_command;

use repl_command::{COMMANDS, ReplCommand};

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Sends tracing output to a daily log file so it does not interleave with
/// the chat. Falls back to warnings on stderr when the log directory is
/// unavailable.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match StackChatPaths::logs_dir() {
        Ok(logs_dir) => {
            let appender = tracing_appender::rolling::daily(logs_dir, "stackchat-chat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("warn"))
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

/// Uses the configured key, or the key cached by `stackchat setup`.
fn resolve_api_key(config: &RootConfig) -> Option<String> {
    if let Some(key) = config.backend.api_key() {
        return Some(key.to_string());
    }
    match ApiKeyStorage::new().map(|storage| storage.load()) {
        Ok(Ok(key)) => key,
        Ok(Err(e)) => {
            tracing::warn!("[Bootstrap] Could not read cached API key: {}", e);
            None
        }
        Err(_) => None,
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line.bright_black());
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_yellow());
    for (name, help) in COMMANDS {
        println!("  {} {}", name.bright_cyan(), help.bright_black());
    }
    println!("  {} {}", "quit".bright_cyan(), "leave the chat".bright_black());
}

/// The main entry point for the StackChat REPL.
///
/// 1. Loads `config.toml` and waits for the GPUStack server with the
///    interactive retry policy
/// 2. Selects the first running model
/// 3. Runs chat turns one at a time, with slash commands for models,
///    parameters and usage statistics
#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging();

    // ===== Backend Initialization =====
    let config_service = ConfigService::new().context("Failed to locate config directory")?;
    let config = config_service
        .get_config()
        .with_context(|| format!("Invalid configuration in {}", config_service.path().display()))?;
    tracing::info!("[Bootstrap] Using GPUStack API at {}", config.backend.base_url);

    let client = BackendClient::from_config(&config.backend).with_api_key(resolve_api_key(&config));
    let backend: Arc<dyn Backend> = Arc::new(client);
    let setup = ModelSetupService::new(Arc::clone(&backend));
    let orchestrator = ChatTurnOrchestrator::new(Arc::clone(&backend));

    println!("{}", "=== StackChat ===".bright_magenta().bold());
    println!(
        "{}",
        format!("Connecting to {}", config.backend.base_url).bright_black()
    );

    let ready = setup
        .wait_until_ready(&config.chat.startup_retry, |attempt| {
            println!(
                "{}",
                format!(
                    "Attempting to connect... ({}/{}) {}",
                    attempt.attempt, attempt.max_attempts, attempt.readiness
                )
                .yellow()
            );
        })
        .await;

    if !ready {
        println!("{}", "Cannot connect to the GPUStack server.".red());
        println!("{}", "Start it with: gpustack start".bright_yellow());
        return Ok(());
    }

    // ===== Model Selection =====
    let running = match setup.model_availability().await {
        Ok(ModelAvailability::Running(models)) => models,
        Ok(ModelAvailability::NoneDeployed) => {
            println!("{}", "No models are deployed.".yellow());
            println!("{}", "Deploy one with: stackchat setup".bright_yellow());
            return Ok(());
        }
        Ok(ModelAvailability::NoneRunning { deployed }) => {
            println!(
                "{}",
                format!("{} model(s) deployed, but none is running yet.", deployed.len()).yellow()
            );
            println!("{}", "Wait for a deployment to finish, then try again.".bright_yellow());
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}", format!("Failed to list models: {}", e).red());
            return Ok(());
        }
    };

    let params = config
        .chat
        .generation_params()
        .context("Invalid [chat] parameters in config.toml")?;
    let mut session = Session::with_settings(config.chat.system_prompt.clone(), params);
    if let Some(first) = running.first() {
        session.select_model(first.id.clone());
    }
    tracing::info!("[Bootstrap] Session {} started", session.id());

    // ===== REPL Setup =====
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!(
        "{}",
        format!("Model: {}", session.active_model().unwrap_or("(none)")).bright_green()
    );
    println!(
        "{}",
        "Type a message to chat, '/help' for commands, or 'quit' to exit.".bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                match ReplCommand::parse(trimmed) {
                    Some(Ok(command)) => run_command(command, &mut session, backend.as_ref()).await,
                    Some(Err(e)) => println!("{}", e.to_string().yellow()),
                    None => chat(&orchestrator, &mut session, trimmed).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

async fn chat(orchestrator: &ChatTurnOrchestrator, session: &mut Session, input: &str) {
    println!("{}", "Thinking...".bright_black());

    match orchestrator.run_turn(session, input).await {
        Ok(TurnOutcome::Completed(turn)) => {
            for line in turn.reply.lines() {
                println!("{}", line.bright_blue());
            }
            println!(
                "{}",
                format!(
                    "(~{} tokens, {:.2}s)",
                    turn.sample.estimated_tokens, turn.sample.elapsed_seconds
                )
                .bright_black()
            );
        }
        Ok(TurnOutcome::Failed(failure)) if failure.is_warning() => {
            println!("{}", format!("Warning: {}", failure.message()).yellow());
            println!("{}", "Try rephrasing the question.".bright_black());
        }
        Ok(TurnOutcome::Failed(failure)) if failure.is_disconnected() => {
            eprintln!("{}", "Lost connection to the GPUStack server.".red());
            eprintln!("{}", "Check that it is still running (gpustack start).".bright_yellow());
        }
        Ok(TurnOutcome::Failed(failure)) => {
            eprintln!("{}", format!("Error: {}", failure.message()).red());
        }
        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
    }
}

async fn run_command(command: ReplCommand, session: &mut Session, backend: &dyn Backend) {
    match command {
        ReplCommand::Models => match backend.list_running_models().await {
            Ok(models) => print_lines(display::model_lines(&models, session.active_model())),
            Err(e) => eprintln!("{}", format!("Failed to list models: {}", e).red()),
        },
        ReplCommand::Model(id) => match backend.list_running_models().await {
            Ok(models) if models.iter().any(|m| m.id == id) => {
                println!("{}", format!("Switched to {}", id).bright_green());
                session.select_model(id);
            }
            Ok(_) => println!("{}", format!("{} is not running. See /models.", id).yellow()),
            Err(e) => eprintln!("{}", format!("Failed to list models: {}", e).red()),
        },
        ReplCommand::Temperature(value) => {
            report_update(session.set_temperature(value), "temperature")
        }
        ReplCommand::MaxTokens(value) => {
            report_update(session.set_max_tokens(value), "max_tokens")
        }
        ReplCommand::TopP(value) => report_update(session.set_top_p(value), "top_p"),
        ReplCommand::System(prompt) => {
            session.set_system_prompt(prompt);
            println!("{}", "System prompt updated.".bright_green());
        }
        ReplCommand::Params => print_lines(display::params_lines(session)),
        ReplCommand::Stats => print_lines(display::stats_lines(session.usage())),
        ReplCommand::Metrics => match backend.fetch_usage_metrics().await {
            Ok(metrics) => match serde_json::to_string_pretty(&metrics) {
                Ok(text) => println!("{}", text.bright_black()),
                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
            },
            Err(e) => eprintln!("{}", format!("Failed to fetch metrics: {}", e).red()),
        },
        ReplCommand::Help => print_help(),
    }
}

fn report_update(result: stackchat_core::Result<()>, name: &str) {
    match result {
        Ok(()) => println!("{}", format!("{} updated.", name).bright_green()),
        Err(e) => println!("{}", e.to_string().yellow()),
    }
}
