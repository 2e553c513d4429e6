use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;

use colloquy::config::Config;
use colloquy::{BackendRegistry, CanonicalEvent, Conversation, InvocationRequest};

#[derive(Parser)]
#[command(name = "colloquy")]
#[command(about = "Converse with coding-agent CLIs through one canonical event stream")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to a backend and stream the reply
    Run {
        /// The prompt to answer
        prompt: String,

        /// Backend to use (defaults to the configured default)
        #[arg(short, long)]
        backend: Option<String>,

        /// Model identifier override
        #[arg(long)]
        model: Option<String>,

        /// Operating mode (permission mode) override
        #[arg(long)]
        mode: Option<String>,

        /// Backend session id to resume
        #[arg(long)]
        resume: Option<String>,
    },

    /// List backends and their availability
    Backends,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            prompt,
            backend,
            model,
            mode,
            resume,
        } => run_command(&config, prompt, backend, model, mode, resume).await,
        Commands::Backends => backends_command(&config),
    }
}

async fn run_command(
    config: &Config,
    prompt: String,
    backend: Option<String>,
    model: Option<String>,
    mode: Option<String>,
    resume: Option<String>,
) -> Result<()> {
    let registry = BackendRegistry::with_defaults();
    let backend_id = backend.unwrap_or_else(|| config.default_backend.clone());
    let adapter = registry
        .get(&backend_id)
        .with_context(|| format!("unknown backend `{backend_id}`"))?;
    let backend_config = config.backend(&backend_id);

    let request = InvocationRequest::new(Conversation::from_user_prompt(prompt))
        .with_model(model)
        .with_permission_mode(mode)
        .with_resume_session(resume);

    let (event_tx, mut event_rx) = mpsc::channel::<CanonicalEvent>(64);
    let printer = tokio::spawn(async move {
        use std::io::Write;
        let mut stdout = std::io::stdout();
        while let Some(event) = event_rx.recv().await {
            match event {
                CanonicalEvent::BlockStart { .. } => {}
                CanonicalEvent::BlockDelta { text, .. } => {
                    let _ = write!(stdout, "{text}");
                    let _ = stdout.flush();
                }
                CanonicalEvent::BlockEnd { .. } => {
                    let _ = writeln!(stdout);
                }
                CanonicalEvent::ToolCall { name, .. } => {
                    tracing::info!(tool = %name, "tool call");
                }
                CanonicalEvent::ToolResult { id, unmatched, .. } => {
                    tracing::info!(id = %id, unmatched, "tool result");
                }
                CanonicalEvent::Finish { reason, usage } => {
                    tracing::info!(
                        reason = reason.as_str(),
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "invocation finished"
                    );
                }
                CanonicalEvent::Error { detail, .. } => {
                    tracing::error!(detail = %detail, "invocation failed");
                }
            }
        }
    });

    let summary = adapter.run(&request, &backend_config, event_tx).await?;
    let _ = printer.await;

    if let Some(session_id) = summary.session_id.as_deref() {
        tracing::info!(session_id, "session can be resumed with --resume");
    }
    if !summary.success {
        anyhow::bail!(
            summary
                .error
                .unwrap_or_else(|| "invocation failed".to_string())
        );
    }
    Ok(())
}

fn backends_command(config: &Config) -> Result<()> {
    let registry = BackendRegistry::with_defaults();
    for id in registry.ids() {
        let Some(adapter) = registry.get(id) else {
            continue;
        };
        let backend_config = config.backend(id);
        let status = if adapter.is_available() {
            "available"
        } else {
            "not found"
        };
        println!("{:<12} {:<32} {}", id, backend_config.get_binary(id), status);
    }
    Ok(())
}
