//! CLI subcommand implementations for the `fogcover` binary.

pub mod doctor;
pub mod metrics_cmd;
pub mod output;
pub mod persona_cmd;
pub mod run_cmd;
pub mod session_cmd;
pub mod settings_cmd;
pub mod status;
pub mod stop;

use crate::commands::Commands;
use crate::config::RuntimeConfig;
use crate::provider::generator::GeminiClient;
use crate::provider::TargetProvider;
use crate::renderer::chromium::ChromiumRenderer;
use crate::runner::events::ActivityEvent;
use crate::runner::SessionRunner;
use crate::stealth::random::ThreadRandom;
use crate::store::{KvStore, SharedState};
use anyhow::{Context, Result};
use output::Styled;
use std::sync::Arc;

/// Initialize tracing with `fogcover=info` plus any `RUST_LOG` directives.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "fogcover=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // Structured lines for log shippers.
    if std::env::var("FOGCOVER_LOG_JSON").is_ok() {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Open the persistent state under the configured home.
pub fn open_state(config: &RuntimeConfig) -> Result<SharedState> {
    let store = KvStore::open(&config.db_path())
        .with_context(|| format!("failed to open store at {}", config.db_path().display()))?;
    SharedState::load(Arc::new(store), config.gemini_api_key.clone())
}

/// Everything a browsing process needs, wired together.
pub struct Engine {
    pub config: RuntimeConfig,
    pub state: SharedState,
    pub runner: SessionRunner,
    pub commands: Commands,
}

impl Engine {
    pub fn open(config: RuntimeConfig) -> Result<Self> {
        let state = open_state(&config)?;
        let renderer = Arc::new(ChromiumRenderer::new(
            config.profiles_dir(),
            config.chromium_path.clone(),
            config.headless,
        ));
        let mut client = GeminiClient::new();
        if let Some(model) = &config.gemini_model {
            client = client.with_model(model.clone());
        }
        let provider = Arc::new(TargetProvider::new(Arc::new(client), state.clone()));
        let runner = SessionRunner::new(
            renderer,
            provider,
            state.clone(),
            Arc::new(ThreadRandom),
            config.runner_options(),
        );
        let commands = Commands::new(runner.clone(), state.clone());
        Ok(Self {
            config,
            state,
            runner,
            commands,
        })
    }
}

/// One console line per activity event.
pub fn format_event(s: &Styled, event: &ActivityEvent) -> String {
    let time = event.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S");
    let kind = format!("{:<6}", event.kind.to_string());
    format!(
        "  {} {} {} {}",
        s.dim(&time.to_string()),
        s.cyan(&kind),
        s.bold(&event.persona_name),
        event.details
    )
}
