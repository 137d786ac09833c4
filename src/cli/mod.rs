mod admin;
mod markdown;
mod output;
mod repl;
mod settings_form;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::chat::{ChatController, ControllerOptions, ImageAttachment, UiEvent};
use crate::client::HttpBackend;
use crate::core::config::{load_config, AppConfig};
use crate::core::settings::Settings;
use crate::storage::{Database, KeyValueStore, MemoryStore};
use crate::voice::{default_speaker, negotiate, Speaker, VoiceInput};

#[derive(Parser, Debug)]
#[command(name = "nao", version, about = "Terminal chat client for a language-model backend")]
struct Cli {
    /// Non-interactive mode: send one message and print the answer
    #[arg(short, long)]
    prompt: Option<String>,

    /// Image to attach to the message (implies non-interactive mode)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Continue a backend session by ID
    #[arg(long)]
    session: Option<String>,

    /// Backend URL (saved to settings)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Model to use (saved to settings)
    #[arg(short, long)]
    model: Option<String>,

    /// Keep all local state in memory for this run
    #[arg(long)]
    ephemeral: bool,

    /// Working directory
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

pub struct App {
    pub controller: Arc<ChatController>,
    pub events: mpsc::UnboundedReceiver<UiEvent>,
    pub voice: Option<Arc<dyn VoiceInput>>,
    pub speaker: Arc<dyn Speaker>,
    pub config: AppConfig,
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.working_dir.clone()).map_err(|e| anyhow::anyhow!("{e}"))?;
    config.debug |= cli.debug;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut app = build_app(config, cli.ephemeral).await?;

    if cli.endpoint.is_some() || cli.model.is_some() {
        let mut settings = app.controller.settings();
        if let Some(endpoint) = cli.endpoint {
            settings.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }
        if let Some(model) = cli.model {
            settings.model = model;
        }
        app.controller.update_settings(settings).await?;
    }

    if let Some(id) = &cli.session {
        app.controller.load_session(id).await?;
    }

    if cli.prompt.is_some() || cli.image.is_some() {
        let prompt = cli.prompt.unwrap_or_default();
        run_once(&mut app, &prompt, cli.image).await
    } else {
        repl::run(app).await
    }
}

async fn build_app(config: AppConfig, ephemeral: bool) -> Result<App> {
    let store: Arc<dyn KeyValueStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        let db = Database::open(&config)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        db.run_migrations()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Arc::new(db.kv())
    };

    let backend = Arc::new(
        HttpBackend::new(
            &config.default_endpoint,
            Duration::from_secs(config.request_timeout_secs),
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?,
    );
    let speaker = default_speaker();
    let options = ControllerOptions {
        session_list_limit: config.session_list_limit,
        default_settings: Settings {
            endpoint: config.default_endpoint.clone(),
            ..Settings::default()
        },
    };

    let (controller, events) =
        ChatController::start(backend.clone(), store, speaker.clone(), options).await?;
    let voice = negotiate(&config.voice, backend);

    Ok(App {
        controller: Arc::new(controller),
        events,
        voice,
        speaker,
        config,
    })
}

/// Sends one message and prints the answer to stdout.
async fn run_once(app: &mut App, prompt: &str, image: Option<PathBuf>) -> Result<()> {
    if let Some(path) = image {
        app.controller.attach_image(ImageAttachment::from_path(&path)?);
    }

    let reply = app.controller.send(prompt).await;
    while let Ok(event) = app.events.try_recv() {
        if let UiEvent::Notice { level, text } = event {
            tracing::debug!(?level, %text, "notice");
        }
    }

    let reply = reply?;
    if let Some(reasoning) = &reply.reasoning {
        eprintln!("\x1b[3;90m{}\x1b[0m", reasoning.short);
    }
    println!("{}", reply.answer);
    Ok(())
}
