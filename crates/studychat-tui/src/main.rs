mod app;
mod handler;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use studychat_core::config::{BACKEND_URL_ENV, MODEL_ENV};
use studychat_core::{ApiClient, ChatSession, Config, QuizWorkspace};

use app::App;
use tui::{EventHandler, TICK_RATE};

#[derive(Parser)]
#[command(name = "studychat")]
#[command(version, about = "Chat with your study material and quiz yourself on PDFs")]
struct Cli {
    /// Base URL of the chat/quiz backend
    #[arg(long, env = BACKEND_URL_ENV)]
    backend_url: Option<String>,

    /// Model name sent with every chat request
    #[arg(short, long, env = MODEL_ENV)]
    model: Option<String>,

    /// Read settings from this file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remember --model as the default for future runs
    #[arg(long, requires = "model")]
    save_model: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_overrides(cli.backend_url, cli.model);

    if cli.save_model {
        if let Some(model) = &config.model {
            match &cli.config {
                Some(path) => Config::save_model_to(path, model),
                None => Config::save_default_model(model),
            }
            .context("Failed to save default model")?;
        }
    }

    // The terminal belongs to the UI, so logs go to a file.
    init_logging(&config.log_file()?)?;

    let client = Arc::new(ApiClient::new(config.backend_url())?);
    tracing::info!(backend_url = %config.backend_url(), model = ?config.model, "starting studychat");

    let (session_tx, mut session_rx) = mpsc::unbounded_channel();
    let (quiz_tx, mut quiz_rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::clone(&client), config.settings(), session_tx);
    let quiz = QuizWorkspace::new(client, config.retry_policy(), quiz_tx);

    let mut app = App::new(session, quiz);
    app.start();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            tokio::select! {
                Some(event) = events.next() => handler::handle_event(&mut app, event)?,
                Some(event) = session_rx.recv() => app.on_session_event(event),
                Some(event) = quiz_rx.recv() => app.on_quiz_event(event),
                else => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    tracing::info!("studychat exited");
    result
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("studychat=info,studychat_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(())
}
