mod action;
mod aggregate;
mod app;
mod auth;
mod classify;
mod command;
mod config;
mod dataset;
mod detail;
mod error;
mod event;
mod forge;
mod github;
mod tui;
mod types;
mod ui;
mod view;

use std::fs::{self, File, OpenOptions};
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::Action;
use crate::aggregate::Aggregator;
use crate::app::App;
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::AckError;
use crate::event::Event;
use crate::forge::Forge;
use crate::github::GitHub;
use crate::tui::EventHandler;

/// Terminal dashboard of ACK/NACK review consensus on a repository's open pull requests
#[derive(Parser)]
#[command(name = "ackboard", version, about)]
struct Cli {
    /// Repository owner
    owner: String,

    /// Repository name
    name: String,

    /// File holding a GitHub token on its first line
    /// [default: <config dir>/ackboard/token]
    #[arg(short, long)]
    token_file: Option<PathBuf>,

    /// Configuration file [default: <config dir>/ackboard/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging();

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let config = Config::load(cli.config.as_deref())?;
    let classifier = Classifier::new(&config.vocabulary)?;
    let aggregator = Aggregator::new(classifier, &config.general);

    let token_path = cli
        .token_file
        .or_else(auth::default_token_path)
        .ok_or_else(|| AckError::Auth("no token file given and no config directory".to_string()))?;
    let token = auth::load_token_file(&token_path)?;

    let github = GitHub::new(token)?;
    github.check_repository(&cli.owner, &cli.name).await?;
    tracing::info!(forge = github.name(), owner = %cli.owner, repo = %cli.name, "starting dashboard");

    let tick_rate = Duration::from_millis(config.general.tick_rate_ms);

    // Run the application
    let result = run(Arc::new(github), aggregator, cli.owner, cli.name, tick_rate).await;

    // Restore terminal
    tui::restore()?;

    result
}

async fn run(
    forge: Arc<dyn Forge>,
    aggregator: Aggregator,
    owner: String,
    repo: String,
    tick_rate: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize terminal
    let mut terminal = tui::init()?;
    let size = terminal.size()?;

    // Create action channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(
        forge,
        aggregator,
        owner,
        repo,
        (size.width, size.height),
        action_tx.clone(),
    );

    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    // Main loop
    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    app.shutdown();
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app))?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Log to `<cache dir>/ackboard/ackboard.log`, since the dashboard owns the
/// terminal. Falls back to stderr when the file cannot be opened.
fn init_logging() {
    let writer = match open_log_file() {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
}

fn open_log_file() -> Option<File> {
    let dir = dirs::cache_dir()?.join("ackboard");
    fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("ackboard.log"))
        .ok()
}
