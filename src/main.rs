use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use artvision_core::{Config, ImageRef, Session};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "artvision")]
#[command(about = "Chat with an AI art analysis service from the terminal")]
#[command(version)]
struct Cli {
    /// Analysis service base URL (overrides ARTVISION_ENDPOINT and the config file)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an image of an artwork and print the report
    Analyze {
        /// Path to the image file
        path: PathBuf,
    },
    /// Send a single chat message and print the reply
    Chat {
        /// Your message
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal, so its logs go to a file
    let log_path = if cli.command.is_none() {
        Some(init_file_logging(cli.debug)?)
    } else {
        init_stderr_logging(cli.debug);
        None
    };

    let config = Config::load().context("failed to load config")?;
    let endpoint = config.resolve_endpoint(cli.endpoint.as_deref());
    let session = Session::connect(&endpoint, config.request_timeout())?;

    match cli.command {
        None => {
            if let Some(log_path) = log_path {
                tracing::info!(%endpoint, log = %log_path.display(), "starting ArtVision");
            }
            run_tui(session, endpoint).await
        }
        Some(Commands::Analyze { path }) => {
            let image = ImageRef::open(&path)?;
            println!("🔍 Analyzing {} with {}...\n", image, endpoint);
            let delivered = session.submit_image(image).await;
            print_reply(&session, delivered)
        }
        Some(Commands::Chat { message }) => {
            if message.trim().is_empty() {
                bail!("message is empty");
            }
            let delivered = session.submit_text(&message).await;
            print_reply(&session, delivered)
        }
    }
}

async fn run_tui(session: Session, endpoint: String) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    // Every change to the log scrolls the chat to the newest message
    tui::watch_conversation(session.store(), events.sender());

    let mut app = App::new(session, endpoint);

    let result = async {
        loop {
            app.reap_request_task();
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }

            if app.should_quit {
                break;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if let Some(task) = app.request_task.take() {
        task.abort();
    }
    tui::restore()?;
    result
}

fn print_reply(session: &Session, delivered: bool) -> Result<()> {
    let reply = session
        .store()
        .last()
        .and_then(|m| m.content().map(str::to_string))
        .unwrap_or_default();

    println!("{}", reply);
    if !delivered {
        bail!("request to the analysis service failed");
    }
    Ok(())
}

fn env_filter(debug: bool) -> EnvFilter {
    let default_filter = if debug { "debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

fn init_stderr_logging(debug: bool) {
    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Log to `artvision.log` in the platform data directory
fn init_file_logging(debug: bool) -> Result<PathBuf> {
    let log_dir = dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("artvision");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;

    let log_path = log_dir.join("artvision.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_connect_is_logged_when_logging_starts_first() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("debug"))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || sink.clone()),
            );

        let session = tracing::subscriber::with_default(subscriber, || {
            Session::connect("http://127.0.0.1:9/", None)
        })
        .unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("session connected"), "logs: {logs}");
        assert!(logs.contains("http://127.0.0.1:9"));
        assert!(session.store().is_empty());
    }
}
