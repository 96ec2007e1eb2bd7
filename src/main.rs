use anyhow::Result;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use termtabs::collaborators::{FsDirectoryResolver, SystemExecutor};
use termtabs::config::Config;
use termtabs::events::{handle_event, EventOutcome, UiEvent, WindowControl};
use termtabs::registry::{ActiveSession, SessionRegistry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt::format::FmtSpan, FmtSubscriber};

fn setup_logging(log_level_str: &str) {
    let level = match log_level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("termtabs={}", level)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_span_events(FmtSpan::CLOSE)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Stand-in for window chrome when running on a plain terminal.
#[derive(Default)]
struct HeadlessWindow {
    closing: AtomicBool,
}

impl HeadlessWindow {
    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

impl WindowControl for HeadlessWindow {
    fn minimize(&self) {
        tracing::debug!("Minimize requested; no window to minimize");
    }

    fn toggle_maximize(&self) {
        tracing::debug!("Maximize requested; no window to maximize");
    }

    fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    fn focus_input(&self) {}
}

fn parse_line(line: &str, registry: &SessionRegistry) -> Vec<UiEvent> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some(":new") => vec![UiEvent::NewTab],
        Some(":close") => vec![UiEvent::CloseTab(None)],
        Some(":up") => vec![UiEvent::HistoryUp],
        Some(":down") => vec![UiEvent::HistoryDown],
        Some(":quit") => vec![UiEvent::CloseWindow],
        // A bare Enter submits whatever was recalled into the input line.
        None => vec![UiEvent::Submit],
        Some(":tab") => {
            let ids = registry.ids();
            words
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| ids.get(index).copied())
                .map(|id| vec![UiEvent::SelectTab(id)])
                .unwrap_or_default()
        }
        _ => vec![UiEvent::InputChanged(line.to_string()), UiEvent::Submit],
    }
}

fn print_tabs(registry: &SessionRegistry) {
    let active = registry.active_id();
    for (position, session) in registry.sessions().iter().enumerate() {
        let marker = if Some(session.id) == active { '*' } else { ' ' };
        println!(
            "{} {} {} ({} commands{})",
            marker,
            position + 1,
            session.current_directory,
            session.command_history.len(),
            if session.is_busy { ", busy" } else { "" }
        );
    }
}

fn print_prompt(registry: &SessionRegistry) -> Result<()> {
    if let ActiveSession::Ready(session) = registry.active_session() {
        print!("{}> {}", session.current_directory, session.pending_input);
        std::io::stdout().flush()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    setup_logging(&config.log_level);

    tracing::info!(version = %env!("CARGO_PKG_VERSION"), platform = ?config.platform, "Starting termtabs");
    tracing::debug!("Loaded configuration: {:?}", config);

    let shell = config.platform.shell_program();
    if which::which(shell).is_err() {
        tracing::warn!(shell = %shell, "Shell is not installed or not in PATH. Commands will fail to spawn.");
    }

    let mut registry = SessionRegistry::new(&config, Arc::new(SystemExecutor), Arc::new(FsDirectoryResolver));
    let first = registry.bootstrap();
    registry.settle_directory(first).await;

    let window = HeadlessWindow::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_prompt(&registry)?;

    while let Some(line) = lines.next_line().await? {
        if line.trim() == ":tabs" {
            print_tabs(&registry);
            print_prompt(&registry)?;
            continue;
        }

        for event in parse_line(&line, &registry) {
            let before = registry.active_id().and_then(|id| registry.snapshot(id));
            let is_new_tab = event == UiEvent::NewTab;

            match handle_event(&mut registry, &window, event) {
                EventOutcome::Dispatched(task) => {
                    task.await?;
                    if let Some(before) = before {
                        if let Some(after) = registry.snapshot(before.id) {
                            // Skip the echoed line; the prompt already shows it.
                            let seen = before.output_log.len() + 1;
                            for entry in after.output_log.iter().skip(seen) {
                                println!("{}", entry.trim_end_matches('\n'));
                            }
                        }
                    }
                }
                EventOutcome::WindowClosing => break,
                EventOutcome::Handled if is_new_tab => {
                    if let Some(id) = registry.active_id() {
                        registry.settle_directory(id).await;
                    }
                }
                EventOutcome::Handled | EventOutcome::Ignored => {}
            }
        }

        if window.is_closing() {
            break;
        }
        print_prompt(&registry)?;
    }

    tracing::info!(sessions = registry.len(), "Shutting down");
    Ok(())
}
