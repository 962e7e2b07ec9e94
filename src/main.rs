//! fxconvert - Real-time currency conversion in the terminal
//!
//! Without a subcommand this starts the interactive converter; the `convert`,
//! `list`, `history` and `cache` subcommands run once and print to stdout.

mod app;
mod ui;

use std::fs::{self, OpenOptions};
use std::io;
use std::panic;
use std::path::Path;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use app::{Action, App, AppState, HISTORY_DAYS};
use fxconvert::cache::RateStore;
use fxconvert::cli::{Cli, StartupConfig};
use fxconvert::commands;
use fxconvert::config::Config;
use fxconvert::data::RateFetcher;
use fxconvert::engine::ConversionEngine;

/// Log file written by the interactive converter
const LOG_FILE: &str = "fxconvert.log";

fn env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Sends logs to stderr for one-shot subcommands
fn init_stderr_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Sends logs to a file in the cache directory so they don't draw over the TUI.
/// Logging is skipped if the file cannot be opened.
fn init_file_logging(filter: &str, dir: &Path) {
    let file = fs::create_dir_all(dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
    });

    if let Ok(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(filter))
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
}

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Renders the UI based on the current application state
fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    match app.state {
        AppState::Loading => ui::render_loading(frame),
        AppState::Form => ui::render_converter(frame, app),
    }

    if app.show_help {
        ui::render_help_overlay(frame);
    }
}

/// Runs an action queued by the UI and hands the outcome back to it
async fn run_action<F, S>(engine: &mut ConversionEngine<F, S>, app: &mut App, action: Action)
where
    F: RateFetcher,
    S: RateStore,
{
    match action {
        Action::Convert(request) => {
            debug!(from = %request.from, to = %request.to, "converting");
            let outcome = engine.convert(&request).await;
            app.apply_conversion(outcome);
            app.set_currencies(engine.supported_currencies());
            app.cache_info = Some(engine.cache_info());
        }
        Action::History { from, to } => {
            let outcome = engine.history(&from, &to, HISTORY_DAYS).await;
            app.apply_history(outcome);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::from_settings(&cli.settings) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    let mut engine = config.engine();

    if let Some(command) = &cli.command {
        init_stderr_logging(&config.log_filter);

        let mut stdout = io::stdout().lock();
        if let Err(e) = commands::run(&mut engine, command, &mut stdout).await {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return Ok(());
    }

    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    init_file_logging(&config.log_filter, engine.store().cache_dir());
    info!(base = engine.base(), "starting interactive converter");

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app instance and queue the first conversion
    let mut app = App::new(&startup);
    app.set_currencies(engine.supported_currencies());
    app.cache_info = Some(engine.cache_info());
    app.request_conversion();

    // Main event loop
    loop {
        if let Some(action) = app.take_action() {
            app.busy = true;
            terminal.draw(|f| render_ui(f, &app))?;
            run_action(&mut engine, &mut app, action).await;
            app.busy = false;
        }

        // Render UI
        terminal.draw(|f| render_ui(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}
