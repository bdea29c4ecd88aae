//! `taskboard`: headless board watcher.
//!
//! Loads the board from the REST task service, polls it, and prints the
//! three columns whenever the cache changes. Stops on Ctrl-C.
//!
//! ```bash
//! cargo run --bin taskboard -- --server-url http://127.0.0.1:8080/api/
//!
//! # Or via environment variables
//! TASKBOARD_SERVER_URL=http://127.0.0.1:8080/api/ cargo run --bin taskboard
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::board::{Board, BoardSettings};
use taskboard::config::{BoardConfig, CliArgs};
use taskboard::persist::{FilterStore, InMemoryFilterStore, JsonFileStore};
use taskboard::schedule::TokioScheduler;
use taskboard::service::http::HttpTaskService;
use taskboard::tasks::BoardColumns;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match BoardConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let base_url = match config.server_url() {
        Ok(Some(url)) => url,
        Ok(None) => {
            eprintln!("No server configured; pass --server-url or set [server] base_url");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let service = match HttpTaskService::new(base_url, config.request_timeout) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Could not build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let store: Box<dyn FilterStore> = match &config.filter_store_path {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(InMemoryFilterStore::new()),
    };

    tracing::info!(url = %service.base_url(), "taskboard watcher starting");
    let board = Arc::new(Board::new(
        Arc::new(service),
        store,
        BoardSettings::from(&config),
    ));

    if let Err(e) = board.load().await {
        tracing::warn!(error = %e, "initial load failed, waiting for the next poll");
        eprintln!(
            "Initial load failed ({e}); retrying every {}s",
            config.poll_interval.as_secs()
        );
    }
    board.start_polling(&TokioScheduler);

    let (render_tx, mut render_rx) = mpsc::channel(config.change_buffer);
    let forwarder = tokio::spawn({
        let board = Arc::clone(&board);
        let mut revisions = board.subscribe();
        async move {
            let _ = render_tx.send(board.columns()).await;
            while revisions.changed().await.is_ok() {
                revisions.borrow_and_update();
                if render_tx.send(board.columns()).await.is_err() {
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            columns = render_rx.recv() => {
                let Some(columns) = columns else { break };
                print_columns(&columns);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    forwarder.abort();
    board.teardown();
    tracing::info!("taskboard watcher exiting");
    ExitCode::SUCCESS
}

/// Initialize file-based logging.
///
/// Stdout carries the board; logs go to a file. Returns a [`WorkerGuard`]
/// that must be held until shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn print_columns(columns: &BoardColumns) {
    println!();
    for (status, tasks) in columns.iter() {
        println!("== {status} ({}) ==", tasks.len());
        for task in tasks {
            let due = task
                .due_date
                .map(|d| format!(" due {d}"))
                .unwrap_or_default();
            let assignee = task
                .assignee_id
                .as_ref()
                .map(|a| format!(" @{a}"))
                .unwrap_or_default();
            println!("  [{}] {}{due}{assignee}", task.priority, task.title);
        }
    }
}
