//! Operational helpers: logging setup and the session event journal.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{stream::BoxStream, StreamExt};
use guessme_types::{config::OpsConfig, events::SessionEvent, GuessmeError, Result};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// With `quiet` set and no log file, nothing is installed so a full-screen
/// terminal UI keeps its screen to itself.
pub fn init_tracing(config: &OpsConfig, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))?;

    match &config.log_file {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_state_dir(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| ops_error(format!("failed to open log file: {err}")))?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
                .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
        }
        None if quiet => {}
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
        }
    }
    Ok(())
}

pub fn ensure_state_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = path.as_ref().to_path_buf();
    fs::create_dir_all(&dir)
        .map_err(|err| ops_error(format!("failed to create state dir: {err}")))?;
    info!("State directory ready at {:?}", dir);
    Ok(dir)
}

/// In-memory record of session events, dumpable as JSON lines.
#[derive(Clone, Default)]
pub struct EventJournal {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: SessionEvent) {
        self.events.lock().await.push(event);
    }

    pub async fn snapshot(&self) -> Vec<SessionEvent> {
        self.events.lock().await.clone()
    }

    /// Record everything a controller publishes until its stream ends.
    pub fn follow(&self, mut events: BoxStream<'static, SessionEvent>) -> JoinHandle<()> {
        let journal = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                journal.record(event).await;
            }
        })
    }

    /// One JSON object per line. Returns the number of events written.
    pub async fn write_jsonl(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_state_dir(parent)?;
        }
        let events = self.snapshot().await;
        let mut body = Vec::new();
        for event in &events {
            serde_json::to_writer(&mut body, event)
                .map_err(|err| ops_error(format!("failed to encode event: {err}")))?;
            body.write_all(b"\n")
                .map_err(|err| ops_error(err.to_string()))?;
        }
        fs::write(path, body)
            .map_err(|err| ops_error(format!("failed to write journal: {err}")))?;
        info!(events = events.len(), path = %path.display(), "journal written");
        Ok(events.len())
    }
}

pub fn ops_error(message: impl Into<String>) -> GuessmeError {
    GuessmeError::Ops(message.into())
}
