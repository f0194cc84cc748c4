//! Diagnostic side artifacts.
//!
//! Pipeline components never touch the filesystem for diagnostics. They hand
//! a [`DiagnosticEvent`] to whatever [`DiagnosticSink`] they were given, and the
//! sink decides where it goes. Recording never fails from the caller's point
//! of view: artifacts are for operators and must not change the outcome of a
//! run.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// Browser state at a failure point: `<tag>.png` and `<tag>.html`.
    Snapshot {
        tag: String,
        screenshot: Option<Vec<u8>>,
        page_source: String,
    },
    /// Raw scraped payload, e.g. `orders.json`.
    Payload {
        name: String,
        body: serde_json::Value,
    },
    /// Full error body from a rejected store write: `<store>-error.txt`.
    StoreError { store: String, detail: String },
}

impl DiagnosticEvent {
    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            DiagnosticEvent::Snapshot { tag, .. } => tag,
            DiagnosticEvent::Payload { name, .. } => name,
            DiagnosticEvent::StoreError { store, .. } => store,
        }
    }
}

#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn record(&self, event: DiagnosticEvent);
}

/// Writes artifacts into a single directory.
#[derive(Debug, Clone)]
pub struct FileDiagnosticSink {
    dir: PathBuf,
}

impl FileDiagnosticSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn persist(&self, event: &DiagnosticEvent) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        match event {
            DiagnosticEvent::Snapshot {
                tag,
                screenshot,
                page_source,
            } => {
                let stem = file_stem(tag);
                if let Some(png) = screenshot {
                    written.push(self.write(&format!("{stem}.png"), png).await?);
                }
                written.push(
                    self.write(&format!("{stem}.html"), page_source.as_bytes())
                        .await?,
                );
            }
            DiagnosticEvent::Payload { name, body } => {
                let pretty = serde_json::to_vec_pretty(body).map_err(std::io::Error::other)?;
                written.push(self.write(&file_stem(name), &pretty).await?);
            }
            DiagnosticEvent::StoreError { store, detail } => {
                let file_name = format!("{}-error.txt", file_stem(store));
                written.push(self.write(&file_name, detail.as_bytes()).await?);
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl DiagnosticSink for FileDiagnosticSink {
    async fn record(&self, event: DiagnosticEvent) {
        match self.persist(&event).await {
            Ok(paths) => {
                for path in paths {
                    tracing::info!(path = %path.display(), "wrote diagnostic artifact");
                }
            }
            Err(e) => {
                tracing::warn!(
                    label = event.label(),
                    dir = %self.dir.display(),
                    error = %e,
                    "failed to write diagnostic artifact"
                );
            }
        }
    }
}

/// Keeps events in memory. Used as a test double and for dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Labels of every recorded event, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.label().to_string())
            .collect()
    }
}

#[async_trait]
impl DiagnosticSink for MemorySink {
    async fn record(&self, event: DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Keeps tags usable as file names on every platform.
fn file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}
