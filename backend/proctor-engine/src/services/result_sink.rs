use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

use crate::metrics::RESULT_DELIVERIES_TOTAL;
use crate::models::ScoredAttempt;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Receives every scored attempt exactly once per finalized session.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, attempt: &ScoredAttempt) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Recorded,
    Failed(String),
}

impl DeliveryStatus {
    pub fn is_recorded(&self) -> bool {
        matches!(self, DeliveryStatus::Recorded)
    }
}

/// Hands `attempt` to `sink`, retrying transient failures. A failure here
/// never affects the attempt itself.
pub async fn deliver(
    sink: &dyn ResultSink,
    attempt: &ScoredAttempt,
    retry: RetryConfig,
) -> DeliveryStatus {
    let result =
        retry_async_with_config(retry, "result_sink.record", move || sink.record(attempt)).await;

    match result {
        Ok(()) => {
            RESULT_DELIVERIES_TOTAL.with_label_values(&["recorded"]).inc();
            tracing::info!(
                session_id = %attempt.session_id,
                assessment_id = %attempt.assessment_id,
                "Scored attempt delivered"
            );
            DeliveryStatus::Recorded
        }
        Err(e) => {
            RESULT_DELIVERIES_TOTAL.with_label_values(&["failed"]).inc();
            tracing::error!(
                session_id = %attempt.session_id,
                assessment_id = %attempt.assessment_id,
                "Scored attempt could not be delivered: {:#}",
                e
            );
            DeliveryStatus::Failed(format!("{:#}", e))
        }
    }
}

/// Keeps attempts in memory. Used by tests and the replay harness.
#[derive(Default)]
pub struct MemoryResultSink {
    records: Mutex<Vec<ScoredAttempt>>,
    recorded: Notify,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ScoredAttempt> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until at least `count` attempts have been recorded.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.recorded.notified();
            if self.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn record(&self, attempt: &ScoredAttempt) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(attempt.clone());
        self.recorded.notify_waiters();
        Ok(())
    }
}

/// Appends one JSON document per attempt to a file.
pub struct JsonLinesResultSink {
    path: PathBuf,
}

impl JsonLinesResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonLinesResultSink {
    async fn record(&self, attempt: &ScoredAttempt) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(attempt).context("Failed to serialize attempt")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to append attempt")?;
        file.flush().await.context("Failed to flush results file")?;
        Ok(())
    }
}
