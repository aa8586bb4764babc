//! Audit sink implementations.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{AuditError, AuditLogEntry, AuditSink};

/// Emits each entry as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        info!(
            provider = entry.provider_id.as_deref().unwrap_or(""),
            request_type = entry.request_type,
            method = %entry.method,
            status_code = entry.status_code,
            error_message = entry.error_message.as_deref().unwrap_or(""),
            request_data = %entry.request_data,
            response_data = %entry.response_data,
            timestamp = %entry.timestamp.to_rfc3339(),
            "webhook_audit"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlAuditSink {
    path: PathBuf,
    file: tokio::sync::Mutex<File>,
}

impl JsonlAuditSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        // One write per line under the lock so concurrent calls never interleave.
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps entries in memory. Clones share the same entries.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}
