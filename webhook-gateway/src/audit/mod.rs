//! Audit trail for inbound webhook calls.
//!
//! Every webhook call produces exactly one [`AuditLogEntry`], whatever the
//! outcome. Writing the entry is best effort: a sink failure is logged and
//! never changes the response returned to the provider.

pub mod sinks;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

pub use sinks::{JsonlAuditSink, MemoryAuditSink, TracingAuditSink};

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    /// `None` when the call did not name a service.
    pub provider_id: Option<String>,
    pub request_type: &'static str,
    pub method: String,
    pub request_data: Value,
    pub response_data: Value,
    pub status_code: u16,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError>;
}

/// Builds entries and hands them to the configured sink.
pub struct AuditLogger {
    sink: Box<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    pub async fn record(
        &self,
        provider_id: Option<&str>,
        method: &str,
        request_data: Value,
        response_data: Value,
        status_code: u16,
        error_message: Option<String>,
    ) {
        let entry = AuditLogEntry {
            provider_id: provider_id.map(str::to_string),
            request_type: "webhook",
            method: method.to_string(),
            request_data,
            response_data,
            status_code,
            error_message,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.sink.append(entry).await {
            error!(
                provider = provider_id.unwrap_or(""),
                status_code = status_code,
                error = %e,
                "audit_write_failed"
            );
        }
    }
}
