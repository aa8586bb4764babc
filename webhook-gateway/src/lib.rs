//! Webhook ingestion gateway.
//!
//! Receives webhooks from payment, messaging and shipping providers on one
//! endpoint, verifies each provider's signature over the raw body, decodes
//! the payload into a typed event and hands it to that provider's handler.
//!
//! ## Architecture
//!
//! ```text
//! HTTP → web → pipeline → signature → event → process → store
//!                  └──────────────→ audit
//! ```
//!
//! A provider is trusted only when it has both a verifier and a handler
//! registered. Anything else fails closed.

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod process;
pub mod provider;
pub mod request;
pub mod signature;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use audit::{AuditLogger, AuditSink, JsonlAuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::Config;
pub use error::GatewayError;
pub use event::{parse, ParsedEvent, Payload, ProviderEvent};
pub use pipeline::{Gateway, GatewayResponse, InboundCall, WebhookResponse};
pub use process::{EventRouter, Handler, ProcessingResult};
pub use provider::Provider;
pub use request::IncomingWebhookRequest;
pub use signature::{VerificationOutcome, Verifier, VerifierRegistry};
pub use store::{DataStore, MemoryStore};
pub use web::{router, AppState};
