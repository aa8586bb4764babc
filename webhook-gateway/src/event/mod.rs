//! Webhook payload decoding.
//!
//! ```text
//! raw body + content type → Payload (object | batch) → ProviderEvent
//! ```

pub mod parser;
pub mod types;

pub use parser::{decode_payload, parse, ParseError};
pub use types::*;
