//! Typed webhook payloads, one shape per provider.
//!
//! Field names follow each provider's wire format. Everything a handler
//! needs is pulled into a typed field; the untouched JSON is kept where a
//! handler stores it verbatim (tracking history, PayPal resource).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::provider::Provider;

/// Decoded request body before any provider-specific interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single object.
    Single(Map<String, Value>),
    /// An ordered batch of objects.
    Batch(Vec<Map<String, Value>>),
}

impl Payload {
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Single(map) => Value::Object(map.clone()),
            Payload::Batch(items) => {
                Value::Array(items.iter().cloned().map(Value::Object).collect())
            }
        }
    }
}

/// A verified, decoded webhook ready for dispatch.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub provider: Provider,
    pub payload: Payload,
    pub event: ProviderEvent,
}

/// Provider-specific event shapes.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Stripe(StripeEvent),
    PayPal(PayPalEvent),
    Ups(UpsTrackingUpdate),
    FedEx(FedExTrackingUpdate),
    Twilio(TwilioStatusCallback),
    SendGrid(Vec<SendGridEvent>),
    /// Providers with no typed shape (GitHub).
    Untyped(Payload),
}

// =============================================================================
// Stripe
// =============================================================================

#[derive(Debug, Clone)]
pub struct StripeEvent {
    pub id: Option<String>,
    pub event_type: String,
    pub kind: StripeEventKind,
}

#[derive(Debug, Clone)]
pub enum StripeEventKind {
    PaymentIntentSucceeded(PaymentIntent),
    PaymentIntentFailed(PaymentIntent),
    InvoicePaymentSucceeded(Invoice),
    SubscriptionUpdated(Subscription),
    /// Any event type the gateway acknowledges without acting on.
    Unhandled,
}

/// Outer Stripe event object; `data.object` depends on `type`.
#[derive(Debug, Deserialize)]
pub(crate) struct StripeEnvelope {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Option<StripeData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeData {
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Minor currency units (cents)
    pub amount: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub last_payment_error: Option<PaymentError>,
}

impl PaymentIntent {
    /// Our customer id, when the payment was created with one in metadata.
    pub fn customer_id(&self) -> Option<&str> {
        self.metadata.get("customer_id").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentError {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    /// Minor currency units (cents)
    #[serde(default)]
    pub amount_paid: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    /// Stripe customer id
    pub customer: String,
}

// =============================================================================
// PayPal
// =============================================================================

#[derive(Debug, Clone)]
pub struct PayPalEvent {
    pub event_type: String,
    pub kind: PayPalEventKind,
}

#[derive(Debug, Clone)]
pub enum PayPalEventKind {
    CaptureCompleted(PayPalCapture),
    CaptureDenied(PayPalCapture),
    Unhandled,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PayPalEnvelope {
    pub event_type: String,
    pub resource: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayPalCapture {
    pub id: String,
    pub amount: PayPalAmount,
    /// The full resource object as delivered.
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayPalAmount {
    /// Decimal string, e.g. "10.50"
    pub value: String,
    pub currency_code: Option<String>,
}

// =============================================================================
// Carriers
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsTrackingUpdate {
    pub tracking_number: String,
    /// Single-letter UPS status code
    #[serde(default)]
    pub status_code: String,
    pub status_description: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FedExTrackingUpdate {
    pub tracking_number: String,
    /// Two-letter FedEx event code
    #[serde(default)]
    pub event_type: String,
    pub event_description: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

// =============================================================================
// Messaging
// =============================================================================

/// Twilio message status callback (form fields).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioStatusCallback {
    pub message_sid: Option<String>,
    pub message_status: Option<String>,
}

/// One item of a SendGrid event batch.
#[derive(Debug, Clone, Deserialize)]
pub struct SendGridEvent {
    pub sg_message_id: Option<String>,
    pub event: Option<String>,
}
