//! Content-type aware payload decoding.
//!
//! JSON is the default encoding. Form encoding is accepted only from the
//! provider that sends it (Twilio). Any other media type is rejected rather
//! than decoded on a best-effort basis.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use url::form_urlencoded;

use super::types::*;
use crate::provider::Provider;
use crate::request::{is_form_content_type, mime_essence};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("{0} does not send form-encoded bodies")]
    FormNotAccepted(Provider),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("body is not an object or an array of objects")]
    NotAnObject,

    #[error("unexpected {provider} payload: {reason}")]
    Shape { provider: Provider, reason: String },
}

/// Decode a raw body into a typed event for `provider`.
pub fn parse(
    provider: Provider,
    raw_body: &[u8],
    content_type: &str,
) -> Result<ParsedEvent, ParseError> {
    let payload = decode_payload(provider, raw_body, content_type)?;
    let event = interpret(provider, &payload)?;

    debug!(provider = %provider, "payload_parsed");

    Ok(ParsedEvent {
        provider,
        payload,
        event,
    })
}

/// First stage: bytes → generic object or batch.
pub fn decode_payload(
    provider: Provider,
    raw_body: &[u8],
    content_type: &str,
) -> Result<Payload, ParseError> {
    if is_form_content_type(content_type) {
        if !provider.uses_form_encoding() {
            return Err(ParseError::FormNotAccepted(provider));
        }
        return Ok(Payload::Single(decode_form(raw_body)));
    }

    if !is_json_content_type(content_type) {
        return Err(ParseError::UnsupportedContentType(content_type.to_string()));
    }

    match serde_json::from_slice::<Value>(raw_body)? {
        Value::Object(map) => Ok(Payload::Single(map)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(ParseError::NotAnObject),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Payload::Batch),
        _ => Err(ParseError::NotAnObject),
    }
}

/// An absent content type means JSON.
fn is_json_content_type(content_type: &str) -> bool {
    let essence = mime_essence(content_type);
    essence.is_empty() || essence == "application/json" || essence.ends_with("+json")
}

/// Form fields as string values. A repeated name keeps its last value.
fn decode_form(raw_body: &[u8]) -> Map<String, Value> {
    form_urlencoded::parse(raw_body)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Second stage: generic payload → the provider's typed shape.
fn interpret(provider: Provider, payload: &Payload) -> Result<ProviderEvent, ParseError> {
    let shape_err = |reason: String| ParseError::Shape { provider, reason };

    match provider {
        Provider::Stripe => {
            let envelope: StripeEnvelope = from_single(payload).map_err(shape_err)?;
            stripe_event(envelope).map(ProviderEvent::Stripe).map_err(shape_err)
        }
        Provider::PayPal => {
            let envelope: PayPalEnvelope = from_single(payload).map_err(shape_err)?;
            paypal_event(envelope).map(ProviderEvent::PayPal).map_err(shape_err)
        }
        Provider::Ups => {
            let mut update: UpsTrackingUpdate = from_single(payload).map_err(shape_err)?;
            update.raw = payload.to_json();
            Ok(ProviderEvent::Ups(update))
        }
        Provider::FedEx => {
            let mut update: FedExTrackingUpdate = from_single(payload).map_err(shape_err)?;
            update.raw = payload.to_json();
            Ok(ProviderEvent::FedEx(update))
        }
        Provider::Twilio => from_single(payload)
            .map(ProviderEvent::Twilio)
            .map_err(shape_err),
        Provider::SendGrid => match payload {
            Payload::Batch(items) => items
                .iter()
                .map(|item| from_map::<SendGridEvent>(item))
                .collect::<Result<Vec<_>, _>>()
                .map(ProviderEvent::SendGrid)
                .map_err(shape_err),
            Payload::Single(_) => Err(shape_err("expected an array of events".to_string())),
        },
        Provider::GitHub => Ok(ProviderEvent::Untyped(payload.clone())),
    }
}

fn from_single<T: DeserializeOwned>(payload: &Payload) -> Result<T, String> {
    match payload {
        Payload::Single(map) => from_map(map),
        Payload::Batch(_) => Err("expected a single object, got an array".to_string()),
    }
}

fn from_map<T: DeserializeOwned>(map: &Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(map.clone())).map_err(|e| e.to_string())
}

fn stripe_event(envelope: StripeEnvelope) -> Result<StripeEvent, String> {
    let object = || {
        envelope
            .data
            .as_ref()
            .map(|d| d.object.clone())
            .ok_or_else(|| format!("{} has no data.object", envelope.event_type))
    };
    let event_type = envelope.event_type.as_str();

    let kind = match event_type {
        "payment_intent.succeeded" => {
            StripeEventKind::PaymentIntentSucceeded(typed(event_type, object()?)?)
        }
        "payment_intent.payment_failed" => {
            StripeEventKind::PaymentIntentFailed(typed(event_type, object()?)?)
        }
        "invoice.payment_succeeded" => {
            StripeEventKind::InvoicePaymentSucceeded(typed(event_type, object()?)?)
        }
        "customer.subscription.updated" => {
            StripeEventKind::SubscriptionUpdated(typed(event_type, object()?)?)
        }
        _ => StripeEventKind::Unhandled,
    };

    Ok(StripeEvent {
        id: envelope.id,
        event_type: envelope.event_type,
        kind,
    })
}

fn typed<T: DeserializeOwned>(event_type: &str, value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("{}: {}", event_type, e))
}

fn paypal_event(envelope: PayPalEnvelope) -> Result<PayPalEvent, String> {
    let capture = || -> Result<PayPalCapture, String> {
        let resource = envelope
            .resource
            .clone()
            .ok_or_else(|| format!("{} has no resource", envelope.event_type))?;
        let mut capture: PayPalCapture = typed(&envelope.event_type, resource.clone())?;
        capture.raw = resource;
        Ok(capture)
    };

    let kind = match envelope.event_type.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => PayPalEventKind::CaptureCompleted(capture()?),
        "PAYMENT.CAPTURE.DENIED" => PayPalEventKind::CaptureDenied(capture()?),
        _ => PayPalEventKind::Unhandled,
    };

    Ok(PayPalEvent {
        event_type: envelope.event_type,
        kind,
    })
}
