//! Shipping carrier tracking updates (UPS, FedEx).
//!
//! Both carriers report a status code that is normalized into
//! [`PackageStatus`]; the delivered payload is kept as tracking history.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{finish, Handler, HandlerError, ProcessingResult};
use crate::event::{ParsedEvent, ProviderEvent};
use crate::provider::Provider;
use crate::store::{DataStore, PackageUpdate};

pub use crate::store::PackageStatus;

impl PackageStatus {
    /// UPS single-letter status codes.
    pub fn from_ups_code(code: &str) -> Self {
        match code {
            "I" => PackageStatus::InTransit,
            "D" => PackageStatus::Delivered,
            "X" => PackageStatus::Exception,
            "P" => PackageStatus::Pickup,
            _ => PackageStatus::Unknown,
        }
    }

    /// FedEx two-letter event codes.
    pub fn from_fedex_event(code: &str) -> Self {
        match code {
            "PU" => PackageStatus::Pickup,
            "IT" => PackageStatus::InTransit,
            "OD" => PackageStatus::OutForDelivery,
            "DL" => PackageStatus::Delivered,
            "EX" => PackageStatus::Exception,
            _ => PackageStatus::Unknown,
        }
    }
}

async fn update_package(
    store: &dyn DataStore,
    provider: Provider,
    tracking_number: &str,
    status: PackageStatus,
    description: Option<&str>,
    history: &Value,
) -> Result<ProcessingResult, HandlerError> {
    store
        .update_package_status(PackageUpdate {
            tracking_number: tracking_number.to_string(),
            status,
            tracking_history: history.clone(),
        })
        .await
        .map_err(HandlerError::store("package"))?;

    info!(
        provider = %provider,
        tracking_number = tracking_number,
        status = %status,
        description = description.unwrap_or(""),
        "package_status_updated"
    );
    Ok(ProcessingResult::ok("Package status updated"))
}

pub struct UpsHandler {
    store: Arc<dyn DataStore>,
}

impl UpsHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<ProcessingResult, HandlerError> {
        let update = match &event.event {
            ProviderEvent::Ups(u) => u,
            _ => return Err(HandlerError::unexpected_shape(Provider::Ups)),
        };

        update_package(
            self.store.as_ref(),
            Provider::Ups,
            &update.tracking_number,
            PackageStatus::from_ups_code(&update.status_code),
            update.status_description.as_deref(),
            &update.raw,
        )
        .await
    }
}

#[async_trait]
impl Handler for UpsHandler {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult {
        finish(Provider::Ups, self.apply(event).await)
    }
}

pub struct FedExHandler {
    store: Arc<dyn DataStore>,
}

impl FedExHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<ProcessingResult, HandlerError> {
        let update = match &event.event {
            ProviderEvent::FedEx(u) => u,
            _ => return Err(HandlerError::unexpected_shape(Provider::FedEx)),
        };

        update_package(
            self.store.as_ref(),
            Provider::FedEx,
            &update.tracking_number,
            PackageStatus::from_fedex_event(&update.event_type),
            update.event_description.as_deref(),
            &update.raw,
        )
        .await
    }
}

#[async_trait]
impl Handler for FedExHandler {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult {
        finish(Provider::FedEx, self.apply(event).await)
    }
}
