//! Data-store collaborator.
//!
//! Handlers apply webhook effects through [`DataStore`]. Every operation is
//! keyed by an identifier the provider supplied, and applying the same
//! operation twice leaves the store as if it was applied once. Concurrent
//! duplicates are resolved by the store's key, not by locks in the gateway.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the external key.
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    /// The backing store failed. The detail is logged, not returned.
    #[error("storage unavailable")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

/// A payment keyed by the processor's id (payment intent, capture).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    pub external_id: String,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub customer_id: Option<String>,
    pub payment_method: &'static str,
    pub processed_at: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoicePayment {
    /// Processor invoice id
    pub external_id: String,
    pub amount_paid_cents: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpdate {
    pub stripe_customer_id: String,
    pub subscription_id: String,
    pub status: String,
}

/// A payment that clears a customer's outstanding balance.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountPayment {
    pub customer_id: String,
    pub amount_cents: i64,
    pub paid_on: NaiveDate,
}

/// Normalized shipment state, whatever the carrier's own code was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Pickup,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    Unknown,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pickup => "pickup",
            PackageStatus::InTransit => "in_transit",
            PackageStatus::OutForDelivery => "out_for_delivery",
            PackageStatus::Delivered => "delivered",
            PackageStatus::Exception => "exception",
            PackageStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageUpdate {
    pub tracking_number: String,
    pub status: PackageStatus,
    /// Carrier payload as delivered
    pub tracking_history: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationUpdate {
    /// Messaging provider's message id
    pub external_id: String,
    pub delivery_status: String,
}

/// Apply-update operations the gateway needs from the business store.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Create or replace the payment with `payment.external_id`.
    async fn upsert_payment(&self, payment: PaymentRecord) -> Result<(), StoreError>;

    async fn mark_invoice_paid(&self, update: InvoicePayment) -> Result<(), StoreError>;

    async fn update_subscription(&self, update: SubscriptionUpdate) -> Result<(), StoreError>;

    async fn record_account_payment(&self, update: AccountPayment) -> Result<(), StoreError>;

    async fn update_package_status(&self, update: PackageUpdate) -> Result<(), StoreError>;

    async fn update_notification_status(
        &self,
        update: NotificationUpdate,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_status_names() {
        assert_eq!(PackageStatus::OutForDelivery.to_string(), "out_for_delivery");
        assert_eq!(
            serde_json::to_value(PackageStatus::Exception).unwrap(),
            Value::String(PackageStatus::Exception.as_str().to_string())
        );
    }
}
