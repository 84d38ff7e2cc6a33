//! Orders and their payment, delivery and customer details.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fastspot_core::{
    CurrencyCode, DeliveryType, Email, OrderId, OrderStatus, OwnerKey, PaymentMethod,
    PaymentStatus, TransitionError,
};

use super::cart::CartLine;

/// Order lines are frozen copies of the cart lines at checkout.
pub type OrderItem = CartLine;

/// A placed order.
///
/// Items and total never change after creation. Later writes only touch
/// `status`, `payment.status` and append to `delivery.tracking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(skip)]
    pub owner: OwnerKey,
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment: Payment,
    pub delivery: Delivery,
    pub customer: CustomerInfo,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Move to `to`, recording a tracking event.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the move is not allowed from the
    /// current status; the order is left untouched.
    pub fn apply_status(
        &mut self,
        to: OrderStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.status = self.status.transition_to(to)?;
        self.delivery.tracking.push(TrackingEvent::new(to, note, now));
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[serde(rename = "type")]
    pub kind: DeliveryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<DeliveryAddress>,
    pub eta: DateTime<Utc>,
    pub tracking: Vec<TrackingEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A point on the order timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub ts: DateTime<Utc>,
    pub status: OrderStatus,
    /// Customer-facing text, e.g. "Order received".
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TrackingEvent {
    #[must_use]
    pub fn new(status: OrderStatus, note: Option<String>, ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            status,
            label: status.tracking_label().to_string(),
            note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    pub phone: String,
}
