//! Checkout and order lifecycle.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::instrument;

use fastspot_core::pricing::cart_total;
use fastspot_core::{DeliveryType, Email, OrderId, OrderStatus, OwnerKey, PaymentMethod};

use super::ServiceError;
use super::payments::PaymentProvider;
use crate::db::{CartStore, OrderStore};
use crate::models::{CustomerInfo, Delivery, DeliveryAddress, Order, Payment, TrackingEvent};

const PICKUP_ETA_MINUTES: i64 = 18;
const DELIVERY_ETA_MINUTES: i64 = 40;
const RECEIVED_NOTE: &str = "Your order has been received and is being processed";
const CANCELLED_NOTE: &str = "Cancelled by customer";

/// Body of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub delivery_type: DeliveryType,
    #[serde(rename = "customerInfo", alias = "customer")]
    pub customer: CustomerRequest,
    pub delivery_address: Option<DeliveryAddress>,
}

/// Contact details as submitted; the email is validated before use.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
}

impl CustomerRequest {
    fn validate(&self) -> Result<CustomerInfo, ServiceError> {
        let name = self.name.trim();
        let phone = self.phone.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("customer name is required".to_string()));
        }
        if phone.is_empty() {
            return Err(ServiceError::Validation("customer phone is required".to_string()));
        }
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Email::parse(raw)?),
        };
        Ok(CustomerInfo {
            name: name.to_string(),
            email,
            phone: phone.to_string(),
        })
    }
}

/// `ORD-<unix seconds>-<6 hex chars>`.
fn order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(0..0x0100_0000);
    format!("ORD-{}-{suffix:06x}", now.timestamp())
}

fn eta(kind: DeliveryType, now: DateTime<Utc>) -> DateTime<Utc> {
    let minutes = match kind {
        DeliveryType::Pickup => PICKUP_ETA_MINUTES,
        DeliveryType::Delivery => DELIVERY_ETA_MINUTES,
    };
    now + Duration::minutes(minutes)
}

/// Order operations for a single request.
pub struct OrderService<'a> {
    carts: &'a dyn CartStore,
    orders: &'a dyn OrderStore,
    payments: &'a dyn PaymentProvider,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(
        carts: &'a dyn CartStore,
        orders: &'a dyn OrderStore,
        payments: &'a dyn PaymentProvider,
    ) -> Self {
        Self {
            carts,
            orders,
            payments,
        }
    }

    /// Turn the owner's cart into an order.
    ///
    /// Payment is settled before anything is written. A provider error
    /// aborts with the cart untouched; a declined or pending settlement is
    /// recorded on the order as reported.
    ///
    /// # Errors
    ///
    /// - `Validation` for a delivery order without an address or blank
    ///   customer details
    /// - `InvalidState` when there is no cart or it is empty
    /// - `ExternalService` when the payment provider fails
    #[instrument(skip(self, req), fields(delivery = %req.delivery_type, payment = %req.payment_method))]
    pub async fn create_order(
        &self,
        owner: Option<&OwnerKey>,
        req: &CheckoutRequest,
    ) -> Result<Order, ServiceError> {
        let address = match (req.delivery_type, &req.delivery_address) {
            (DeliveryType::Delivery, None) => {
                return Err(ServiceError::Validation(
                    "Delivery address is required for delivery orders".to_string(),
                ));
            }
            (DeliveryType::Delivery, Some(address)) => Some(address.clone()),
            (DeliveryType::Pickup, _) => None,
        };
        let customer = req.customer.validate()?;

        let owner = owner.ok_or_else(|| ServiceError::InvalidState("No cart found".to_string()))?;
        let cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or_else(|| ServiceError::InvalidState("No cart found".to_string()))?;
        if cart.is_empty() {
            return Err(ServiceError::InvalidState("Cart is empty".to_string()));
        }

        let now = Utc::now();
        let items = cart.lines.clone();
        let total = cart_total(&items);

        let settlement = self
            .payments
            .settle(total, cart.currency)
            .await
            .map_err(|e| ServiceError::ExternalService(format!("payment: {e}")))?;
        tracing::info!(
            status = %settlement.status,
            transaction_id = %settlement.transaction_id,
            message = %settlement.message,
            "payment settled"
        );

        let order = Order {
            id: OrderId::generate(),
            owner: owner.clone(),
            order_number: order_number(now),
            items,
            total,
            currency: cart.currency,
            status: OrderStatus::New,
            payment: Payment {
                method: req.payment_method,
                status: settlement.status,
                transaction_id: Some(settlement.transaction_id),
            },
            delivery: Delivery {
                kind: req.delivery_type,
                address,
                eta: eta(req.delivery_type, now),
                tracking: vec![TrackingEvent::new(
                    OrderStatus::New,
                    Some(RECEIVED_NOTE.to_string()),
                    now,
                )],
            },
            customer,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let order = self.orders.create(&order).await?;

        // The order is already placed; a stale cart is logged, not surfaced.
        let mut emptied = cart;
        emptied.lines.clear();
        emptied.recompute();
        emptied.updated_at = now;
        if let Err(e) = self.carts.replace(&emptied).await {
            tracing::error!(
                error = %e,
                order_number = %order.order_number,
                "order placed but cart could not be cleared"
            );
        }

        tracing::info!(order_number = %order.order_number, total = %order.total, "order created");
        Ok(order)
    }

    /// Fetch an order the caller owns.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown, `Forbidden` when it belongs to
    /// someone else or the caller has no identity.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        owner: Option<&OwnerKey>,
        id: OrderId,
    ) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        if owner != Some(&order.owner) {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        Ok(order)
    }

    /// The caller's orders, newest first. Empty without an identity.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, owner: Option<&OwnerKey>) -> Result<Vec<Order>, ServiceError> {
        match owner {
            Some(owner) => Ok(self.orders.find_by_owner(owner).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Cancel an order the caller owns.
    ///
    /// # Errors
    ///
    /// As [`Self::get_order`], plus `InvalidState` for completed or already
    /// cancelled orders.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        owner: Option<&OwnerKey>,
        id: OrderId,
    ) -> Result<Order, ServiceError> {
        let mut order = self.get_order(owner, id).await?;
        order.apply_status(OrderStatus::Cancelled, Some(CANCELLED_NOTE.to_string()), Utc::now())?;
        Ok(self.orders.replace(&order).await?)
    }

    /// Move an order along its lifecycle. Staff only; no ownership check.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` for an illegal
    /// transition, `Conflict` when another write landed first.
    #[instrument(skip(self, note))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, ServiceError> {
        let mut order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        order.apply_status(status, note, Utc::now())?;
        let order = self.orders.replace(&order).await?;
        tracing::info!(order_number = %order.order_number, status = %order.status, "order status updated");
        Ok(order)
    }
}
