//! Checkout and order history.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::instrument;

use fastspot_core::OrderId;

use crate::error::{Envelope, Result, add_breadcrumb, ok};
use crate::middleware::Identity;
use crate::models::Order;
use crate::services::{CheckoutRequest, OrderService};
use crate::state::AppState;

use super::{Payload, parse_id};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show))
        .route("/{id}/cancel", post(cancel))
}

pub(super) fn service(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.carts(), state.orders(), state.payments())
}

#[instrument(skip_all)]
async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Payload(req): Payload<CheckoutRequest>,
) -> Result<(StatusCode, Json<Envelope<Value>>)> {
    let order = service(&state).create_order(identity.owner(), &req).await?;
    let payment_status = order.payment.status.to_string();
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[
            ("order_number", order.order_number.as_str()),
            ("payment_status", payment_status.as_str()),
        ]),
    );
    Ok((StatusCode::CREATED, ok(json!({ "order": order }))))
}

#[instrument(skip_all)]
async fn list(State(state): State<AppState>, identity: Identity) -> Result<Json<Envelope<Value>>> {
    let orders = service(&state).list_orders(identity.owner()).await?;
    Ok(ok(json!({ "orders": orders })))
}

#[instrument(skip(state, identity))]
async fn show(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Order>>> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(ok(service(&state).get_order(identity.owner(), id).await?))
}

#[instrument(skip(state, identity))]
async fn cancel(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Order>>> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(ok(service(&state).cancel_order(identity.owner(), id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use serde_json::json;

    use super::*;
    use crate::routes::test_support::{app, response_json, send};
    use crate::services::test_support::{catalog_with, product};

    const GUEST: (&str, &str) = ("x-session-id", "guest-1");

    fn checkout_body() -> Value {
        json!({
            "paymentMethod": "card",
            "deliveryType": "pickup",
            "customerInfo": {"name": "Sam", "phone": "555-0100"},
        })
    }

    async fn app_with_cart() -> Router {
        let burger = product("classic-burger", 899);
        let id = burger.id.to_string();
        let app = app(catalog_with(&[burger]), Arc::default());
        send(
            &app,
            "POST",
            "/api/v1/cart/items",
            &[GUEST],
            Some(json!({"productId": id, "quantity": 2})),
        )
        .await;
        app
    }

    #[tokio::test]
    async fn test_checkout_then_history() {
        let app = app_with_cart().await;

        let response = send(&app, "POST", "/api/v1/orders", &[GUEST], Some(checkout_body())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        let order = &body["data"]["order"];
        assert_eq!(order["status"], "new");
        assert_eq!(order["total"], "17.98");
        assert_eq!(order["payment"]["status"], "success");
        assert!(order["orderNumber"].as_str().unwrap().starts_with("ORD-"));

        let cart = response_json(send(&app, "GET", "/api/v1/cart", &[GUEST], None).await).await;
        assert_eq!(cart["data"]["items"], json!([]));

        let body = response_json(send(&app, "GET", "/api/v1/orders", &[GUEST], None).await).await;
        assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let app = app(catalog_with(&[]), Arc::default());
        let response = send(&app, "POST", "/api/v1/orders", &[GUEST], Some(checkout_body())).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response_json(response).await["error"]["message"], "No cart found");
    }

    #[tokio::test]
    async fn test_other_owner_cannot_read_or_cancel() {
        let app = app_with_cart().await;
        let body = response_json(
            send(&app, "POST", "/api/v1/orders", &[GUEST], Some(checkout_body())).await,
        )
        .await;
        let id = body["data"]["order"]["id"].as_str().unwrap().to_string();

        let stranger = [("x-session-id", "guest-2")];
        for (method, uri) in [
            ("GET", format!("/api/v1/orders/{id}")),
            ("POST", format!("/api/v1/orders/{id}/cancel")),
        ] {
            let response = send(&app, method, &uri, &stranger, None).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        let response = send(&app, "POST", &format!("/api/v1/orders/{id}/cancel"), &[GUEST], None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["data"]["status"], "cancelled");
    }
}
