//! Staff-only order management.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use serde::Deserialize;
use tracing::instrument;

use fastspot_core::{OrderId, OrderStatus};

use crate::error::{Envelope, Result, ok};
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::state::AppState;

use super::{Payload, orders, parse_id};

pub fn routes() -> Router<AppState> {
    Router::new().route("/orders/{id}/status", put(update_order_status))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[instrument(skip_all, fields(admin = %admin.0.user_id, status = %req.status))]
async fn update_order_status(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
    Payload(req): Payload<UpdateStatusRequest>,
) -> Result<Json<Envelope<Order>>> {
    let id: OrderId = parse_id(&id, "order")?;
    let note = req.note.filter(|n| !n.trim().is_empty());
    Ok(ok(orders::service(&state)
        .update_status(id, req.status, note)
        .await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{app, bearer, response_json, send};
    use crate::services::test_support::{catalog_with, product};

    const GUEST: (&str, &str) = ("x-session-id", "guest-1");

    #[tokio::test]
    async fn test_admin_advances_order() {
        let burger = product("classic-burger", 899);
        let app = app(catalog_with(&[burger.clone()]), Arc::default());
        send(
            &app,
            "POST",
            "/api/v1/cart/items",
            &[GUEST],
            Some(json!({"productId": burger.id.to_string()})),
        )
        .await;
        let body = response_json(
            send(
                &app,
                "POST",
                "/api/v1/orders",
                &[GUEST],
                Some(json!({
                    "paymentMethod": "cash",
                    "deliveryType": "pickup",
                    "customerInfo": {"name": "Sam", "phone": "555-0100"},
                })),
            )
            .await,
        )
        .await;
        let uri = format!("/api/v1/admin/orders/{}/status", body["data"]["order"]["id"].as_str().unwrap());

        let customer = bearer("u-1", "customer");
        let response = send(
            &app,
            "PUT",
            &uri,
            &[("authorization", customer.as_str())],
            Some(json!({"status": "confirmed"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = bearer("staff-1", "admin");
        let response = send(
            &app,
            "PUT",
            &uri,
            &[("authorization", admin.as_str())],
            Some(json!({"status": "confirmed", "note": "kitchen has it"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["data"]["status"], "confirmed");
        assert_eq!(body["data"]["delivery"]["tracking"].as_array().unwrap().len(), 2);

        let response = send(
            &app,
            "PUT",
            &uri,
            &[("authorization", admin.as_str())],
            Some(json!({"status": "completed"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let app = app(catalog_with(&[]), Arc::default());
        let response = send(
            &app,
            "PUT",
            "/api/v1/admin/orders/00000000-0000-0000-0000-000000000000/status",
            &[],
            Some(json!({"status": "confirmed"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response_json(response).await;
        assert_eq!(body["error"]["message"], "Authorization header is required");
    }
}
