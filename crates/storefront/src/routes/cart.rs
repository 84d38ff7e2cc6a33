//! Cart route handlers.
//!
//! The cart belongs to whoever the [`Identity`] extractor resolves: the
//! bearer token's user, else the `X-Session-ID` guest.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use tracing::instrument;

use fastspot_core::ProductId;

use crate::error::{Envelope, Result, add_breadcrumb, ok};
use crate::middleware::Identity;
use crate::models::CartView;
use crate::services::{AddItemRequest, CartService, UpdateItemRequest};
use crate::state::AppState;

use super::{Payload, parse_id};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show).delete(clear))
        .route("/items", post(add_item))
        .route("/items/{product_id}", put(update_item).delete(remove_item))
}

fn service(state: &AppState) -> CartService<'_> {
    CartService::new(state.catalog(), state.carts())
}

#[instrument(skip_all)]
async fn show(State(state): State<AppState>, identity: Identity) -> Json<Envelope<CartView>> {
    ok(service(&state).get(identity.owner()).await)
}

#[instrument(skip_all)]
async fn add_item(
    State(state): State<AppState>,
    identity: Identity,
    Payload(req): Payload<AddItemRequest>,
) -> Result<Json<Envelope<CartView>>> {
    let cart = service(&state).add_item(identity.owner(), &req).await?;
    let product_id = req.product_id.to_string();
    add_breadcrumb("cart", "Item added", Some(&[("product_id", product_id.as_str())]));
    Ok(ok(cart))
}

#[instrument(skip(state, identity, req))]
async fn update_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<String>,
    Payload(req): Payload<UpdateItemRequest>,
) -> Result<Json<Envelope<CartView>>> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    Ok(ok(service(&state)
        .update_item(identity.owner(), product_id, &req)
        .await?))
}

#[instrument(skip(state, identity))]
async fn remove_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<String>,
) -> Result<Json<Envelope<CartView>>> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    Ok(ok(service(&state)
        .remove_item(identity.owner(), product_id)
        .await?))
}

#[instrument(skip_all)]
async fn clear(State(state): State<AppState>, identity: Identity) -> Result<Json<Envelope<CartView>>> {
    Ok(ok(service(&state).clear(identity.owner()).await?))
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
    async fn test_guest_cart_lifecycle() {
        let burger = product("classic-burger", 899);
        let id = burger.id.to_string();
        let app = app(catalog_with(&[burger]), Arc::default());

        let body = response_json(send(&app, "GET", "/api/v1/cart", &[GUEST], None).await).await;
        assert_eq!(body["data"]["items"], json!([]));
        assert_eq!(body["data"]["total"], "0");

        let body = response_json(
            send(
                &app,
                "POST",
                "/api/v1/cart/items",
                &[GUEST],
                Some(json!({"productId": id, "qty": 2})),
            )
            .await,
        )
        .await;
        assert_eq!(body["data"]["itemCount"], 2);
        assert_eq!(body["data"]["total"], "17.98");

        let uri = format!("/api/v1/cart/items/{id}");
        let body = response_json(
            send(&app, "PUT", &uri, &[GUEST], Some(json!({"quantity": 3}))).await,
        )
        .await;
        assert_eq!(body["data"]["items"][0]["quantity"], 3);
        assert_eq!(body["data"]["total"], "26.97");

        let body = response_json(send(&app, "DELETE", &uri, &[GUEST], None).await).await;
        assert_eq!(body["data"]["items"], json!([]));
    }

    #[tokio::test]
    async fn test_user_and_guest_carts_are_separate() {
        let burger = product("classic-burger", 899);
        let id = burger.id.to_string();
        let app = app(catalog_with(&[burger]), Arc::default());
        let auth = bearer("u-1", "customer");

        send(
            &app,
            "POST",
            "/api/v1/cart/items",
            &[GUEST],
            Some(json!({"productId": id})),
        )
        .await;

        let body = response_json(
            send(&app, "GET", "/api/v1/cart", &[("authorization", auth.as_str()), GUEST], None).await,
        )
        .await;
        assert_eq!(body["data"]["items"], json!([]));
    }

    #[tokio::test]
    async fn test_mutations_without_identity_get_empty_cart() {
        let burger = product("classic-burger", 899);
        let id = burger.id.to_string();
        let app = app(catalog_with(&[burger]), Arc::default());

        let response = send(
            &app,
            "POST",
            "/api/v1/cart/items",
            &[],
            Some(json!({"productId": id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["data"]["id"], serde_json::Value::Null);
        assert_eq!(body["data"]["items"], json!([]));

        let response = send(
            &app,
            "PUT",
            &format!("/api/v1/cart/items/{id}"),
            &[],
            Some(json!({"quantity": 2})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "DELETE", &format!("/api/v1/cart/items/{id}"), &[], None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["data"]["itemCount"], 0);
    }

    #[tokio::test]
    async fn test_oversized_quantity_is_rejected() {
        let burger = product("classic-burger", 899);
        let id = burger.id.to_string();
        let app = app(catalog_with(&[burger]), Arc::default());

        let response = send(
            &app,
            "POST",
            "/api/v1/cart/items",
            &[GUEST],
            Some(json!({"productId": id, "quantity": i32::MAX})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_missing_line() {
        let burger = product("classic-burger", 899);
        let other = product("fries", 299);
        let app = app(catalog_with(&[burger.clone(), other.clone()]), Arc::default());

        send(
            &app,
            "POST",
            "/api/v1/cart/items",
            &[GUEST],
            Some(json!({"productId": burger.id.to_string()})),
        )
        .await;
        let response = send(
            &app,
            "PUT",
            &format!("/api/v1/cart/items/{}", other.id),
            &[GUEST],
            Some(json!({"quantity": 1})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_json(response).await["error"]["message"], "Item not found in cart");
    }
}
