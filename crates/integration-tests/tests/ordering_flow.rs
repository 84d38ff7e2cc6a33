//! Cart and checkout over HTTP.

use reqwest::StatusCode;
use serde_json::{Value, json};

use fastspot_integration_tests::{AsCaller, TestContext};

fn pickup_checkout() -> Value {
    json!({
        "paymentMethod": "card",
        "deliveryType": "pickup",
        "customerInfo": {"name": "Robin", "email": "robin@example.com", "phone": "+15550100"},
    })
}

async fn body(resp: reqwest::Response) -> Value {
    resp.json().await.expect("Response was not JSON")
}

#[tokio::test]
async fn test_guest_cart_to_pickup_order() {
    let ctx = TestContext::start().await;
    let burger = ctx.product_id("classic-burger");

    let resp = ctx
        .post("/api/v1/cart/items")
        .guest("sess-s1")
        .json(&json!({"productId": burger, "quantity": 2}))
        .send()
        .await
        .expect("add item");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart = body(resp).await;
    assert_eq!(cart["data"]["total"], "18.00");
    assert_eq!(cart["data"]["items"][0]["unitPrice"], "9.00");

    let cart = body(
        ctx.post("/api/v1/cart/items")
            .guest("sess-s1")
            .json(&json!({"productId": burger, "quantity": 1}))
            .send()
            .await
            .expect("add item again"),
    )
    .await;
    let items = cart["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(cart["data"]["total"], "27.00");
    let cart_id = cart["data"]["id"].clone();

    let resp = ctx
        .post("/api/v1/orders")
        .guest("sess-s1")
        .json(&pickup_checkout())
        .send()
        .await
        .expect("checkout");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = body(resp).await["data"]["order"].clone();
    assert_eq!(order["status"], "new");
    assert_eq!(order["items"].as_array().expect("order items").len(), 1);
    assert_eq!(order["items"][0]["quantity"], 3);
    assert_eq!(order["total"], "27.00");
    assert_eq!(order["payment"]["status"], "success");
    assert_eq!(order["delivery"]["type"], "pickup");
    assert_eq!(order["customer"]["email"], "robin@example.com");

    let cart = body(
        ctx.get("/api/v1/cart")
            .guest("sess-s1")
            .send()
            .await
            .expect("get cart"),
    )
    .await;
    assert_eq!(cart["data"]["id"], cart_id);
    assert_eq!(cart["data"]["items"], json!([]));
    assert_eq!(cart["data"]["total"], "0");

    let orders = body(
        ctx.get("/api/v1/orders")
            .guest("sess-s1")
            .send()
            .await
            .expect("list orders"),
    )
    .await;
    assert_eq!(orders["data"]["orders"][0]["id"], order["id"]);
}

#[tokio::test]
async fn test_anonymous_cart_is_empty() {
    let ctx = TestContext::start().await;
    let cart = body(ctx.get("/api/v1/cart").send().await.expect("get cart")).await;
    assert_eq!(cart["success"], true);
    assert_eq!(cart["data"]["id"], Value::Null);
    assert_eq!(cart["data"]["items"], json!([]));
    assert_eq!(cart["data"]["itemCount"], 0);
}

#[tokio::test]
async fn test_inactive_product_cannot_be_added() {
    let ctx = TestContext::start().await;
    let resp = ctx
        .post("/api/v1/cart/items")
        .guest("sess-1")
        .json(&json!({"productId": ctx.product_id("retired-special")}))
        .send()
        .await
        .expect("add item");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(resp).await["error"]["message"], "Product not found");
}

#[tokio::test]
async fn test_empty_cart_checkout_creates_nothing() {
    let ctx = TestContext::start().await;
    let resp = ctx
        .post("/api/v1/orders")
        .guest("sess-empty")
        .json(&pickup_checkout())
        .send()
        .await
        .expect("checkout");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err = body(resp).await;
    assert_eq!(err["success"], false);
    assert_eq!(err["error"]["code"], "INVALID_STATE");

    let orders = body(
        ctx.get("/api/v1/orders")
            .guest("sess-empty")
            .send()
            .await
            .expect("list orders"),
    )
    .await;
    assert_eq!(orders["data"]["orders"], json!([]));
}

#[tokio::test]
async fn test_delivery_needs_an_address() {
    let ctx = TestContext::start().await;
    ctx.post("/api/v1/cart/items")
        .guest("sess-d")
        .json(&json!({"productId": ctx.product_id("veggie-burger")}))
        .send()
        .await
        .expect("add item");

    let mut checkout = pickup_checkout();
    checkout["deliveryType"] = json!("delivery");
    let resp = ctx
        .post("/api/v1/orders")
        .guest("sess-d")
        .json(&checkout)
        .send()
        .await
        .expect("checkout");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(resp).await["error"]["message"],
        "Delivery address is required for delivery orders"
    );

    checkout["deliveryAddress"] = json!({"street": "1 Main St", "city": "Springfield", "zipCode": "12345"});
    let resp = ctx
        .post("/api/v1/orders")
        .guest("sess-d")
        .json(&checkout)
        .send()
        .await
        .expect("checkout");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = body(resp).await["data"]["order"].clone();
    assert_eq!(order["delivery"]["address"]["city"], "Springfield");
    assert_eq!(order["total"], "7.50");
}

#[tokio::test]
async fn test_declined_payment_is_recorded() {
    let ctx = TestContext::start().await;
    ctx.post("/api/v1/cart/items")
        .user("u-lucky", "customer")
        .json(&json!({"productId": ctx.product_id("lucky-lemonade")}))
        .send()
        .await
        .expect("add item");

    let resp = ctx
        .post("/api/v1/orders")
        .user("u-lucky", "customer")
        .json(&pickup_checkout())
        .send()
        .await
        .expect("checkout");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = body(resp).await["data"]["order"].clone();
    assert_eq!(order["total"], "4.13");
    assert_eq!(order["payment"]["status"], "failed");
    assert_eq!(order["status"], "new");
}

#[tokio::test]
async fn test_orders_are_private() {
    let ctx = TestContext::start().await;
    ctx.post("/api/v1/cart/items")
        .user("u-alice", "customer")
        .json(&json!({"productId": ctx.product_id("classic-burger")}))
        .send()
        .await
        .expect("add item");
    let order = body(
        ctx.post("/api/v1/orders")
            .user("u-alice", "customer")
            .json(&pickup_checkout())
            .send()
            .await
            .expect("checkout"),
    )
    .await["data"]["order"]
        .clone();
    let path = format!("/api/v1/orders/{}", order["id"].as_str().expect("order id"));

    let resp = ctx
        .get(&path)
        .user("u-bob", "customer")
        .send()
        .await
        .expect("get order");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = ctx.get(&path).send().await.expect("get order");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = ctx
        .get(&path)
        .user("u-alice", "customer")
        .send()
        .await
        .expect("get order");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["data"]["orderNumber"], order["orderNumber"]);
}

#[tokio::test]
async fn test_cancel_then_admin_cannot_advance() {
    let ctx = TestContext::start().await;
    ctx.post("/api/v1/cart/items")
        .guest("sess-c")
        .json(&json!({"productId": ctx.product_id("classic-burger")}))
        .send()
        .await
        .expect("add item");
    let order = body(
        ctx.post("/api/v1/orders")
            .guest("sess-c")
            .json(&pickup_checkout())
            .send()
            .await
            .expect("checkout"),
    )
    .await["data"]["order"]
        .clone();
    let id = order["id"].as_str().expect("order id");

    let resp = ctx
        .post(&format!("/api/v1/orders/{id}/cancel"))
        .guest("sess-c")
        .send()
        .await
        .expect("cancel");
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled = body(resp).await;
    assert_eq!(cancelled["data"]["status"], "cancelled");
    let tracking = cancelled["data"]["delivery"]["tracking"].as_array().expect("tracking");
    assert_eq!(tracking.len(), 2);

    let resp = ctx
        .put(&format!("/api/v1/admin/orders/{id}/status"))
        .user("staff", "admin")
        .json(&json!({"status": "confirmed"}))
        .send()
        .await
        .expect("update status");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_clear_and_remove() {
    let ctx = TestContext::start().await;
    let burger = ctx.product_id("classic-burger");
    let veggie = ctx.product_id("veggie-burger");
    for id in [&burger, &veggie] {
        ctx.post("/api/v1/cart/items")
            .guest("sess-r")
            .json(&json!({"productId": id}))
            .send()
            .await
            .expect("add item");
    }

    let cart = body(
        ctx.delete(&format!("/api/v1/cart/items/{burger}"))
            .guest("sess-r")
            .send()
            .await
            .expect("remove item"),
    )
    .await;
    assert_eq!(cart["data"]["items"].as_array().expect("items").len(), 1);
    assert_eq!(cart["data"]["total"], "7.50");

    let cart = body(
        ctx.delete("/api/v1/cart")
            .guest("sess-r")
            .send()
            .await
            .expect("clear"),
    )
    .await;
    assert_eq!(cart["data"]["items"], json!([]));
}
