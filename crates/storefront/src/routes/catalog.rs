//! Catalog browsing: categories, products and promotions.
//!
//! Read-only and open to everyone. Inactive rows never show up, and
//! promotions only while their window is open.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use fastspot_core::{CategoryId, PromotionId};

use super::parse_id;
use crate::error::{Envelope, Result, ok};
use crate::models::{Category, Product, Promotion};
use crate::services::ServiceError;
use crate::state::AppState;

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{slug}", get(show_category))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{slug}", get(show_product))
}

pub fn promotion_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_promotions))
        .route("/{id}", get(show_promotion))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
}

/// A product with its category inlined.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
}

#[instrument(skip_all)]
async fn list_categories(State(state): State<AppState>) -> Result<Json<Envelope<Value>>> {
    let categories = state.catalog().list_active_categories().await?;
    Ok(ok(json!({ "categories": categories })))
}

#[instrument(skip(state))]
async fn show_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Envelope<Category>>> {
    let category = state
        .catalog()
        .find_category_by_slug(&slug)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()))?;
    Ok(ok(category))
}

/// List products. An unknown category slug yields an empty list rather
/// than an error.
#[instrument(skip(state))]
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Envelope<Value>>> {
    let category: Option<CategoryId> = match query.category.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => match state.catalog().find_category_by_slug(slug).await? {
            Some(category) => Some(category.id),
            None => return Ok(ok(json!({ "products": [] }))),
        },
        None => None,
    };

    let mut products = state.catalog().find_active_products(category).await?;
    if let Some(needle) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let needle = needle.to_lowercase();
        products.retain(|p| p.name.to_lowercase().contains(&needle));
    }

    Ok(ok(json!({ "products": products })))
}

#[instrument(skip(state))]
async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Envelope<ProductDetail>>> {
    let catalog = state.catalog();
    let product = catalog
        .find_product_by_slug(&slug)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
    let category = catalog.find_category_by_id(product.category_id).await?;
    Ok(ok(ProductDetail { product, category }))
}

#[instrument(skip_all)]
async fn list_promotions(State(state): State<AppState>) -> Result<Json<Envelope<Value>>> {
    let promotions = state.catalog().list_active_promotions(Utc::now()).await?;
    Ok(ok(json!({ "promotions": promotions })))
}

#[instrument(skip(state))]
async fn show_promotion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Promotion>>> {
    let id: PromotionId = parse_id(&id, "promotion")?;
    let promotion = state
        .catalog()
        .find_promotion_by_id(id, Utc::now())
        .await?
        .ok_or_else(|| ServiceError::NotFound("Promotion not found".to_string()))?;
    Ok(ok(promotion))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use chrono::{DateTime, Duration};

    use super::*;
    use crate::routes::test_support::{app, response_json, send};
    use crate::services::test_support::product;

    fn category(slug: &str) -> Category {
        let now = Utc::now();
        Category {
            id: CategoryId::generate(),
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            image: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn promotion(title: &str, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Promotion {
        Promotion {
            id: PromotionId::generate(),
            title: title.to_string(),
            description: format!("{title} deal"),
            starts_at,
            ends_at,
            banner_image: String::new(),
            is_active: true,
            applies_to: vec!["cola".to_string()],
            created_at: starts_at,
            updated_at: starts_at,
        }
    }

    fn fixture() -> Router {
        let burgers = category("burgers");
        let drinks = category("drinks");
        let mut classic = product("classic-burger", 899);
        classic.category_id = burgers.id;
        let mut veggie = product("veggie-burger", 799);
        veggie.category_id = burgers.id;
        let mut cola = product("cola", 199);
        cola.category_id = drinks.id;

        let catalog = crate::services::test_support::catalog_with(&[classic, veggie, cola])
            .with_category(burgers)
            .with_category(drinks);
        app(catalog, Arc::default())
    }

    fn names(body: &Value) -> Vec<&str> {
        body["data"]["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["slug"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_list_categories() {
        let app = fixture();
        let body = response_json(send(&app, "GET", "/api/v1/categories", &[], None).await).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["categories"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_products_filters() {
        let app = fixture();

        let body = response_json(send(&app, "GET", "/api/v1/products", &[], None).await).await;
        assert_eq!(names(&body), ["classic-burger", "cola", "veggie-burger"]);

        let body = response_json(
            send(&app, "GET", "/api/v1/products?category=burgers", &[], None).await,
        )
        .await;
        assert_eq!(names(&body), ["classic-burger", "veggie-burger"]);

        let body = response_json(
            send(&app, "GET", "/api/v1/products?category=burgers&search=VEG", &[], None).await,
        )
        .await;
        assert_eq!(names(&body), ["veggie-burger"]);

        let response = send(&app, "GET", "/api/v1/products?category=desserts", &[], None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(names(&response_json(response).await).is_empty());
    }

    #[tokio::test]
    async fn test_product_detail_inlines_category() {
        let app = fixture();
        let body =
            response_json(send(&app, "GET", "/api/v1/products/cola", &[], None).await).await;
        assert_eq!(body["data"]["slug"], "cola");
        assert_eq!(body["data"]["price"], "1.99");
        assert_eq!(body["data"]["category"]["slug"], "drinks");

        let response = send(&app, "GET", "/api/v1/products/nope", &[], None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_category_detail() {
        let app = fixture();
        let body =
            response_json(send(&app, "GET", "/api/v1/categories/drinks", &[], None).await).await;
        assert_eq!(body["data"]["name"], "DRINKS");

        let response = send(&app, "GET", "/api/v1/categories/nope", &[], None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_promotions_show_only_running_offers() {
        let now = Utc::now();
        let combo = promotion("Classic Combo", now - Duration::hours(1), now + Duration::days(30));
        let over = promotion("Old Deal", now - Duration::days(9), now - Duration::days(2));
        let (combo_id, over_id) = (combo.id, over.id);
        let catalog = crate::db::MemoryCatalogStore::new()
            .with_promotion(combo)
            .with_promotion(over);
        let app = app(catalog, Arc::default());

        let body = response_json(send(&app, "GET", "/api/v1/promotions", &[], None).await).await;
        let promotions = body["data"]["promotions"].as_array().unwrap();
        assert_eq!(promotions.len(), 1);
        assert_eq!(promotions[0]["title"], "Classic Combo");
        assert_eq!(promotions[0]["appliesTo"], json!(["cola"]));

        let uri = format!("/api/v1/promotions/{combo_id}");
        let body = response_json(send(&app, "GET", &uri, &[], None).await).await;
        assert_eq!(body["data"]["description"], "Classic Combo deal");

        let uri = format!("/api/v1/promotions/{over_id}");
        let response = send(&app, "GET", &uri, &[], None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response_json(response).await;
        assert_eq!(body["error"]["message"], "Promotion not found");

        let response = send(&app, "GET", "/api/v1/promotions/not-a-uuid", &[], None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
