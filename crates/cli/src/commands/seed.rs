//! Seed the catalog from a YAML file.
//!
//! Categories and products are upserted by slug, so re-running the same file
//! is safe. Questions have no natural key; one whose text already exists is
//! skipped. Promotions are upserted by title and their window restarts at
//! seeding time. With `--clear`, the catalog tables are emptied first.
//!
//! See `seed/catalog.yaml` for the file format.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{error, info};

use fastspot_core::{CategoryId, ProductId, PromotionId, QuestionId};
use fastspot_storefront::db;
use fastspot_storefront::models::{Ingredient, OptionKind, ProductOption, QuestionOption};

#[derive(Debug, Deserialize)]
pub struct SeedCatalog {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub questions: Vec<SeedQuestion>,
    #[serde(default)]
    pub promotions: Vec<SeedPromotion>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    /// Slug of a category defined in the same file.
    pub category: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedQuestion {
    pub position: i32,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPromotion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub banner_image: String,
    /// Days from seeding until the offer starts.
    #[serde(default)]
    pub starts_in_days: i64,
    /// How long the offer runs, in days.
    pub days: i64,
    /// Product slugs defined in the same file.
    #[serde(default)]
    pub applies_to: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SeedReport {
    pub categories: usize,
    pub products: usize,
    pub questions_inserted: usize,
    pub questions_skipped: usize,
    pub promotions: usize,
}

/// Check a catalog for problems the database would reject or silently
/// accept wrongly. Returns one message per problem.
#[must_use]
pub fn validate_catalog(catalog: &SeedCatalog) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_slugs = HashSet::new();
    for category in &catalog.categories {
        if category.slug.trim().is_empty() {
            errors.push(format!("category '{}' has an empty slug", category.name));
        } else if !category_slugs.insert(category.slug.as_str()) {
            errors.push(format!("duplicate category slug '{}'", category.slug));
        }
    }

    let mut product_slugs = HashSet::new();
    for product in &catalog.products {
        if product.slug.trim().is_empty() {
            errors.push(format!("product '{}' has an empty slug", product.name));
        } else if !product_slugs.insert(product.slug.as_str()) {
            errors.push(format!("duplicate product slug '{}'", product.slug));
        }
        if !category_slugs.contains(product.category.as_str()) {
            errors.push(format!(
                "product '{}' references unknown category '{}'",
                product.slug, product.category
            ));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("product '{}' has a negative price", product.slug));
        }
    }

    for question in &catalog.questions {
        if question.options.is_empty() {
            errors.push(format!("question '{}' has no options", question.text));
        }
    }

    let mut titles = HashSet::new();
    for promotion in &catalog.promotions {
        if !titles.insert(promotion.title.as_str()) {
            errors.push(format!("duplicate promotion title '{}'", promotion.title));
        }
        if promotion.days <= 0 {
            errors.push(format!("promotion '{}' must run at least one day", promotion.title));
        }
        for slug in &promotion.applies_to {
            if !product_slugs.contains(slug.as_str()) {
                errors.push(format!(
                    "promotion '{}' references unknown product '{slug}'",
                    promotion.title
                ));
            }
        }
    }

    errors
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or fails validation, or a database write fails. All writes happen in one
/// transaction.
pub async fn catalog(file_path: &str, clear_existing: bool) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: SeedCatalog = serde_yaml::from_str(&content)?;
    info!(
        categories = catalog.categories.len(),
        products = catalog.products.len(),
        questions = catalog.questions.len(),
        promotions = catalog.promotions.len(),
        "Parsed catalog"
    );

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let report = write_catalog(&pool, &catalog, clear_existing).await?;

    info!("Seeding complete!");
    info!("  Categories upserted: {}", report.categories);
    info!("  Products upserted: {}", report.products);
    info!("  Questions inserted: {}", report.questions_inserted);
    info!("  Questions skipped (already exist): {}", report.questions_skipped);
    info!("  Promotions upserted: {}", report.promotions);

    Ok(())
}

async fn write_catalog(
    pool: &PgPool,
    catalog: &SeedCatalog,
    clear_existing: bool,
) -> Result<SeedReport, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();

    if clear_existing {
        info!("Clearing existing catalog");
        sqlx::query("DELETE FROM promotions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM mood_questions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM categories").execute(&mut *tx).await?;
    }

    let mut category_ids = std::collections::HashMap::new();
    for category in &catalog.categories {
        let id: CategoryId = sqlx::query_scalar(
            r"
            INSERT INTO categories (id, name, slug, image)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE
                SET name = EXCLUDED.name,
                    image = EXCLUDED.image,
                    is_active = TRUE,
                    updated_at = now()
            RETURNING id
            ",
        )
        .bind(CategoryId::generate())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.image)
        .fetch_one(&mut *tx)
        .await?;
        category_ids.insert(category.slug.as_str(), id);
        report.categories += 1;
    }

    for product in &catalog.products {
        // Validation guarantees the category exists.
        let Some(category_id) = category_ids.get(product.category.as_str()) else {
            continue;
        };
        sqlx::query(
            r"
            INSERT INTO products
                (id, category_id, name, slug, description, price, image, ingredients, options, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (slug) DO UPDATE
                SET category_id = EXCLUDED.category_id,
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    price = EXCLUDED.price,
                    image = EXCLUDED.image,
                    ingredients = EXCLUDED.ingredients,
                    options = EXCLUDED.options,
                    tags = EXCLUDED.tags,
                    is_active = TRUE,
                    updated_at = now()
            ",
        )
        .bind(ProductId::generate())
        .bind(category_id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image)
        .bind(Json(&product.ingredients))
        .bind(Json(&product.options))
        .bind(&product.tags)
        .execute(&mut *tx)
        .await?;
        report.products += 1;
    }

    for question in &catalog.questions {
        let inserted = sqlx::query(
            r"
            INSERT INTO mood_questions (id, text, kind, options, position)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM mood_questions WHERE text = $2)
            ",
        )
        .bind(QuestionId::generate())
        .bind(&question.text)
        .bind(question.kind.as_str())
        .bind(Json(&question.options))
        .bind(question.position)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            report.questions_skipped += 1;
        } else {
            report.questions_inserted += 1;
        }
    }

    let now = Utc::now();
    for promotion in &catalog.promotions {
        let starts_at = now + Duration::days(promotion.starts_in_days);
        let ends_at = starts_at + Duration::days(promotion.days);
        sqlx::query(
            r"
            INSERT INTO promotions
                (id, title, description, starts_at, ends_at, banner_image, applies_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (title) DO UPDATE
                SET description = EXCLUDED.description,
                    starts_at = EXCLUDED.starts_at,
                    ends_at = EXCLUDED.ends_at,
                    banner_image = EXCLUDED.banner_image,
                    applies_to = EXCLUDED.applies_to,
                    is_active = TRUE,
                    updated_at = now()
            ",
        )
        .bind(PromotionId::generate())
        .bind(&promotion.title)
        .bind(&promotion.description)
        .bind(starts_at)
        .bind(ends_at)
        .bind(&promotion.banner_image)
        .bind(&promotion.applies_to)
        .execute(&mut *tx)
        .await?;
        report.promotions += 1;
    }

    tx.commit().await?;
    Ok(report)
}
