//! Read-only catalog lookups: categories, products, promotions and mood
//! questions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::Mutex;

use fastspot_core::{CategoryId, ProductId, PromotionId, QuestionId};

use super::{RepositoryError, corrupt, with_timeout};
use crate::models::{
    Category, Ingredient, MoodQuestion, Product, ProductOption, Promotion, QuestionOption,
};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active product by id. Inactive products are treated as missing.
    async fn find_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Active product by slug.
    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError>;

    /// All active products ordered by name, optionally limited to a category.
    async fn find_active_products(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn find_category_by_id(
        &self,
        id: CategoryId,
    ) -> Result<Option<Category>, RepositoryError>;

    /// Active category by slug.
    async fn find_category_by_slug(&self, slug: &str)
    -> Result<Option<Category>, RepositoryError>;

    async fn list_active_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Active questions ordered by position.
    async fn list_active_questions(&self) -> Result<Vec<MoodQuestion>, RepositoryError>;

    /// Promotions running at `now`, earliest start first.
    async fn list_active_promotions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, RepositoryError>;

    /// A promotion by id, only while it is running at `now`.
    async fn find_promotion_by_id(
        &self,
        id: PromotionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Promotion>, RepositoryError>;
}

pub fn postgres(pool: PgPool, timeout: Duration) -> Arc<dyn CatalogStore> {
    Arc::new(PostgresCatalogStore { pool, timeout })
}

// =============================================================================
// In-memory
// =============================================================================

/// Catalog held in memory, seeded with the `with_*` builders.
#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: Mutex<MemoryCatalogInner>,
}

#[derive(Default)]
struct MemoryCatalogInner {
    categories: Vec<Category>,
    products: Vec<Product>,
    questions: Vec<MoodQuestion>,
    promotions: Vec<Promotion>,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.inner.get_mut().categories.push(category);
        self
    }

    #[must_use]
    pub fn with_product(mut self, product: Product) -> Self {
        self.inner.get_mut().products.push(product);
        self
    }

    #[must_use]
    pub fn with_question(mut self, question: MoodQuestion) -> Self {
        self.inner.get_mut().questions.push(question);
        self
    }

    #[must_use]
    pub fn with_promotion(mut self, promotion: Promotion) -> Self {
        self.inner.get_mut().promotions.push(promotion);
        self
    }

    /// Flip a product's active flag. Used to simulate catalog edits.
    pub async fn set_product_active(&self, id: ProductId, active: bool) {
        let mut inner = self.inner.lock().await;
        if let Some(product) = inner.products.iter_mut().find(|p| p.id == id) {
            product.is_active = active;
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .find(|p| p.id == id && p.is_active)
            .cloned())
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .iter()
            .find(|p| p.slug == slug && p.is_active)
            .cloned())
    }

    async fn find_active_products(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Product> = inner
            .products
            .iter()
            .filter(|p| p.is_active && category.is_none_or(|c| p.category_id == c))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn find_category_by_id(
        &self,
        id: CategoryId,
    ) -> Result<Option<Category>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .categories
            .iter()
            .find(|c| c.slug == slug && c.is_active)
            .cloned())
    }

    async fn list_active_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Category> = inner
            .categories
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn list_active_questions(&self) -> Result<Vec<MoodQuestion>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<MoodQuestion> = inner
            .questions
            .iter()
            .filter(|q| q.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|q| q.position);
        Ok(out)
    }

    async fn list_active_promotions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Promotion> = inner
            .promotions
            .iter()
            .filter(|p| p.is_running(now))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.title.cmp(&b.title)));
        Ok(out)
    }

    async fn find_promotion_by_id(
        &self,
        id: PromotionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Promotion>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .promotions
            .iter()
            .find(|p| p.id == id && p.is_running(now))
            .cloned())
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    image: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            image: row.image,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: CategoryId,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    image: String,
    is_active: bool,
    ingredients: Json<Vec<Ingredient>>,
    options: Json<Vec<ProductOption>>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            image: row.image,
            is_active: row.is_active,
            ingredients: row.ingredients.0,
            options: row.options.0,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuestionRow {
    id: QuestionId,
    text: String,
    kind: String,
    options: Json<Vec<QuestionOption>>,
    position: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for MoodQuestion {
    type Error = RepositoryError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            text: row.text,
            kind: row.kind.parse().map_err(|e| corrupt("mood_questions.kind", e))?,
            options: row.options.0,
            position: row.position,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: PromotionId,
    title: String,
    description: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    banner_image: String,
    is_active: bool,
    applies_to: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PromotionRow> for Promotion {
    fn from(row: PromotionRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            banner_image: row.banner_image,
            is_active: row.is_active,
            applies_to: row.applies_to,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, category_id, name, slug, description, price, image, is_active, \
     ingredients, options, tags, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, slug, image, is_active, created_at, updated_at";

const PROMOTION_COLUMNS: &str = "id, title, description, starts_at, ends_at, banner_image, \
     is_active, applies_to, created_at, updated_at";

const PROMOTION_RUNNING: &str = "is_active AND starts_at <= $1 AND ends_at > $1";

struct PostgresCatalogStore {
    pool: PgPool,
    timeout: Duration,
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn find_product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active");
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, ProductRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Product::from))
        })
        .await
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND is_active");
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, ProductRow>(&sql)
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Product::from))
        })
        .await
    }

    async fn find_active_products(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active AND ($1::uuid IS NULL OR category_id = $1) \
             ORDER BY name"
        );
        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, ProductRow>(&sql)
                .bind(category)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Product::from).collect())
        })
        .await
    }

    async fn find_category_by_id(
        &self,
        id: CategoryId,
    ) -> Result<Option<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, CategoryRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Category::from))
        })
        .await
    }

    async fn find_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 AND is_active");
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, CategoryRow>(&sql)
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Category::from))
        })
        .await
    }

    async fn list_active_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY name");
        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, CategoryRow>(&sql)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Category::from).collect())
        })
        .await
    }

    async fn list_active_questions(&self) -> Result<Vec<MoodQuestion>, RepositoryError> {
        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, QuestionRow>(
                r"
                SELECT id, text, kind, options, position, is_active, created_at, updated_at
                FROM mood_questions
                WHERE is_active
                ORDER BY position
                ",
            )
            .fetch_all(&self.pool)
            .await?;
            rows.into_iter().map(MoodQuestion::try_from).collect()
        })
        .await
    }

    async fn list_active_promotions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, RepositoryError> {
        let sql = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions \
             WHERE {PROMOTION_RUNNING} ORDER BY starts_at, title"
        );
        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, PromotionRow>(&sql)
                .bind(now)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Promotion::from).collect())
        })
        .await
    }

    async fn find_promotion_by_id(
        &self,
        id: PromotionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Promotion>, RepositoryError> {
        let sql = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE {PROMOTION_RUNNING} AND id = $2"
        );
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, PromotionRow>(&sql)
                .bind(now)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Promotion::from))
        })
        .await
    }
}
