//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart engine (add, update, remove, clear)
//! - `checkout` - Order placement, lookup and status transitions
//! - `payments` - Payment provider seam and the stub settlement
//! - `recommendation` - Mood quiz to AI menu recommendations
//!
//! Services borrow their collaborators from [`crate::state::AppState`] for the
//! duration of one request:
//!
//! ```rust,ignore
//! let cart = CartService::new(state.catalog(), state.carts())
//!     .add_item(identity.owner(), &req)
//!     .await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod payments;
pub mod recommendation;

pub use cart::{AddItemRequest, CartService, UpdateItemRequest};
pub use checkout::{CheckoutRequest, OrderService};
pub use error::ServiceError;
pub use payments::{PaymentError, PaymentProvider, SettlementResult, StubPaymentProvider};
pub use recommendation::{
    GenerationParams, ReasoningService, Recommendation, RecommendationService,
};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use fastspot_core::{CategoryId, ProductId, QuestionId};

    use crate::db::MemoryCatalogStore;
    use crate::models::{MoodQuestion, OptionKind, Product, QuestionOption};

    /// An active product priced in whole cents.
    pub fn product(slug: &str, cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::generate(),
            category_id: CategoryId::generate(),
            name: slug.replace('-', " "),
            slug: slug.to_string(),
            description: String::new(),
            price: Decimal::new(cents, 2),
            image: format!("/img/{slug}.jpg"),
            is_active: true,
            ingredients: Vec::new(),
            options: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn catalog_with(products: &[Product]) -> MemoryCatalogStore {
        products
            .iter()
            .cloned()
            .fold(MemoryCatalogStore::new(), MemoryCatalogStore::with_product)
    }

    /// An active single-choice question with `(value, label)` options.
    pub fn question(text: &str, options: &[(&str, &str)]) -> MoodQuestion {
        let now = Utc::now();
        MoodQuestion {
            id: QuestionId::generate(),
            text: text.to_string(),
            kind: OptionKind::Single,
            options: options
                .iter()
                .map(|(value, label)| QuestionOption {
                    value: (*value).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
            position: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
