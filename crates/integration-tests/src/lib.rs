//! End-to-end tests for the FastSpot ordering API.
//!
//! Each test starts the real router on an ephemeral port, backed by
//! in-memory stores, the stub payment provider and a scripted reasoning
//! service, then talks to it over HTTP with `reqwest`. No database or API
//! keys are needed:
//!
//! ```bash
//! cargo test -p fastspot-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;

use fastspot_core::{CategoryId, ProductId, QuestionId};
use fastspot_storefront::db::MemoryCatalogStore;
use fastspot_storefront::middleware::{Claims, SESSION_HEADER};
use fastspot_storefront::models::{Category, MoodQuestion, OptionKind, Product, QuestionOption};
use fastspot_storefront::routes::{self, RouteLayers};
use fastspot_storefront::services::{GenerationParams, ReasoningService, ServiceError};
use fastspot_storefront::state::{AppState, Collaborators};

const JWT_SECRET: &[u8] = b"integration-secret-integration-secret-0";

/// Reasoning service that replies with whatever the test queued.
#[derive(Default)]
pub struct ScriptedModel {
    reply: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn reply_with(&self, text: &str) {
        *self.reply.lock().expect("model lock") = Some(text.to_string());
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("model lock").clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        self.prompts.lock().expect("model lock").push(prompt.to_string());
        self.reply
            .lock()
            .expect("model lock")
            .clone()
            .ok_or_else(|| ServiceError::ExternalService("model offline".to_string()))
    }
}

/// A running server plus handles to drive it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub model: Arc<ScriptedModel>,
    products: HashMap<String, ProductId>,
    questions: HashMap<String, QuestionId>,
}

impl TestContext {
    /// Start a server with the demo menu:
    ///
    /// | slug            | price |
    /// |-----------------|-------|
    /// | classic-burger  | 9.00  |
    /// | veggie-burger   | 7.50  |
    /// | lucky-lemonade  | 4.13  |
    /// | retired-special | 5.00 (inactive) |
    pub async fn start() -> Self {
        let mains = category("mains", "Mains");
        let drinks = category("drinks", "Drinks");

        let menu = [
            product("classic-burger", "Classic Burger", 900, mains.id, &["popular", "savory"]),
            product("veggie-burger", "Veggie Burger", 750, mains.id, &["healthy", "light"]),
            product("lucky-lemonade", "Lucky Lemonade", 413, drinks.id, &["refreshing"]),
            Product {
                is_active: false,
                ..product("retired-special", "Retired Special", 500, mains.id, &[])
            },
        ];
        let hunger = question(
            1,
            "How hungry are you?",
            &[("very", "Very!"), ("light", "Want something light")],
        );
        let mood = question(2, "How do you feel today?", &[("tired", "Tired"), ("happy", "Happy")]);

        let products = menu.iter().map(|p| (p.slug.clone(), p.id)).collect();
        let questions = [&hunger, &mood]
            .iter()
            .map(|q| (q.text.clone(), q.id))
            .collect();

        let catalog = menu
            .into_iter()
            .fold(MemoryCatalogStore::new(), MemoryCatalogStore::with_product)
            .with_category(mains)
            .with_category(drinks)
            .with_question(hunger)
            .with_question(mood);

        let model = Arc::new(ScriptedModel::default());
        let parts = Collaborators::in_memory(Arc::new(catalog), model.clone());
        let state = AppState::with_collaborators(parts, JWT_SECRET, None);
        let app = routes::routes(RouteLayers::default()).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server error");
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            model,
            products,
            questions,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Id of a seeded product, as sent on the wire.
    #[must_use]
    pub fn product_id(&self, slug: &str) -> String {
        self.products
            .get(slug)
            .unwrap_or_else(|| panic!("unknown product {slug}"))
            .to_string()
    }

    /// Id of a seeded question, looked up by its text.
    #[must_use]
    pub fn question_id(&self, text: &str) -> String {
        self.questions
            .get(text)
            .unwrap_or_else(|| panic!("unknown question {text}"))
            .to_string()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    #[must_use]
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }
}

/// Identify a request as a guest session.
pub trait AsCaller {
    #[must_use]
    fn guest(self, session_id: &str) -> Self;

    /// Attach a signed bearer token for `user_id` with `role`.
    #[must_use]
    fn user(self, user_id: &str, role: &str) -> Self;
}

impl AsCaller for RequestBuilder {
    fn guest(self, session_id: &str) -> Self {
        self.header(SESSION_HEADER, session_id)
    }

    fn user(self, user_id: &str, role: &str) -> Self {
        self.bearer_auth(token(user_id, role))
    }
}

/// Sign an HS256 token with the test secret.
#[must_use]
pub fn token(user_id: &str, role: &str) -> String {
    let claims = Claims {
        user_id: user_id.to_string(),
        email: None,
        role: role.to_string(),
        exp: 4_102_444_800, // 2100-01-01
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET),
    )
    .expect("Failed to sign token")
}

fn category(slug: &str, name: &str) -> Category {
    let now = Utc::now();
    Category {
        id: CategoryId::generate(),
        name: name.to_string(),
        slug: slug.to_string(),
        image: String::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn product(slug: &str, name: &str, cents: i64, category_id: CategoryId, tags: &[&str]) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::generate(),
        category_id,
        name: name.to_string(),
        slug: slug.to_string(),
        description: format!("{name}, made to order"),
        price: Decimal::new(cents, 2),
        image: format!("/img/{slug}.jpg"),
        is_active: true,
        ingredients: Vec::new(),
        options: Vec::new(),
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
        created_at: now,
        updated_at: now,
    }
}

fn question(position: i32, text: &str, options: &[(&str, &str)]) -> MoodQuestion {
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
        position,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
