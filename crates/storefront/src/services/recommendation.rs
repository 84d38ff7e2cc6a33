//! Mood quiz recommendations.
//!
//! The pipeline is: snapshot the active menu and questions, build a compact
//! prompt from the customer's answers, ask the reasoning service, pull the
//! JSON object out of its reply, and keep only slugs that name active
//! products. Each successful run is logged as an [`AiSession`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use fastspot_core::{AiSessionId, CategoryId, OwnerKey, QuestionId};

use super::ServiceError;
use crate::db::{AiSessionStore, CatalogStore};
use crate::models::{AiSession, MoodAnswer, MoodQuestion, Product, QuestionOption};

/// Only this many matched answers make it into the prompt.
const MAX_PROMPT_ANSWERS: usize = 4;

const PROMPT_HEADER: &str = "FastSpot AI: recommend 2-3 food items.\n\nCUSTOMER: ";
const PROMPT_INSTRUCTIONS: &str =
    "\nPick 2-3 items. JSON: {\"productSlugs\":[\"slug1\",\"slug2\"],\"reasoning\":\"why\"}";

/// Sampling settings passed to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 8192,
        }
    }
}

/// A text-in, text-out language model.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Complete `prompt`.
    ///
    /// Implementations report transport and API failures as
    /// [`ServiceError::ExternalService`].
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError>;
}

/// What the model sees of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub price: Decimal,
    pub ingredients: Vec<String>,
    /// Option label with its choice labels.
    pub options: Vec<(String, Vec<String>)>,
}

impl ProductSummary {
    fn from_product(product: &Product, categories: &HashMap<CategoryId, &str>) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            category: categories
                .get(&product.category_id)
                .map_or_else(|| "Unknown".to_string(), |name| (*name).to_string()),
            tags: product.tags.clone(),
            price: product.price,
            ingredients: product.ingredients.iter().map(|i| i.label.clone()).collect(),
            options: product
                .options
                .iter()
                .map(|o| {
                    let choices = o.choices.iter().map(|c| c.label.clone()).collect();
                    (o.label.clone(), choices)
                })
                .collect(),
        }
    }
}

/// What the model sees of a quiz question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

impl From<&MoodQuestion> for QuestionSummary {
    fn from(q: &MoodQuestion) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
            options: q.options.clone(),
        }
    }
}

/// Build the prompt sent to the model.
///
/// Answers that reference an unknown question are skipped and do not count
/// toward the answer limit.
#[must_use]
pub fn build_prompt(
    answers: &[MoodAnswer],
    questions: &[QuestionSummary],
    products: &[ProductSummary],
) -> String {
    let labels: Vec<&str> = answers
        .iter()
        .filter_map(|answer| {
            questions
                .iter()
                .find(|q| q.id == answer.question_id)
                .map(|q| (q, answer))
        })
        .take(MAX_PROMPT_ANSWERS)
        .flat_map(|(question, answer)| {
            question
                .options
                .iter()
                .filter(|opt| answer.selected_options.contains(&opt.value))
                .map(|opt| opt.label.as_str())
        })
        .collect();

    let mut prompt = String::from(PROMPT_HEADER);
    prompt.push_str(&labels.join(", "));
    prompt.push_str("\n\nMENU:\n");
    for product in products {
        prompt.push_str(&product.name);
        prompt.push_str(" (");
        prompt.push_str(&product.slug);
        prompt.push(')');
        if !product.tags.is_empty() {
            prompt.push_str(" [");
            prompt.push_str(&product.tags.join(","));
            prompt.push(']');
        }
        prompt.push('\n');
    }
    prompt.push_str(PROMPT_INSTRUCTIONS);
    prompt
}

/// The JSON object the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAnswer {
    pub product_slugs: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Extract the recommendation object from free-form model output.
///
/// Markdown fences are stripped, then everything from the first `{` to the
/// last `}` is parsed.
///
/// # Errors
///
/// [`ServiceError::InvalidResponse`] when no object is found, it does not
/// parse, or it names no products.
pub fn parse_response(text: &str) -> Result<ModelAnswer, ServiceError> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text.get(start..=end),
        _ => None,
    }
    .ok_or_else(|| ServiceError::InvalidResponse("no JSON found in response".to_string()))?;

    let answer: ModelAnswer = serde_json::from_str(json)
        .map_err(|e| ServiceError::InvalidResponse(format!("failed to parse AI response: {e}")))?;
    if answer.product_slugs.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "AI returned no product recommendations".to_string(),
        ));
    }
    Ok(answer)
}

/// Keep slugs that name active products, first occurrence wins.
#[must_use]
pub fn validate_slugs(slugs: Vec<String>, products: &[ProductSummary]) -> Vec<String> {
    let known: HashSet<&str> = products.iter().map(|p| p.slug.as_str()).collect();
    let mut seen = HashSet::new();
    slugs
        .into_iter()
        .filter(|slug| known.contains(slug.as_str()) && seen.insert(slug.clone()))
        .collect()
}

/// Response of `POST /mood/recommend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub recommendations: Vec<String>,
    pub reasoning: String,
}

/// Recommendation operations for a single request.
pub struct RecommendationService<'a> {
    catalog: &'a dyn CatalogStore,
    sessions: &'a dyn AiSessionStore,
    reasoning: &'a dyn ReasoningService,
}

impl<'a> RecommendationService<'a> {
    #[must_use]
    pub const fn new(
        catalog: &'a dyn CatalogStore,
        sessions: &'a dyn AiSessionStore,
        reasoning: &'a dyn ReasoningService,
    ) -> Self {
        Self {
            catalog,
            sessions,
            reasoning,
        }
    }

    /// Active quiz questions in display order.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn questions(&self) -> Result<Vec<MoodQuestion>, ServiceError> {
        Ok(self.catalog.list_active_questions().await?)
    }

    /// The caller's past sessions, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn history(&self, owner: Option<&OwnerKey>) -> Result<Vec<AiSession>, ServiceError> {
        match owner {
            Some(owner) => Ok(self.sessions.find_by_owner(owner).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Run the pipeline for one set of answers.
    ///
    /// # Errors
    ///
    /// - `Validation` when no answers are given
    /// - `ExternalService` when the model cannot be reached
    /// - `InvalidResponse` when the reply is unusable or names no active
    ///   product
    #[instrument(skip(self, answers), fields(answers = answers.len()))]
    pub async fn recommend(
        &self,
        owner: Option<&OwnerKey>,
        answers: &[MoodAnswer],
    ) -> Result<Recommendation, ServiceError> {
        if answers.is_empty() {
            return Err(ServiceError::Validation("at least one answer is required".to_string()));
        }

        let products = self.catalog.find_active_products(None).await?;
        let categories = self.catalog.list_active_categories().await?;
        let questions = self.catalog.list_active_questions().await?;

        let category_names: HashMap<_, &str> = categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();
        let menu: Vec<ProductSummary> = products
            .iter()
            .map(|p| ProductSummary::from_product(p, &category_names))
            .collect();
        let quiz: Vec<QuestionSummary> = questions.iter().map(QuestionSummary::from).collect();

        let prompt = build_prompt(answers, &quiz, &menu);
        tracing::debug!(prompt_chars = prompt.len(), "sending recommendation prompt");

        let reply = self
            .reasoning
            .generate(&prompt, &GenerationParams::default())
            .await?;
        let parsed = parse_response(&reply)?;

        let slugs = validate_slugs(parsed.product_slugs, &menu);
        if slugs.is_empty() {
            return Err(ServiceError::InvalidResponse(
                "AI recommended no available products".to_string(),
            ));
        }

        let session = AiSession {
            id: AiSessionId::generate(),
            owner: owner.cloned(),
            answers: resolve_answers(answers, &questions),
            recommendations: slugs.clone(),
            reasoning: parsed.reasoning.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.sessions.create(&session).await {
            tracing::warn!(error = %e, "failed to record AI session");
        }

        Ok(Recommendation {
            recommendations: slugs,
            reasoning: parsed.reasoning,
        })
    }
}

/// Attach question text and option labels to the raw answers.
fn resolve_answers(answers: &[MoodAnswer], questions: &[MoodQuestion]) -> Vec<MoodAnswer> {
    answers
        .iter()
        .map(|answer| {
            let question = questions.iter().find(|q| q.id == answer.question_id);
            MoodAnswer {
                question_id: answer.question_id,
                selected_options: answer.selected_options.clone(),
                question_text: question.map(|q| q.text.clone()),
                answer_labels: question
                    .map(|q| q.labels_for(&answer.selected_options))
                    .unwrap_or_default(),
            }
        })
        .collect()
}
