//! Catalog entities: categories, products and promotions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fastspot_core::{CategoryId, ProductId, PromotionId};

/// A menu category (burgers, drinks, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub image: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Unit price in USD.
    pub price: Decimal,
    pub image: String,
    pub is_active: bool,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ingredient the customer may exclude.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub key: String,
    pub label: String,
    pub default_included: bool,
}

/// A customization group such as size or sauce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub choices: Vec<OptionChoice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Single,
    Multiple,
}

impl OptionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
        }
    }
}

impl std::str::FromStr for OptionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            other => Err(format!("unknown option kind: {other}")),
        }
    }
}

/// One selectable value of a [`ProductOption`].
///
/// `extra_price` is informational; line prices use the product price only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChoice {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub extra_price: Decimal,
}

impl Product {
    /// Case-insensitive substring match on the product name.
    #[must_use]
    pub fn name_matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// A time-boxed offer shown as a banner.
///
/// Visible only while active and `starts_at <= now < ends_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: PromotionId,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub banner_image: String,
    pub is_active: bool,
    /// Slugs of the products the offer covers.
    #[serde(default)]
    pub applies_to: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    #[must_use]
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now < self.ends_at
    }
}
