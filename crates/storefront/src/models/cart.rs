//! Cart documents and their client-facing view.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fastspot_core::pricing::{self, Priced};
use fastspot_core::{CartId, CurrencyCode, OwnerKey, ProductId};

/// One product in a cart.
///
/// `name`, `image` and `unit_price` are copied from the catalog when the line
/// is first created and are not refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub excluded_ingredients: BTreeSet<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Priced for CartLine {
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn total(&self) -> Decimal {
        self.total
    }

    fn set_total(&mut self, total: Decimal) {
        self.total = total;
    }
}

/// A persisted cart. At most one exists per owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub owner: OwnerKey,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub currency: CurrencyCode,
    /// Bumped by every successful write; stale writers get a conflict.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// A fresh empty cart for `owner`. Not persisted yet.
    #[must_use]
    pub fn new(owner: OwnerKey, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::generate(),
            owner,
            lines: Vec::new(),
            total: Decimal::ZERO,
            currency: CurrencyCode::USD,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }

    /// Drop the line for `product_id`. Returns whether one was removed.
    pub fn remove_line(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    /// Recompute every line total and the cart total.
    pub fn recompute(&mut self) {
        self.total = pricing::recompute(&mut self.lines);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// What clients see for `GET /cart`.
///
/// Guests without any identity, and owners without a stored cart, get an
/// empty view with `id: null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Option<CartId>,
    pub items: Vec<CartLine>,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub item_count: i64,
}

impl CartView {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            id: None,
            items: Vec::new(),
            total: Decimal::ZERO,
            currency: CurrencyCode::USD,
            item_count: 0,
        }
    }
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let item_count = pricing::unit_count(&cart.lines);
        Self {
            id: Some(cart.id),
            items: cart.lines,
            total: cart.total,
            currency: cart.currency,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(cents: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::generate(),
            name: "Smash Burger".to_string(),
            image: String::new(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            total: Decimal::ZERO,
            excluded_ingredients: BTreeSet::new(),
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn test_recompute_sets_line_and_cart_totals() {
        let mut cart = Cart::new(OwnerKey::Session("s".into()), Utc::now());
        cart.lines.push(line(900, 2));
        cart.lines.push(line(250, 3));

        cart.recompute();

        assert_eq!(cart.total, Decimal::new(2550, 2));
        assert_eq!(cart.lines.iter().map(|l| l.total).sum::<Decimal>(), cart.total);
    }

    #[test]
    fn test_remove_line_reports_change() {
        let mut cart = Cart::new(OwnerKey::User("u".into()), Utc::now());
        let l = line(100, 1);
        let id = l.product_id;
        cart.lines.push(l);

        assert!(!cart.remove_line(ProductId::generate()));
        assert!(cart.remove_line(id));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_view_counts_units() {
        let mut cart = Cart::new(OwnerKey::User("u".into()), Utc::now());
        cart.lines.push(line(100, 2));
        cart.lines.push(line(100, 5));
        cart.recompute();

        let view = CartView::from(cart.clone());
        assert_eq!(view.id, Some(cart.id));
        assert_eq!(view.item_count, 7);
        assert_eq!(CartView::empty().id, None);
    }

    #[test]
    fn test_view_count_survives_huge_lines() {
        let mut cart = Cart::new(OwnerKey::User("u".into()), Utc::now());
        cart.lines.push(line(100, i32::MAX));
        cart.lines.push(line(100, i32::MAX));

        let view = CartView::from(cart);
        assert_eq!(view.item_count, 4_294_967_294);
    }
}
