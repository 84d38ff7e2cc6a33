//! Cart engine.
//!
//! Every mutation is a read-modify-write of the owner's whole cart: load,
//! apply the change, recompute totals, then write back conditionally on the
//! version that was read. A lost race is retried a few times before the
//! conflict reaches the caller.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use fastspot_core::pricing::{MAX_LINE_QUANTITY, line_total, merge_quantity, normalize_add_quantity};
use fastspot_core::{OwnerKey, ProductId};

use super::ServiceError;
use crate::db::{CartStore, CatalogStore, RepositoryError};
use crate::models::{Cart, CartLine, CartView, Product};

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Body of `POST /cart/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one", alias = "qty")]
    pub quantity: i32,
    pub excluded_ingredients: Option<BTreeSet<String>>,
    pub options: Option<BTreeMap<String, String>>,
}

/// Body of `PUT /cart/items/{product_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[serde(alias = "qty")]
    pub quantity: i32,
    pub excluded_ingredients: Option<BTreeSet<String>>,
    pub options: Option<BTreeMap<String, String>>,
}

const fn one() -> i32 {
    1
}

enum CartChange<'r> {
    Add {
        product: &'r Product,
        quantity: i32,
        excluded: Option<&'r BTreeSet<String>>,
        options: Option<&'r BTreeMap<String, String>>,
    },
    Update {
        product_id: ProductId,
        quantity: i32,
        excluded: Option<&'r BTreeSet<String>>,
        options: Option<&'r BTreeMap<String, String>>,
    },
    Remove(ProductId),
    Clear,
}

/// Cart operations for a single request.
pub struct CartService<'a> {
    catalog: &'a dyn CatalogStore,
    carts: &'a dyn CartStore,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn CatalogStore, carts: &'a dyn CartStore) -> Self {
        Self { catalog, carts }
    }

    /// The owner's cart, or an empty view.
    ///
    /// Never fails: a missing identity, a missing cart and a store error all
    /// produce the empty view (the error is logged).
    #[instrument(skip(self))]
    pub async fn get(&self, owner: Option<&OwnerKey>) -> CartView {
        let Some(owner) = owner else {
            return CartView::empty();
        };
        match self.carts.find_by_owner(owner).await {
            Ok(Some(cart)) => cart.into(),
            Ok(None) => CartView::empty(),
            Err(e) => {
                tracing::warn!(error = %e, "cart lookup failed, returning empty cart");
                CartView::empty()
            }
        }
    }

    /// Add a product, merging with an existing line for the same product.
    /// Without an identity there is no cart to add to and the empty view is
    /// returned.
    ///
    /// # Errors
    ///
    /// - `Validation` when the line would exceed [`MAX_LINE_QUANTITY`]
    /// - `NotFound` when the product is unknown or inactive
    /// - `Conflict` when concurrent writers keep winning
    #[instrument(skip(self, req), fields(product_id = %req.product_id, quantity = req.quantity))]
    pub async fn add_item(
        &self,
        owner: Option<&OwnerKey>,
        req: &AddItemRequest,
    ) -> Result<CartView, ServiceError> {
        let Some(owner) = owner else {
            return Ok(CartView::empty());
        };
        check_quantity(req.quantity)?;

        let product = self
            .catalog
            .find_product_by_id(req.product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let change = CartChange::Add {
            product: &product,
            quantity: normalize_add_quantity(req.quantity),
            excluded: req.excluded_ingredients.as_ref(),
            options: req.options.as_ref(),
        };
        let cart = self.mutate(owner, &change).await?;
        Ok(cart.map_or_else(CartView::empty, CartView::from))
    }

    /// Replace a line's quantity. A quantity of zero or less removes the line.
    /// Without an identity the empty view is returned.
    ///
    /// # Errors
    ///
    /// `NotFound` when there is no cart or no line for the product,
    /// `Validation` above [`MAX_LINE_QUANTITY`].
    #[instrument(skip(self, req), fields(quantity = req.quantity))]
    pub async fn update_item(
        &self,
        owner: Option<&OwnerKey>,
        product_id: ProductId,
        req: &UpdateItemRequest,
    ) -> Result<CartView, ServiceError> {
        let Some(owner) = owner else {
            return Ok(CartView::empty());
        };
        check_quantity(req.quantity)?;
        let change = CartChange::Update {
            product_id,
            quantity: req.quantity,
            excluded: req.excluded_ingredients.as_ref(),
            options: req.options.as_ref(),
        };
        let cart = self.mutate(owner, &change).await?;
        Ok(cart.map_or_else(CartView::empty, CartView::from))
    }

    /// Remove a line. Removing a product that is not in the cart succeeds.
    /// Without an identity the empty view is returned.
    ///
    /// # Errors
    ///
    /// `NotFound` when the owner has no cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        owner: Option<&OwnerKey>,
        product_id: ProductId,
    ) -> Result<CartView, ServiceError> {
        let Some(owner) = owner else {
            return Ok(CartView::empty());
        };
        let cart = self.mutate(owner, &CartChange::Remove(product_id)).await?;
        Ok(cart.map_or_else(CartView::empty, CartView::from))
    }

    /// Empty the cart. Succeeds when there is nothing to clear.
    ///
    /// # Errors
    ///
    /// Store failures and exhausted write retries.
    #[instrument(skip(self))]
    pub async fn clear(&self, owner: Option<&OwnerKey>) -> Result<CartView, ServiceError> {
        let Some(owner) = owner else {
            return Ok(CartView::empty());
        };
        let cart = self.mutate(owner, &CartChange::Clear).await?;
        Ok(cart.map_or_else(CartView::empty, CartView::from))
    }

    /// Apply `change` with bounded retries on version conflicts.
    ///
    /// Returns `None` when there was no cart and the change does not create
    /// one.
    async fn mutate(
        &self,
        owner: &OwnerKey,
        change: &CartChange<'_>,
    ) -> Result<Option<Cart>, ServiceError> {
        let mut attempt = 1;
        loop {
            match self.try_mutate(owner, change, Utc::now()).await {
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(attempt, %reason, "cart write lost a race, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
                Ok(outcome) => return outcome,
            }
        }
    }

    /// One read-modify-write round.
    ///
    /// The outer `Result` carries store errors (so conflicts can be retried);
    /// the inner one carries business rule failures.
    async fn try_mutate(
        &self,
        owner: &OwnerKey,
        change: &CartChange<'_>,
        now: DateTime<Utc>,
    ) -> Result<Result<Option<Cart>, ServiceError>, RepositoryError> {
        let existing = self.carts.find_by_owner(owner).await?;
        let (mut cart, is_new) = match (existing, change) {
            (Some(cart), _) => (cart, false),
            (None, CartChange::Add { .. }) => (Cart::new(owner.clone(), now), true),
            (None, CartChange::Clear) => return Ok(Ok(None)),
            (None, CartChange::Update { .. } | CartChange::Remove(_)) => {
                return Ok(Err(cart_not_found()));
            }
        };

        if let Err(e) = apply(&mut cart, change) {
            return Ok(Err(e));
        }
        cart.recompute();
        cart.updated_at = now;

        let stored = if is_new {
            self.carts.create(&cart).await?
        } else {
            self.carts.replace(&cart).await?
        };
        Ok(Ok(Some(stored)))
    }
}

fn cart_not_found() -> ServiceError {
    ServiceError::NotFound("Cart not found".to_string())
}

fn quantity_too_large() -> ServiceError {
    ServiceError::Validation(format!("quantity may not exceed {MAX_LINE_QUANTITY}"))
}

fn check_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(quantity_too_large());
    }
    Ok(())
}

fn apply(cart: &mut Cart, change: &CartChange<'_>) -> Result<(), ServiceError> {
    match *change {
        CartChange::Add {
            product,
            quantity,
            excluded,
            options,
        } => {
            if let Some(line) = cart.line_mut(product.id) {
                line.quantity = merge_quantity(line.quantity, quantity)
                    .ok_or_else(quantity_too_large)?;
                overwrite_choices(line, excluded, options);
            } else {
                cart.lines.push(CartLine {
                    product_id: product.id,
                    name: product.name.clone(),
                    image: product.image.clone(),
                    quantity,
                    unit_price: product.price,
                    total: line_total(product.price, quantity),
                    excluded_ingredients: excluded.cloned().unwrap_or_default(),
                    options: options.cloned().unwrap_or_default(),
                });
            }
        }
        CartChange::Update {
            product_id,
            quantity,
            excluded,
            options,
        } => {
            let line = cart
                .line_mut(product_id)
                .ok_or_else(|| ServiceError::NotFound("Item not found in cart".to_string()))?;
            if quantity <= 0 {
                cart.remove_line(product_id);
            } else {
                line.quantity = quantity;
                overwrite_choices(line, excluded, options);
            }
        }
        CartChange::Remove(product_id) => {
            cart.remove_line(product_id);
        }
        CartChange::Clear => cart.lines.clear(),
    }
    Ok(())
}

/// Supplied customizations replace the stored ones; omitted ones are kept.
fn overwrite_choices(
    line: &mut CartLine,
    excluded: Option<&BTreeSet<String>>,
    options: Option<&BTreeMap<String, String>>,
) {
    if let Some(excluded) = excluded {
        line.excluded_ingredients.clone_from(excluded);
    }
    if let Some(options) = options {
        line.options.clone_from(options);
    }
}
