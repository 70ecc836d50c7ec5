//! Cart service.
//!
//! Every edit re-validates the selection against the product's current
//! variants; a line only ever holds a complete selection whose quantity fits
//! the stock at the time of the edit.

use sqlx::PgPool;
use tracing::instrument;

use athleon_core::variant::{ProductOptions, ResolvedSelection};
use athleon_core::{CartItemId, UserId, VariantId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::cart::{AddToCart, CartLine, CartView, UpdateCartItem};
use crate::models::catalog::Product;

/// Cart operations for one caller.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The caller's cart, priced against current variants.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView> {
        let rows = CartRepository::new(self.pool).list(user_id).await?;

        let mut product_ids: Vec<_> = rows.iter().map(|r| r.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let variants = ProductRepository::new(self.pool)
            .variants_for(&product_ids)
            .await?;

        let lines = rows
            .into_iter()
            .map(|row| {
                let own: Vec<_> = variants
                    .iter()
                    .filter(|v| v.product_id == row.product_id)
                    .cloned()
                    .collect();
                CartLine::price(row, &own)
            })
            .collect();
        Ok(CartView::new(lines))
    }

    /// Add units of a selection, merging with an identical line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Selection` if the selection is incomplete or the
    /// merged quantity exceeds stock, `AppError::NotFound` for an unknown or
    /// inactive product.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add(&self, user_id: UserId, input: &AddToCart) -> Result<CartItemId> {
        let products = ProductRepository::new(self.pool);
        let product = active_product(products.get(input.product_id).await?)?;
        let variants = products.variants(product.id).await?;

        let mut variant_ids = input.variant_ids.clone();
        variant_ids.sort_unstable();
        variant_ids.dedup();

        let cart = CartRepository::new(self.pool);
        let existing = cart
            .existing_quantity(user_id, product.id, &variant_ids)
            .await?;

        let quantity = if input.quantity == 0 {
            0
        } else {
            existing.saturating_add(input.quantity)
        };
        let resolved = ProductOptions::new(product.price, product.stock, &variants)
            .resolve(&variant_ids, quantity)?;

        let id = cart
            .upsert(user_id, product.id, &resolved.variant_ids, resolved.quantity)
            .await?;
        tracing::info!(cart_item_id = %id, quantity = resolved.quantity, "Added to cart");
        Ok(id)
    }

    /// Change the quantity and/or selection of a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the line is not the caller's,
    /// `AppError::Selection` if the new selection is invalid, and a conflict
    /// if the new selection duplicates another line.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: CartItemId,
        input: &UpdateCartItem,
    ) -> Result<ResolvedSelection> {
        let cart = CartRepository::new(self.pool);
        let row = cart
            .get(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_owned()))?;

        let products = ProductRepository::new(self.pool);
        let product = active_product(products.get(row.product_id).await?)?;
        let variants = products.variants(product.id).await?;

        let variant_ids: Vec<VariantId> = input
            .variant_ids
            .clone()
            .unwrap_or_else(|| row.variant_ids.clone());
        let quantity = input
            .quantity
            .unwrap_or_else(|| u32::try_from(row.quantity).unwrap_or(0));

        let resolved = ProductOptions::new(product.price, product.stock, &variants)
            .resolve(&variant_ids, quantity)?;

        cart.update(user_id, id, &resolved.variant_ids, resolved.quantity)
            .await?;
        Ok(resolved)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database(NotFound)` if the line is not the caller's.
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<()> {
        CartRepository::new(self.pool).delete(user_id, id).await?;
        Ok(())
    }

    /// Total units in the cart.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<u32> {
        Ok(CartRepository::new(self.pool).count(user_id).await?)
    }
}

/// An existing, purchasable product.
pub(crate) fn active_product(product: Option<Product>) -> Result<Product> {
    product
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
}
