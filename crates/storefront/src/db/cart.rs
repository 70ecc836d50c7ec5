//! Cart repository.

use sqlx::PgPool;

use athleon_core::{CartItemId, ProductId, UserId, VariantId};

use super::RepositoryError;
use crate::models::cart::CartItemRow;

const CART_SELECT: &str = r"
    SELECT ci.id, ci.product_id, ci.variant_ids, ci.quantity,
           p.name AS product_name, p.slug AS product_slug, p.price, p.stock,
           p.weight_grams, p.images, p.is_active
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
";

/// Repository for the persisted cart.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every line of the user's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartItemRow>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{CART_SELECT} WHERE ci.user_id = $1 ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The given lines of the user's cart; ids owned by someone else are
    /// silently absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_ids(
        &self,
        user_id: UserId,
        ids: &[CartItemId],
    ) -> Result<Vec<CartItemRow>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{CART_SELECT} WHERE ci.user_id = $1 AND ci.id = ANY($2) ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id)
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// One line of the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItemRow>, RepositoryError> {
        let row = sqlx::query_as(&format!("{CART_SELECT} WHERE ci.user_id = $1 AND ci.id = $2"))
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Quantity already in the cart for this exact selection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn existing_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_ids: &[VariantId],
    ) -> Result<u32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2 AND variant_ids = $3",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_ids)
        .fetch_optional(self.pool)
        .await?;
        Ok(quantity.and_then(|q| u32::try_from(q).ok()).unwrap_or(0))
    }

    /// Insert a line or set the quantity of the identical selection.
    ///
    /// `variant_ids` must be sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_ids: &[VariantId],
        quantity: u32,
    ) -> Result<CartItemId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO cart_items (user_id, product_id, variant_ids, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id, variant_ids)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = now()
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_ids)
        .bind(to_i32(quantity)?)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Change the selection and quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not the user's,
    /// `RepositoryError::Conflict` if another line already holds the selection.
    pub async fn update(
        &self,
        user_id: UserId,
        id: CartItemId,
        variant_ids: &[VariantId],
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items SET variant_ids = $3, quantity = $4, updated_at = now()
            WHERE user_id = $1 AND id = $2
            ",
        )
        .bind(user_id)
        .bind(id)
        .bind(variant_ids)
        .bind(to_i32(quantity)?)
        .execute(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::unique_violation(e, "this selection is already in your cart")
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not the user's.
    pub async fn delete(&self, user_id: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Total units in the cart, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<u32, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM cart_items WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

fn to_i32(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} is too large")))
}
