//! Address repository.
//!
//! At most one address per user is the default; the partial unique index
//! `addresses_one_default_per_user` backs this, so every write that sets
//! `is_default` clears the previous default first inside one transaction.

use sqlx::{PgPool, Postgres, Transaction};

use athleon_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = r"
    id, user_id, label, receiver_name, receiver_phone, address_line, province, city,
    district, village, postal_code, latitude, longitude, area_id, is_default, created_at, updated_at
";

/// Repository for shipping addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }

    /// One of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(address)
    }

    /// Save a new address. The first address a user saves becomes the default.
    ///
    /// `input` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_any: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || !has_any;
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as(&format!(
            r"
            INSERT INTO addresses
                (user_id, label, receiver_name, receiver_phone, address_line, province, city,
                 district, village, postal_code, latitude, longitude, area_id, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.label.as_deref())
        .bind(&input.receiver_name)
        .bind(&input.receiver_phone)
        .bind(&input.address_line)
        .bind(&input.province)
        .bind(&input.city)
        .bind(&input.district)
        .bind(&input.village)
        .bind(&input.postal_code)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.area_id.as_deref())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Replace an address.
    ///
    /// Unchecking `is_default` on the current default leaves it the default;
    /// choose another address as default instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address: Option<Address> = sqlx::query_as(&format!(
            r"
            UPDATE addresses SET
                label = $3, receiver_name = $4, receiver_phone = $5, address_line = $6,
                province = $7, city = $8, district = $9, village = $10, postal_code = $11,
                latitude = $12, longitude = $13, area_id = $14,
                is_default = is_default OR $15, updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(id)
        .bind(input.label.as_deref())
        .bind(&input.receiver_name)
        .bind(&input.receiver_phone)
        .bind(&input.address_line)
        .bind(&input.province)
        .bind(&input.city)
        .bind(&input.district)
        .bind(&input.village)
        .bind(&input.postal_code)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.area_id.as_deref())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?;

        let address = address.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user_id).await?;

        let address: Option<Address> = sqlx::query_as(&format!(
            r"
            UPDATE addresses SET is_default = TRUE, updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let address = address.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(address)
    }

    /// Delete an address. Deleting the default promotes the newest remaining one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM addresses WHERE user_id = $1 AND id = $2 RETURNING is_default",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_default {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE addresses SET is_default = TRUE, updated_at = now()
                    WHERE id = (
                        SELECT id FROM addresses WHERE user_id = $1
                        ORDER BY created_at DESC, id DESC LIMIT 1
                    )
                    ",
                )
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
