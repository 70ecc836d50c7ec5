//! Catalog repositories: products with variants, categories and banners.

use sqlx::{PgPool, Postgres, Transaction};

use athleon_core::envelope::{Page, page_window};
use athleon_core::variant::Variant;
use athleon_core::{BannerId, CategoryId, Money, ProductId, VariantId};

use super::RepositoryError;
use crate::models::catalog::{
    Banner, BannerInput, Category, CategoryInput, MAX_PER_PAGE, Product, ProductDetail,
    ProductInput, ProductQuery,
};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.category_id, c.name AS category_name, p.name, p.slug, p.description,
           p.price, p.stock, p.weight_grams, p.images, p.is_active, p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
";

/// Filters shared by the listing and its count; `$1` search, `$2` category
/// slug, `$3` whether inactive products are included.
const PRODUCT_FILTER: &str = r"
    WHERE ($1::TEXT IS NULL OR lower(p.name) LIKE $1)
      AND ($2::TEXT IS NULL OR c.slug = $2)
      AND ($3 OR p.is_active)
";

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    dimension: String,
    value: String,
    stock: i32,
    price_delta: Money,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            dimension: row.dimension,
            value: row.value,
            stock: row.stock,
            price_delta: row.price_delta,
        }
    }
}

/// Repository for products and their variants.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Page through products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        query: &ProductQuery,
        include_inactive: bool,
    ) -> Result<Page<Product>, RepositoryError> {
        let (page, per_page, offset) = page_window(query.page, query.per_page, MAX_PER_PAGE);
        let pattern = query.search().map(|q| format!("%{}%", q.to_lowercase()));
        let category = query.category();

        let items: Vec<Product> = sqlx::query_as(&format!(
            "{PRODUCT_SELECT} {PRODUCT_FILTER} ORDER BY {} LIMIT $4 OFFSET $5",
            query.sort.order_by()
        ))
        .bind(pattern.as_deref())
        .bind(category)
        .bind(include_inactive)
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id {PRODUCT_FILTER}"
        ))
        .bind(pattern.as_deref())
        .bind(category)
        .bind(include_inactive)
        .fetch_one(self.pool)
        .await?;

        Ok(Page::new(items, page, per_page, u64::try_from(total).unwrap_or(0)))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Variants of one product, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants(&self, product_id: ProductId) -> Result<Vec<Variant>, RepositoryError> {
        let rows: Vec<VariantRow> = sqlx::query_as(
            r"
            SELECT id, product_id, dimension, value, stock, price_delta
            FROM product_variants WHERE product_id = $1 ORDER BY id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Variant::from).collect())
    }

    /// Variants of several products at once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_for(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<Variant>, RepositoryError> {
        let rows: Vec<VariantRow> = sqlx::query_as(
            r"
            SELECT id, product_id, dimension, value, stock, price_delta
            FROM product_variants WHERE product_id = ANY($1) ORDER BY id
            ",
        )
        .bind(product_ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Variant::from).collect())
    }

    /// A product with its variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detail(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = self.get(id).await? else {
            return Ok(None);
        };
        let variants = self.variants(id).await?;
        Ok(Some(ProductDetail::new(product, variants)))
    }

    /// Active products related to `product`: same category first, then newest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recommended(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as(&format!(
            r"
            {PRODUCT_SELECT}
            WHERE p.is_active AND p.id <> $1
            ORDER BY (p.category_id IS NOT DISTINCT FROM $2) DESC, p.created_at DESC
            LIMIT $3
            "
        ))
        .bind(product.id)
        .bind(product.category_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Create a product with its variants.
    ///
    /// `input` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<ProductDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products
                (category_id, name, slug, description, price, stock, weight_grams, images, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.weight_grams)
        .bind(&input.images)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?;

        sync_variants(&mut tx, id, input).await?;
        tx.commit().await?;

        self.detail(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a product and reconcile its variants.
    ///
    /// Variants are matched on `(dimension, value)` so rows referenced by
    /// carts keep their ids; rows missing from `input` are deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<ProductDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE products SET
                category_id = $2, name = $3, slug = $4, description = $5, price = $6,
                stock = $7, weight_grams = $8, images = $9, is_active = $10, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.weight_grams)
        .bind(&input.images)
        .bind(input.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sync_variants(&mut tx, id, input).await?;
        tx.commit().await?;

        self.detail(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Order items keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn sync_variants(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    input: &ProductInput,
) -> Result<(), RepositoryError> {
    let dimensions: Vec<&str> = input.variants.iter().map(|v| v.dimension.as_str()).collect();
    let values: Vec<&str> = input.variants.iter().map(|v| v.value.as_str()).collect();

    sqlx::query(
        r"
        DELETE FROM product_variants v
        WHERE v.product_id = $1
          AND NOT EXISTS (
              SELECT 1 FROM UNNEST($2::TEXT[], $3::TEXT[]) AS keep(dimension, value)
              WHERE lower(keep.dimension) = lower(v.dimension)
                AND lower(keep.value) = lower(v.value)
          )
        ",
    )
    .bind(product_id)
    .bind(&dimensions)
    .bind(&values)
    .execute(&mut **tx)
    .await?;

    for variant in &input.variants {
        let updated = sqlx::query(
            r"
            UPDATE product_variants SET dimension = $2, value = $3, stock = $4, price_delta = $5
            WHERE product_id = $1 AND lower(dimension) = lower($2) AND lower(value) = lower($3)
            ",
        )
        .bind(product_id)
        .bind(&variant.dimension)
        .bind(&variant.value)
        .bind(variant.stock)
        .bind(variant.price_delta)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                r"
                INSERT INTO product_variants (product_id, dimension, value, stock, price_delta)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(product_id)
            .bind(&variant.dimension)
            .bind(&variant.value)
            .bind(variant.stock)
            .bind(variant.price_delta)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(())
}

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as(
            "SELECT id, name, slug, image_url, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        sqlx::query_as(
            r"
            INSERT INTO categories (name, slug, image_url) VALUES ($1, $2, $3)
            RETURNING id, name, slug, image_url, created_at, updated_at
            ",
        )
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))
    }

    /// Replace a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let category: Option<Category> = sqlx::query_as(
            r"
            UPDATE categories SET name = $2, slug = $3, image_url = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, name, slug, image_url, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.slug.as_deref().unwrap_or_default())
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?;

        category.ok_or(RepositoryError::NotFound)
    }

    /// Delete a category; its products become uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Repository for home-page banners.
pub struct BannerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BannerRepository<'a> {
    /// Create a new banner repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Banners in display order, optionally only active ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Banner>, RepositoryError> {
        let banners = sqlx::query_as(
            r"
            SELECT id, title, image_url, link_url, sort_order, is_active, created_at, updated_at
            FROM banners
            WHERE NOT $1 OR is_active
            ORDER BY sort_order, id
            ",
        )
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;
        Ok(banners)
    }

    /// Create a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &BannerInput) -> Result<Banner, RepositoryError> {
        let banner = sqlx::query_as(
            r"
            INSERT INTO banners (title, image_url, link_url, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, image_url, link_url, sort_order, is_active, created_at, updated_at
            ",
        )
        .bind(&input.title)
        .bind(&input.image_url)
        .bind(input.link_url.as_deref())
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(banner)
    }

    /// Replace a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn update(&self, id: BannerId, input: &BannerInput) -> Result<Banner, RepositoryError> {
        let banner: Option<Banner> = sqlx::query_as(
            r"
            UPDATE banners SET title = $2, image_url = $3, link_url = $4, sort_order = $5,
                               is_active = $6, updated_at = now()
            WHERE id = $1
            RETURNING id, title, image_url, link_url, sort_order, is_active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.image_url)
        .bind(input.link_url.as_deref())
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?;

        banner.ok_or(RepositoryError::NotFound)
    }

    /// Delete a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn delete(&self, id: BannerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM banners WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
