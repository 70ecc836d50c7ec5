//! Order repository.
//!
//! Orders are written once, in a single transaction that locks the products
//! and variants being bought, re-validates every selection against current
//! stock, decrements it, and writes the order, its items and its payment.
//! After that the item set never changes; only status, airway bill, review
//! and payment fields move.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use athleon_core::cart::OrderTotals;
use athleon_core::checkout::ShippingQuote;
use athleon_core::envelope::{Page, page_window};
use athleon_core::variant::{ProductOptions, Variant};
use athleon_core::{
    CartItemId, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
    VariantId,
};

use super::RepositoryError;
use crate::models::address::ShippingAddress;
use crate::models::order::{Order, OrderDetail, OrderItem, Payment};

const ORDER_COLUMNS: &str = r"
    id, order_number, user_id, status, payment_method, subtotal, shipping_cost, total,
    courier_code, courier_name, service_code, service_name, shipping_etd, shipping_address,
    airway_bill, rating, review, reviewed_at, paid_at, shipped_at, completed_at, cancelled_at,
    created_at, updated_at
";

const ITEM_COLUMNS: &str = r"
    id, order_id, product_id, variant_ids, product_name, product_image, variant_labels,
    unit_price, quantity, line_total
";

const PAYMENT_COLUMNS: &str = r"
    id, order_id, gateway, status, amount, snap_token, redirect_url, transaction_id,
    payment_type, last_notification, created_at, updated_at
";

/// One line to buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub variant_ids: Vec<VariantId>,
    pub quantity: u32,
}

/// Everything needed to write an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub rate: ShippingQuote,
    pub address: ShippingAddress,
    pub lines: Vec<NewOrderLine>,
    /// Cart lines consumed by this order (empty for buy-now).
    pub cart_item_ids: Vec<CartItemId>,
}

/// Payment fields reported by the gateway.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct LockedProduct {
    id: ProductId,
    name: String,
    price: Money,
    stock: i32,
    images: Vec<String>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct LockedVariant {
    id: VariantId,
    product_id: ProductId,
    dimension: String,
    value: String,
    stock: i32,
    price_delta: Money,
}

#[derive(sqlx::FromRow)]
struct StockLine {
    product_id: Option<ProductId>,
    variant_ids: Vec<VariantId>,
    quantity: i32,
}

/// Repository for orders, their items and payments.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write an order, reserving stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` with a customer-facing message when
    /// a product is gone, inactive, or short on stock, or when the selection
    /// no longer matches the product's variants. Nothing is written then.
    pub async fn create(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        if new.lines.is_empty() {
            return Err(RepositoryError::Conflict("there is nothing to order".to_owned()));
        }

        let mut tx = self.pool.begin().await?;

        let mut product_ids: Vec<ProductId> = new.lines.iter().map(|l| l.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let products: Vec<LockedProduct> = sqlx::query_as(
            r"
            SELECT id, name, price, stock, images, is_active FROM products
            WHERE id = ANY($1) ORDER BY id FOR UPDATE
            ",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;
        let mut products: HashMap<ProductId, LockedProduct> =
            products.into_iter().map(|p| (p.id, p)).collect();

        let mut variants: Vec<Variant> = sqlx::query_as::<_, LockedVariant>(
            r"
            SELECT id, product_id, dimension, value, stock, price_delta FROM product_variants
            WHERE product_id = ANY($1) ORDER BY id FOR UPDATE
            ",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|v| Variant {
            id: v.id,
            product_id: v.product_id,
            dimension: v.dimension,
            value: v.value,
            stock: v.stock,
            price_delta: v.price_delta,
        })
        .collect();

        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let product = products.get_mut(&line.product_id).ok_or_else(|| {
                RepositoryError::Conflict("a product in your order no longer exists".to_owned())
            })?;
            if !product.is_active {
                return Err(RepositoryError::Conflict(format!(
                    "{} is no longer available",
                    product.name
                )));
            }

            let own_variants: Vec<Variant> = variants
                .iter()
                .filter(|v| v.product_id == product.id)
                .cloned()
                .collect();
            let resolved = ProductOptions::new(product.price, product.stock, &own_variants)
                .resolve(&line.variant_ids, line.quantity)
                .map_err(|e| RepositoryError::Conflict(format!("{}: {e}", product.name)))?;
            let quantity = i32::try_from(resolved.quantity)
                .map_err(|_| RepositoryError::Conflict("quantity is too large".to_owned()))?;

            if resolved.variant_ids.is_empty() {
                product.stock -= quantity;
                sqlx::query("UPDATE products SET stock = stock - $2, updated_at = now() WHERE id = $1")
                    .bind(product.id)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await?;
            } else {
                for variant in variants
                    .iter_mut()
                    .filter(|v| resolved.variant_ids.contains(&v.id))
                {
                    variant.stock -= quantity;
                }
                sqlx::query("UPDATE product_variants SET stock = stock - $2 WHERE id = ANY($1)")
                    .bind(&resolved.variant_ids)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await?;
            }

            items.push((
                product.id,
                product.name.clone(),
                product.images.first().cloned(),
                resolved.line_total(),
                resolved,
            ));
        }

        let subtotal: Money = items.iter().map(|(.., total, _)| *total).sum();
        let totals = OrderTotals::new(subtotal, new.rate.price);

        let order_id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders
                (order_number, user_id, status, payment_method, subtotal, shipping_cost, total,
                 courier_code, courier_name, service_code, service_name, shipping_etd,
                 shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            ",
        )
        .bind(&new.order_number)
        .bind(new.user_id)
        .bind(new.payment_method.initial_order_status())
        .bind(new.payment_method)
        .bind(totals.subtotal)
        .bind(totals.shipping_cost)
        .bind(totals.total)
        .bind(&new.rate.courier_code)
        .bind(&new.rate.courier_name)
        .bind(&new.rate.service_code)
        .bind(&new.rate.service_name)
        .bind(&new.rate.duration)
        .bind(Json(&new.address))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "order number already exists"))?;

        for (product_id, name, image, line_total, resolved) in &items {
            sqlx::query(
                r"
                INSERT INTO order_items
                    (order_id, product_id, variant_ids, product_name, product_image,
                     variant_labels, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(order_id)
            .bind(product_id)
            .bind(&resolved.variant_ids)
            .bind(name)
            .bind(image.as_deref())
            .bind(&resolved.labels)
            .bind(resolved.unit_price)
            .bind(i32::try_from(resolved.quantity).unwrap_or(i32::MAX))
            .bind(line_total)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO payments (order_id, gateway, amount) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(payment_gateway(new.payment_method))
            .bind(totals.total)
            .execute(&mut *tx)
            .await?;

        if !new.cart_item_ids.is_empty() {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
                .bind(new.user_id)
                .bind(&new.cart_item_ids)
                .execute(&mut *tx)
                .await?;
        }

        let order = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Get one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Get an order by its order number (the gateway's `order_id`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// The payment row of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payment(&self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(payment)
    }

    /// Attach items and payment to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let items = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;
        let payment = self.payment(order.id).await?;
        Ok(OrderDetail::new(order, items, payment))
    }

    /// Page through orders, newest first, with items and payments attached.
    ///
    /// `user_id` restricts to one customer; `search` matches order numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        search: Option<&str>,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Page<OrderDetail>, RepositoryError> {
        const FILTER: &str = r"
            WHERE ($1::INTEGER IS NULL OR user_id = $1)
              AND ($2::order_status IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR order_number ILIKE $3)
        ";

        let (page, per_page, offset) = page_window(page, per_page, 50);
        let pattern = search.map(|s| format!("%{s}%"));

        let orders: Vec<Order> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders {FILTER} ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(status)
        .bind(pattern.as_deref())
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {FILTER}"))
            .bind(user_id)
            .bind(status)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let items: Vec<OrderItem> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        let payments: Vec<Payment> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }
        let mut payments: HashMap<OrderId, Payment> =
            payments.into_iter().map(|p| (p.order_id, p)).collect();

        let details = orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                let payment = payments.remove(&order.id);
                OrderDetail::new(order, items, payment)
            })
            .collect();

        Ok(Page::new(details, page, per_page, u64::try_from(total).unwrap_or(0)))
    }

    /// Move an order to `next`, validating the lifecycle.
    ///
    /// Entering `Dikirim` stores `airway_bill`; entering `Dibatalkan` returns
    /// the reserved stock; completing a cash-on-delivery order marks its
    /// payment paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist,
    /// `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn transition(
        &self,
        id: OrderId,
        next: OrderStatus,
        airway_bill: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (current, method) = lock_status(&mut tx, id).await?;
        current
            .transition(next)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        apply_status(&mut tx, id, next, airway_bill).await?;

        if next == OrderStatus::Selesai && method == PaymentMethod::Cod {
            sqlx::query(
                "UPDATE payments SET status = 'paid', updated_at = now() WHERE order_id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Store a rating and review on a completed, not yet reviewed order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is not completed or
    /// already reviewed.
    pub async fn save_review(
        &self,
        id: OrderId,
        rating: i16,
        review: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let order: Option<Order> = sqlx::query_as(&format!(
            r"
            UPDATE orders SET rating = $2, review = $3, reviewed_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'selesai' AND rating IS NULL
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(rating)
        .bind(review)
        .fetch_optional(self.pool)
        .await?;

        order.ok_or_else(|| {
            RepositoryError::Conflict(
                "only completed orders can be reviewed, and only once".to_owned(),
            )
        })
    }

    /// Store the Snap token and redirect URL of an order's payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_snap_token(
        &self,
        order_id: OrderId,
        token: &str,
        redirect_url: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE payments SET snap_token = $2, redirect_url = $3, updated_at = now()
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .bind(token)
        .bind(redirect_url)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Apply a gateway payment status.
    ///
    /// Idempotent: a paid payment stays paid, and only an order still in
    /// `BelumDibayar` moves (to `Dikemas` when paid, to `Dibatalkan` with
    /// stock returned when failed).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn apply_payment(
        &self,
        order_id: OrderId,
        update: &PaymentUpdate,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let (current, _) = lock_status(&mut tx, order_id).await?;

        sqlx::query(
            r"
            UPDATE payments SET
                status = CASE WHEN status = 'paid' THEN status ELSE $2 END,
                transaction_id = COALESCE($3, transaction_id),
                payment_type = COALESCE($4, payment_type),
                last_notification = $5,
                updated_at = now()
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .bind(update.status)
        .bind(update.transaction_id.as_deref())
        .bind(update.payment_type.as_deref())
        .bind(Json(&update.raw))
        .execute(&mut *tx)
        .await?;

        if current == OrderStatus::BelumDibayar {
            match update.status {
                PaymentStatus::Paid => {
                    apply_status(&mut tx, order_id, OrderStatus::Dikemas, None).await?;
                }
                PaymentStatus::Failed => {
                    apply_status(&mut tx, order_id, OrderStatus::Dibatalkan, None).await?;
                }
                PaymentStatus::Pending => {}
            }
        }

        let order = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Unpaid gateway orders created before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stale_unpaid(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = 'belum_dibayar' AND payment_method = 'midtrans' AND created_at < $1
            ORDER BY created_at
            "
        ))
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }
}

const fn payment_gateway(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Midtrans => "midtrans",
        PaymentMethod::Cod => "cod",
    }
}

async fn fetch_order(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<Order, RepositoryError> {
    let order: Option<Order> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
    order.ok_or(RepositoryError::NotFound)
}

async fn lock_status(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<(OrderStatus, PaymentMethod), RepositoryError> {
    let row: Option<(OrderStatus, PaymentMethod)> =
        sqlx::query_as("SELECT status, payment_method FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
    row.ok_or(RepositoryError::NotFound)
}

/// Write a status and its timestamp. The caller has validated the move.
async fn apply_status(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
    next: OrderStatus,
    airway_bill: Option<&str>,
) -> Result<(), RepositoryError> {
    let timestamp_column = match next {
        OrderStatus::BelumDibayar => None,
        OrderStatus::Dikemas => Some("paid_at"),
        OrderStatus::Dikirim => Some("shipped_at"),
        OrderStatus::Selesai => Some("completed_at"),
        OrderStatus::Dibatalkan => Some("cancelled_at"),
    };
    let stamp = timestamp_column
        .map(|column| format!(", {column} = COALESCE({column}, now())"))
        .unwrap_or_default();

    sqlx::query(&format!(
        "UPDATE orders SET status = $2, airway_bill = COALESCE($3, airway_bill), updated_at = now(){stamp} WHERE id = $1"
    ))
    .bind(id)
    .bind(next)
    .bind(airway_bill)
    .execute(&mut **tx)
    .await?;

    if next.releases_stock() {
        restock(tx, id).await?;
    }
    Ok(())
}

/// Return an order's reserved units to product or variant stock.
async fn restock(tx: &mut Transaction<'_, Postgres>, id: OrderId) -> Result<(), RepositoryError> {
    let lines: Vec<StockLine> =
        sqlx::query_as("SELECT product_id, variant_ids, quantity FROM order_items WHERE order_id = $1")
            .bind(id)
            .fetch_all(&mut **tx)
            .await?;

    for line in lines {
        if !line.variant_ids.is_empty() {
            sqlx::query("UPDATE product_variants SET stock = stock + $2 WHERE id = ANY($1)")
                .bind(&line.variant_ids)
                .bind(line.quantity)
                .execute(&mut **tx)
                .await?;
        } else if let Some(product_id) = line.product_id {
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
                .bind(product_id)
                .bind(line.quantity)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}
