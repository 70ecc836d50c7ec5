//! Cart lines and payloads.

use serde::{Deserialize, Serialize};

use athleon_core::cart::CartTotals;
use athleon_core::variant::{ProductOptions, Variant};
use athleon_core::{CartItemId, Money, ProductId, VariantId};

/// A cart row joined with its product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_ids: Vec<VariantId>,
    pub quantity: i32,
    pub product_name: String,
    pub product_slug: String,
    pub price: Money,
    pub stock: i32,
    pub weight_grams: i32,
    pub images: Vec<String>,
    pub is_active: bool,
}

/// A priced cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub image: Option<String>,
    pub variant_ids: Vec<VariantId>,
    pub variant_labels: Vec<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    /// Units currently buyable with this selection.
    pub available: u32,
    /// Why the line cannot be checked out, if it cannot.
    pub problem: Option<String>,
}

impl CartLine {
    /// Price a row against the product's current variants.
    ///
    /// Lines whose product was deactivated, whose variants changed, or whose
    /// quantity exceeds stock are still returned, flagged with `problem`.
    #[must_use]
    pub fn price(row: CartItemRow, variants: &[Variant]) -> Self {
        let quantity = u32::try_from(row.quantity).unwrap_or(0);
        let options = ProductOptions::new(row.price, row.stock, variants);

        let (labels, unit_price, available, problem) =
            match options.resolve(&row.variant_ids, quantity) {
                Ok(resolved) => (resolved.labels, resolved.unit_price, resolved.available, None),
                Err(err) => {
                    let chosen: Vec<&Variant> = variants
                        .iter()
                        .filter(|v| row.variant_ids.contains(&v.id))
                        .collect();
                    let unit_price =
                        row.price + chosen.iter().map(|v| v.price_delta).sum::<Money>();
                    let available = chosen
                        .iter()
                        .map(|v| v.stock)
                        .min()
                        .unwrap_or(row.stock)
                        .max(0);
                    (
                        chosen.iter().map(|v| v.label()).collect(),
                        unit_price,
                        u32::try_from(available).unwrap_or(0),
                        Some(err.to_string()),
                    )
                }
            };

        let problem = if row.is_active {
            problem
        } else {
            Some("product is no longer available".to_owned())
        };

        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_slug: row.product_slug,
            image: row.images.into_iter().next(),
            variant_ids: row.variant_ids,
            variant_labels: labels,
            unit_price,
            quantity,
            subtotal: unit_price.times(quantity),
            available,
            problem,
        }
    }
}

/// The caller's cart with totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

impl CartView {
    #[must_use]
    pub fn new(items: Vec<CartLine>) -> Self {
        let totals = CartTotals::from_lines(items.iter().map(|l| (l.unit_price, l.quantity)));
        Self { items, totals }
    }
}

/// `POST /api/customer/keranjang`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_ids: Vec<VariantId>,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

/// `PUT /api/customer/keranjang/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartItem {
    pub quantity: Option<u32>,
    pub variant_ids: Option<Vec<VariantId>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(variant_ids: Vec<i32>, quantity: i32, active: bool) -> CartItemRow {
        CartItemRow {
            id: CartItemId::new(1),
            product_id: ProductId::new(10),
            variant_ids: variant_ids.into_iter().map(VariantId::new).collect(),
            quantity,
            product_name: "Court Jersey".to_owned(),
            product_slug: "court-jersey".to_owned(),
            price: Money::from_rupiah(200_000),
            stock: 0,
            weight_grams: 400,
            images: vec![],
            is_active: active,
        }
    }

    fn variants() -> Vec<Variant> {
        vec![
            Variant {
                id: VariantId::new(1),
                product_id: ProductId::new(10),
                dimension: "Size".to_owned(),
                value: "L".to_owned(),
                stock: 5,
                price_delta: Money::ZERO,
            },
            Variant {
                id: VariantId::new(2),
                product_id: ProductId::new(10),
                dimension: "Size".to_owned(),
                value: "XXL".to_owned(),
                stock: 1,
                price_delta: Money::from_rupiah(20_000),
            },
        ]
    }

    #[test]
    fn test_price_valid_line() {
        let line = CartLine::price(row(vec![2], 1, true), &variants());
        assert_eq!(line.unit_price, Money::from_rupiah(220_000));
        assert_eq!(line.subtotal, Money::from_rupiah(220_000));
        assert_eq!(line.variant_labels, vec!["Size: XXL".to_owned()]);
        assert!(line.problem.is_none());
    }

    #[test]
    fn test_price_flags_stock_shortfall() {
        let line = CartLine::price(row(vec![2], 3, true), &variants());
        assert_eq!(line.available, 1);
        assert_eq!(line.subtotal, Money::from_rupiah(660_000));
        assert_eq!(line.problem.as_deref(), Some("only 1 left in stock"));
    }

    #[test]
    fn test_price_flags_inactive_product() {
        let line = CartLine::price(row(vec![1], 1, false), &variants());
        assert_eq!(line.problem.as_deref(), Some("product is no longer available"));
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::new(vec![
            CartLine::price(row(vec![1], 2, true), &variants()),
            CartLine::price(row(vec![2], 1, true), &variants()),
        ]);
        assert_eq!(view.totals.item_count, 3);
        assert_eq!(view.totals.subtotal, Money::from_rupiah(620_000));
    }
}
