//! Cart and order totals.

use serde::{Deserialize, Serialize};

use crate::Money;

/// Aggregate of a set of priced lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Number of distinct lines.
    pub line_count: u32,
    /// Sum of quantities (shown on the cart badge).
    pub item_count: u32,
    pub subtotal: Money,
}

impl CartTotals {
    /// Sum `(unit_price, quantity)` pairs.
    #[must_use]
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        lines
            .into_iter()
            .fold(Self::default(), |mut acc, (unit_price, quantity)| {
                acc.line_count = acc.line_count.saturating_add(1);
                acc.item_count = acc.item_count.saturating_add(quantity);
                acc.subtotal += unit_price.times(quantity);
                acc
            })
    }
}

/// Totals fixed on an order at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
}

impl OrderTotals {
    #[must_use]
    pub fn new(subtotal: Money, shipping_cost: Money) -> Self {
        Self {
            subtotal,
            shipping_cost,
            total: subtotal + shipping_cost,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::variant::{ProductOptions, Variant};
    use crate::{ProductId, VariantId};

    #[test]
    fn test_resolved_line_adds_deltas_before_multiplying() {
        let variants = [("Size", 10_000), ("Color", 5_000)]
            .iter()
            .zip(1..)
            .map(|(&(dimension, delta), id)| Variant {
                id: VariantId::new(id),
                product_id: ProductId::new(1),
                dimension: dimension.to_owned(),
                value: "Any".to_owned(),
                stock: 5,
                price_delta: Money::from_rupiah(delta),
            })
            .collect::<Vec<_>>();
        let resolved = ProductOptions::new(Money::from_rupiah(300_000), 0, &variants)
            .resolve(&[VariantId::new(1), VariantId::new(2)], 2)
            .unwrap();

        let totals = CartTotals::from_lines([(resolved.unit_price, resolved.quantity)]);
        assert_eq!(resolved.line_total(), Money::from_rupiah(630_000));
        assert_eq!(totals.subtotal, Money::from_rupiah(630_000));
    }

    #[test]
    fn test_cart_totals_sum_every_line() {
        let lines = [
            (Money::from_rupiah(315_000), 2),
            (Money::from_rupiah(89_000), 1),
            (Money::from_rupiah(45_500), 3),
        ];
        let totals = CartTotals::from_lines(lines);
        assert_eq!(totals.line_count, 3);
        assert_eq!(totals.item_count, 6);
        assert_eq!(totals.subtotal, Money::from_rupiah(855_500));
    }

    #[test]
    fn test_empty_cart() {
        let totals = CartTotals::from_lines(std::iter::empty());
        assert_eq!(totals, CartTotals::default());
        assert_eq!(totals.subtotal, Money::ZERO);
    }

    #[test]
    fn test_order_totals() {
        let totals = OrderTotals::new(Money::from_rupiah(855_500), Money::from_rupiah(18_000));
        assert_eq!(totals.total, Money::from_rupiah(873_500));
    }
}
