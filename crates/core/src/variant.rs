//! Variant grouping and selection.
//!
//! A product's variants are rows of `(dimension, value, stock, price delta)`,
//! e.g. `("Size", "42", 3, 0)` and `("Color", "Black", 5, 15000)`. A buyer
//! must pick exactly one value per dimension. This is the single place the
//! storefront validates a selection and prices it; cart add, cart edit,
//! buy-now and order creation all go through [`ProductOptions::resolve`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Money, ProductId, VariantId};

/// A single variant row of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    /// Dimension name, e.g. "Size".
    pub dimension: String,
    /// Value within the dimension, e.g. "XL".
    pub value: String,
    pub stock: i32,
    /// Added to the product's base price when selected.
    pub price_delta: Money,
}

impl Variant {
    /// Label like `Size: XL`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}: {}", self.dimension, self.value)
    }
}

/// Variants sharing a dimension name, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantGroup<'a> {
    pub dimension: &'a str,
    pub options: Vec<&'a Variant>,
}

/// Group variants by dimension, preserving the order dimensions first appear.
///
/// Dimension names are compared case-insensitively so "size" and "Size" rows
/// end up in one group.
#[must_use]
pub fn group_by_dimension(variants: &[Variant]) -> Vec<VariantGroup<'_>> {
    let mut groups: Vec<VariantGroup<'_>> = Vec::new();
    for variant in variants {
        match groups
            .iter_mut()
            .find(|g| g.dimension.eq_ignore_ascii_case(&variant.dimension))
        {
            Some(group) => group.options.push(variant),
            None => groups.push(VariantGroup {
                dimension: &variant.dimension,
                options: vec![variant],
            }),
        }
    }
    groups
}

/// Why a variant selection was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The id is not a variant of this product.
    #[error("variant {0} does not belong to this product")]
    UnknownVariant(VariantId),

    /// More than one value was picked for a dimension.
    #[error("choose only one {0}")]
    DuplicateDimension(String),

    /// No value was picked for a dimension.
    #[error("choose a {0}")]
    MissingDimension(String),

    /// Quantity must be at least one.
    #[error("quantity must be at least 1")]
    EmptyQuantity,

    /// Not enough stock for the requested quantity.
    #[error("only {available} left in stock")]
    InsufficientStock { requested: u32, available: u32 },

    /// The chosen deltas bring the price below zero.
    #[error("this combination is not for sale")]
    NegativePrice(Money),
}

/// The priced outcome of a valid selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSelection {
    /// Chosen variant ids, sorted ascending.
    pub variant_ids: Vec<VariantId>,
    /// Labels of the chosen variants in dimension order.
    pub labels: Vec<String>,
    /// Base price plus the chosen deltas.
    pub unit_price: Money,
    /// Units that can be bought with this selection.
    pub available: u32,
    pub quantity: u32,
}

impl ResolvedSelection {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// What a buyer can choose for one product.
#[derive(Debug, Clone, Copy)]
pub struct ProductOptions<'a> {
    pub base_price: Money,
    /// Stock used when the product has no variants.
    pub stock: i32,
    pub variants: &'a [Variant],
}

impl<'a> ProductOptions<'a> {
    #[must_use]
    pub const fn new(base_price: Money, stock: i32, variants: &'a [Variant]) -> Self {
        Self {
            base_price,
            stock,
            variants,
        }
    }

    /// Validate a selection and price it.
    ///
    /// A selection is valid when every id belongs to the product, each
    /// dimension has exactly one chosen value, and `quantity` is between one
    /// and the minimum stock of the chosen rows (product stock when the
    /// product has no variants). Duplicate ids count once.
    ///
    /// # Errors
    ///
    /// Returns the first [`SelectionError`] found, checking membership, then
    /// dimensions, then quantity, then price.
    pub fn resolve(
        &self,
        selected: &[VariantId],
        quantity: u32,
    ) -> Result<ResolvedSelection, SelectionError> {
        let mut ids = selected.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut chosen = Vec::with_capacity(ids.len());
        for id in &ids {
            let variant = self
                .variants
                .iter()
                .find(|v| v.id == *id)
                .ok_or(SelectionError::UnknownVariant(*id))?;
            chosen.push(variant);
        }

        let mut labels = Vec::with_capacity(chosen.len());
        for group in group_by_dimension(self.variants) {
            let mut picked = chosen
                .iter()
                .filter(|v| v.dimension.eq_ignore_ascii_case(group.dimension));
            match (picked.next(), picked.next()) {
                (Some(variant), None) => labels.push(variant.label()),
                (Some(_), Some(_)) => {
                    return Err(SelectionError::DuplicateDimension(group.dimension.to_owned()));
                }
                (None, _) => {
                    return Err(SelectionError::MissingDimension(group.dimension.to_owned()));
                }
            }
        }

        if quantity == 0 {
            return Err(SelectionError::EmptyQuantity);
        }

        let available_stock = chosen
            .iter()
            .map(|v| v.stock)
            .min()
            .unwrap_or(self.stock)
            .max(0);
        let available = u32::try_from(available_stock).unwrap_or(0);
        if quantity > available {
            return Err(SelectionError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        let unit_price = self.base_price + chosen.iter().map(|v| v.price_delta).sum::<Money>();
        if unit_price.is_negative() {
            return Err(SelectionError::NegativePrice(unit_price));
        }

        Ok(ResolvedSelection {
            variant_ids: ids,
            labels,
            unit_price,
            available,
            quantity,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn variant(id: i32, dimension: &str, value: &str, stock: i32, delta: i64) -> Variant {
        Variant {
            id: VariantId::new(id),
            product_id: ProductId::new(1),
            dimension: dimension.to_owned(),
            value: value.to_owned(),
            stock,
            price_delta: Money::from_rupiah(delta),
        }
    }

    fn shoe_variants() -> Vec<Variant> {
        vec![
            variant(1, "Size", "41", 4, 0),
            variant(2, "Size", "42", 2, 0),
            variant(3, "Size", "44", 6, 25_000),
            variant(4, "Color", "Black", 5, 0),
            variant(5, "color", "Volt", 1, 15_000),
        ]
    }

    #[test]
    fn test_rejects_price_below_zero() {
        let variants = vec![variant(1, "Size", "Kids", 5, -20_000)];
        let options = ProductOptions::new(Money::from_rupiah(10_000), 0, &variants);

        assert_eq!(
            options.resolve(&[VariantId::new(1)], 2),
            Err(SelectionError::NegativePrice(Money::from_rupiah(-10_000)))
        );

        let options = ProductOptions::new(Money::from_rupiah(20_000), 0, &variants);
        let resolved = options.resolve(&[VariantId::new(1)], 2).unwrap();
        assert_eq!(resolved.unit_price, Money::ZERO);
    }

    #[test]
    fn test_group_by_dimension_preserves_order() {
        let variants = shoe_variants();
        let groups = group_by_dimension(&variants);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].dimension, "Size");
        assert_eq!(groups[0].options.len(), 3);
        assert_eq!(groups[1].dimension, "Color");
        assert_eq!(groups[1].options.len(), 2);
    }

    #[test]
    fn test_requires_one_value_per_dimension() {
        let variants = shoe_variants();
        let options = ProductOptions::new(Money::from_rupiah(500_000), 0, &variants);

        assert_eq!(
            options.resolve(&[], 1),
            Err(SelectionError::MissingDimension("Size".to_owned()))
        );
        assert_eq!(
            options.resolve(&[VariantId::new(1)], 1),
            Err(SelectionError::MissingDimension("Color".to_owned()))
        );
        assert_eq!(
            options.resolve(&[VariantId::new(1), VariantId::new(2), VariantId::new(4)], 1),
            Err(SelectionError::DuplicateDimension("Size".to_owned()))
        );
    }

    #[test]
    fn test_prices_selection_with_deltas() {
        let variants = shoe_variants();
        let options = ProductOptions::new(Money::from_rupiah(500_000), 0, &variants);

        let resolved = options
            .resolve(&[VariantId::new(5), VariantId::new(3)], 1)
            .unwrap();
        assert_eq!(resolved.variant_ids, vec![VariantId::new(3), VariantId::new(5)]);
        assert_eq!(resolved.labels, vec!["Size: 44", "color: Volt"]);
        assert_eq!(resolved.unit_price, Money::from_rupiah(540_000));
        assert_eq!(resolved.available, 1);
        assert_eq!(resolved.line_total(), Money::from_rupiah(540_000));
    }

    #[test]
    fn test_available_is_min_stock_of_chosen_rows() {
        let variants = shoe_variants();
        let options = ProductOptions::new(Money::from_rupiah(500_000), 100, &variants);

        let resolved = options
            .resolve(&[VariantId::new(2), VariantId::new(4)], 2)
            .unwrap();
        assert_eq!(resolved.available, 2);

        assert_eq!(
            options.resolve(&[VariantId::new(2), VariantId::new(4)], 3),
            Err(SelectionError::InsufficientStock {
                requested: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_rejects_foreign_variant_and_zero_quantity() {
        let variants = shoe_variants();
        let options = ProductOptions::new(Money::from_rupiah(500_000), 0, &variants);

        assert_eq!(
            options.resolve(&[VariantId::new(1), VariantId::new(99)], 1),
            Err(SelectionError::UnknownVariant(VariantId::new(99)))
        );
        assert_eq!(
            options.resolve(&[VariantId::new(1), VariantId::new(4)], 0),
            Err(SelectionError::EmptyQuantity)
        );
    }

    #[test]
    fn test_duplicate_ids_count_once() {
        let variants = shoe_variants();
        let options = ProductOptions::new(Money::from_rupiah(500_000), 0, &variants);

        let resolved = options
            .resolve(&[VariantId::new(1), VariantId::new(1), VariantId::new(4)], 1)
            .unwrap();
        assert_eq!(resolved.variant_ids.len(), 2);
    }

    #[test]
    fn test_product_without_variants_uses_product_stock() {
        let options = ProductOptions::new(Money::from_rupiah(89_000), 3, &[]);

        let resolved = options.resolve(&[], 3).unwrap();
        assert_eq!(resolved.unit_price, Money::from_rupiah(89_000));
        assert!(resolved.labels.is_empty());
        assert!(matches!(
            options.resolve(&[], 4),
            Err(SelectionError::InsufficientStock { available: 3, .. })
        ));
        assert_eq!(
            options.resolve(&[VariantId::new(1)], 1),
            Err(SelectionError::UnknownVariant(VariantId::new(1)))
        );
    }

    #[test]
    fn test_negative_stock_treated_as_sold_out() {
        let variants = vec![variant(1, "Size", "M", -2, 0)];
        let options = ProductOptions::new(Money::from_rupiah(10_000), 0, &variants);
        assert_eq!(
            options.resolve(&[VariantId::new(1)], 1),
            Err(SelectionError::InsufficientStock {
                requested: 1,
                available: 0
            })
        );
    }
}
