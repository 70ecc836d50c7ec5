//! Catalog domain types: categories, products, variants and banners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use athleon_core::envelope::FieldErrors;
use athleon_core::variant::{Variant, group_by_dimension};
use athleon_core::{BannerId, CategoryId, Money, ProductId};

/// Largest page size a catalog listing serves.
pub const MAX_PER_PAGE: u32 = 48;

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product without its variants, as listed in the catalog.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub stock: i32,
    pub weight_grams: i32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image, used as the thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Variants sharing a dimension, owned for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct VariantGroupView {
    pub dimension: String,
    pub options: Vec<Variant>,
}

/// A product with its variants grouped by dimension.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    /// Total units buyable across variants (product stock without variants).
    pub available_stock: i32,
    pub variants: Vec<Variant>,
    pub variant_groups: Vec<VariantGroupView>,
}

impl ProductDetail {
    #[must_use]
    pub fn new(product: Product, variants: Vec<Variant>) -> Self {
        let variant_groups = group_by_dimension(&variants)
            .into_iter()
            .map(|group| VariantGroupView {
                dimension: group.dimension.to_owned(),
                options: group.options.into_iter().cloned().collect(),
            })
            .collect::<Vec<_>>();

        // A buyer picks one value per dimension, so the scarcest dimension
        // bounds what can be sold.
        let available_stock = variant_groups
            .iter()
            .map(|group| group.options.iter().map(|v| v.stock.max(0)).sum::<i32>())
            .min()
            .unwrap_or(product.stock);

        Self {
            product,
            available_stock,
            variants,
            variant_groups,
        }
    }
}

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// `ORDER BY` clause for the products query.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "lower(p.name) ASC, p.id ASC",
        }
    }
}

/// Query string of `GET /api/produk`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive name search.
    pub q: Option<String>,
    /// Category slug.
    pub kategori: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductQuery {
    /// Trimmed search term, `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Trimmed category slug, `None` when blank.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.kategori
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A home-page banner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Banner {
    pub id: BannerId,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Back-office payloads
// =============================================================================

/// Create or replace a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub image_url: Option<String>,
}

impl CategoryInput {
    /// Validate and fill in the slug.
    ///
    /// # Errors
    ///
    /// Returns the field errors found.
    pub fn normalize(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        self.name = self.name.trim().to_owned();
        errors.check(self.name.is_empty(), "name", "name is required");
        self.slug = Some(slug_or_name(self.slug.as_deref(), &self.name));
        errors.check(
            self.slug.as_deref().is_none_or(str::is_empty),
            "slug",
            "slug must contain letters or digits",
        );
        self.image_url = non_blank(self.image_url);
        errors.into_result().map(|()| self)
    }
}

/// One variant row in a product payload.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantInput {
    pub dimension: String,
    pub value: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub price_delta: Money,
}

/// Create or replace a product and its variants.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_weight")]
    pub weight_grams: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

const fn default_weight() -> i32 {
    500
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Validate, trim and fill in the slug.
    ///
    /// # Errors
    ///
    /// Returns the field errors found. Variant errors are keyed
    /// `variants.{index}.{field}`.
    pub fn normalize(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        self.name = self.name.trim().to_owned();
        errors.check(self.name.is_empty(), "name", "name is required");
        let slug = slug_or_name(self.slug.as_deref(), &self.name);
        errors.check(slug.is_empty(), "slug", "slug must contain letters or digits");
        self.slug = Some(slug);
        self.description = self.description.trim().to_owned();
        errors.check(self.price.is_negative(), "price", "price cannot be negative");
        errors.check(!self.price.is_whole(), "price", "price must be whole rupiah");
        errors.check(self.stock < 0, "stock", "stock cannot be negative");
        errors.check(self.weight_grams <= 0, "weight_grams", "weight must be positive");
        self.images = self
            .images
            .into_iter()
            .filter_map(|url| non_blank(Some(url)))
            .collect();

        let mut seen: Vec<(String, String)> = Vec::with_capacity(self.variants.len());
        for (index, variant) in self.variants.iter_mut().enumerate() {
            variant.dimension = variant.dimension.trim().to_owned();
            variant.value = variant.value.trim().to_owned();
            let field = |name: &str| format!("variants.{index}.{name}");

            errors.check(
                variant.dimension.is_empty(),
                &field("dimension"),
                "dimension is required",
            );
            errors.check(variant.value.is_empty(), &field("value"), "value is required");
            errors.check(variant.stock < 0, &field("stock"), "stock cannot be negative");
            errors.check(
                !variant.price_delta.is_whole(),
                &field("price_delta"),
                "price delta must be whole rupiah",
            );

            let key = (
                variant.dimension.to_lowercase(),
                variant.value.to_lowercase(),
            );
            if seen.contains(&key) {
                errors.add(field("value"), "duplicate variant value");
            } else {
                seen.push(key);
            }
        }

        if !self.price.is_negative() && self.cheapest_combination().is_negative() {
            errors.add(
                "price",
                "price plus the cheapest variant deltas cannot be negative",
            );
        }

        errors.into_result().map(|()| self)
    }

    /// Base price plus the lowest delta of every dimension.
    fn cheapest_combination(&self) -> Money {
        let mut lowest: Vec<(String, Money)> = Vec::new();
        for variant in &self.variants {
            let dimension = variant.dimension.to_lowercase();
            match lowest.iter_mut().find(|(d, _)| *d == dimension) {
                Some((_, delta)) => *delta = (*delta).min(variant.price_delta),
                None => lowest.push((dimension, variant.price_delta)),
            }
        }
        self.price + lowest.into_iter().map(|(_, delta)| delta).sum::<Money>()
    }
}

/// Create or replace a banner.
#[derive(Debug, Clone, Deserialize)]
pub struct BannerInput {
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl BannerInput {
    /// Validate and trim.
    ///
    /// # Errors
    ///
    /// Returns the field errors found.
    pub fn normalize(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        self.title = self.title.trim().to_owned();
        self.image_url = self.image_url.trim().to_owned();
        errors.check(self.title.is_empty(), "title", "title is required");
        errors.check(self.image_url.is_empty(), "image_url", "image is required");
        self.link_url = non_blank(self.link_url);
        errors.into_result().map(|()| self)
    }
}

/// URL-safe slug: lowercase ASCII letters and digits joined by single dashes.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn slug_or_name(slug: Option<&str>, name: &str) -> String {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug),
        None => slugify(name),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use athleon_core::VariantId;

    use super::*;

    fn product(stock: i32) -> Product {
        Product {
            id: ProductId::new(1),
            category_id: None,
            category_name: None,
            name: "Velocity Runner".to_owned(),
            slug: "velocity-runner".to_owned(),
            description: String::new(),
            price: Money::from_rupiah(750_000),
            stock,
            weight_grams: 800,
            images: vec!["https://cdn.athleon.id/velocity.jpg".to_owned()],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(id: i32, dimension: &str, value: &str, stock: i32) -> Variant {
        Variant {
            id: VariantId::new(id),
            product_id: ProductId::new(1),
            dimension: dimension.to_owned(),
            value: value.to_owned(),
            stock,
            price_delta: Money::ZERO,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Velocity Runner 2.0"), "velocity-runner-2-0");
        assert_eq!(slugify("  --Sepatu  Lari!! "), "sepatu-lari");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_detail_groups_variants_and_bounds_stock() {
        let detail = ProductDetail::new(
            product(0),
            vec![
                variant(1, "Size", "41", 3),
                variant(2, "Size", "42", 4),
                variant(3, "Color", "Black", 2),
            ],
        );
        assert_eq!(detail.variant_groups.len(), 2);
        assert_eq!(detail.variant_groups[0].options.len(), 2);
        assert_eq!(detail.available_stock, 2);
        assert_eq!(detail.product.thumbnail(), Some("https://cdn.athleon.id/velocity.jpg"));
    }

    #[test]
    fn test_detail_without_variants_uses_product_stock() {
        let detail = ProductDetail::new(product(9), vec![]);
        assert_eq!(detail.available_stock, 9);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Velocity Runner");
        assert_eq!(json["variant_groups"], serde_json::json!([]));
    }

    #[test]
    fn test_product_input_validation() {
        let input: ProductInput = serde_json::from_value(serde_json::json!({
            "name": "  ",
            "price": "-1",
            "weight_grams": 0,
            "variants": [
                { "dimension": "Size", "value": "42" },
                { "dimension": "size", "value": " 42 " },
                { "dimension": "", "value": "Black", "stock": -1 }
            ]
        }))
        .unwrap();

        let errors = input.normalize().unwrap_err();
        assert!(errors.get("name").is_some());
        assert!(errors.get("price").is_some());
        assert!(errors.get("weight_grams").is_some());
        assert_eq!(
            errors.get("variants.1.value").map(<[String]>::to_vec),
            Some(vec!["duplicate variant value".to_owned()])
        );
        assert!(errors.get("variants.2.dimension").is_some());
        assert!(errors.get("variants.2.stock").is_some());
    }

    #[test]
    fn test_product_input_rejects_fractional_and_negative_prices() {
        let input: ProductInput = serde_json::from_value(serde_json::json!({
            "name": "Kaos Kaki",
            "price": "250000.50",
            "variants": [{ "dimension": "Size", "value": "S", "price_delta": "0.25" }]
        }))
        .unwrap();
        let errors = input.normalize().unwrap_err();
        assert!(errors.get("price").is_some());
        assert!(errors.get("variants.0.price_delta").is_some());

        let input: ProductInput = serde_json::from_value(serde_json::json!({
            "name": "Kaos Kaki",
            "price": "10000",
            "variants": [
                { "dimension": "Size", "value": "S", "price_delta": "-20000" },
                { "dimension": "Size", "value": "M" }
            ]
        }))
        .unwrap();
        let errors = input.normalize().unwrap_err();
        assert_eq!(
            errors.get("price").map(<[String]>::to_vec),
            Some(vec!["price plus the cheapest variant deltas cannot be negative".to_owned()])
        );

        let input: ProductInput = serde_json::from_value(serde_json::json!({
            "name": "Kaos Kaki",
            "price": "20000",
            "variants": [{ "dimension": "Size", "value": "S", "price_delta": "-20000" }]
        }))
        .unwrap();
        assert!(input.normalize().is_ok());
    }

    #[test]
    fn test_product_input_defaults_and_slug() {
        let input: ProductInput = serde_json::from_value(serde_json::json!({
            "name": " Jersey Home 2026 ",
            "price": "250000",
            "images": ["", " https://cdn.athleon.id/jersey.jpg "]
        }))
        .unwrap();

        let input = input.normalize().unwrap();
        assert_eq!(input.slug.as_deref(), Some("jersey-home-2026"));
        assert_eq!(input.weight_grams, 500);
        assert!(input.is_active);
        assert_eq!(input.images, vec!["https://cdn.athleon.id/jersey.jpg".to_owned()]);
    }

    #[test]
    fn test_category_and_banner_validation() {
        let category = CategoryInput {
            name: "Sepatu".to_owned(),
            slug: None,
            image_url: Some("  ".to_owned()),
        }
        .normalize()
        .unwrap();
        assert_eq!(category.slug.as_deref(), Some("sepatu"));
        assert!(category.image_url.is_none());

        let errors = BannerInput {
            title: String::new(),
            image_url: " ".to_owned(),
            link_url: None,
            sort_order: 0,
            is_active: true,
        }
        .normalize()
        .unwrap_err();
        assert!(errors.get("title").is_some());
        assert!(errors.get("image_url").is_some());
    }

    #[test]
    fn test_query_helpers() {
        let query: ProductQuery = serde_json::from_value(serde_json::json!({
            "q": "  runner ",
            "kategori": "",
            "sort": "price_asc"
        }))
        .unwrap();
        assert_eq!(query.search(), Some("runner"));
        assert_eq!(query.category(), None);
        assert_eq!(query.sort, ProductSort::PriceAsc);
        assert_eq!(ProductSort::default().order_by(), "p.created_at DESC, p.id DESC");
    }
}
