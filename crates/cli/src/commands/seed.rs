//! Seed the catalog from a YAML file.
//!
//! The file lists categories, products and banners. Products reference
//! their category by slug. Seeding is idempotent: entries whose slug (or,
//! for banners, title) already exists are skipped.
//!
//! ```yaml
//! categories:
//!   - name: Running
//! products:
//!   - name: Velocity Runner
//!     category: running
//!     price: "899000"
//!     variants:
//!       - { dimension: size, value: "42", stock: 5 }
//! banners:
//!   - title: New season
//!     image_url: https://cdn.athleon.id/banners/new-season.jpg
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use athleon_core::CategoryId;
use athleon_core::envelope::FieldErrors;
use athleon_storefront::db::{
    BannerRepository, CategoryRepository, ProductRepository, RepositoryError,
};
use athleon_storefront::models::{BannerInput, CategoryInput, ProductInput};

use super::{CommandError, connect};

/// Top-level layout of a catalog seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub categories: Vec<CategoryInput>,
    pub products: Vec<SeedProduct>,
    pub banners: Vec<BannerInput>,
}

/// A product entry, with its category given by slug.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub category: Option<String>,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// Counts reported at the end of a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    created: usize,
    skipped: usize,
}

/// Parse and validate a seed document.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or an entry fails validation.
pub fn parse(source: &str) -> Result<CatalogSeed, CommandError> {
    let seed: CatalogSeed = serde_yaml::from_str(source)?;

    let categories = seed
        .categories
        .into_iter()
        .map(|c| {
            let entry = format!("category {:?}", c.name);
            c.normalize().map_err(|e| invalid(entry, &e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let products = seed
        .products
        .into_iter()
        .map(|p| {
            let entry = format!("product {:?}", p.product.name);
            let product = p.product.normalize().map_err(|e| invalid(entry, &e))?;
            Ok(SeedProduct {
                category: p.category,
                product,
            })
        })
        .collect::<Result<Vec<_>, CommandError>>()?;

    let banners = seed
        .banners
        .into_iter()
        .map(|b| {
            let entry = format!("banner {:?}", b.title);
            b.normalize().map_err(|e| invalid(entry, &e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CatalogSeed {
        categories,
        products,
        banners,
    })
}

fn invalid(entry: String, errors: &FieldErrors) -> CommandError {
    CommandError::Invalid {
        entry,
        message: errors.first_message().unwrap_or("invalid").to_owned(),
    }
}

/// Seed the catalog from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product names
/// an unknown category, or a database call fails.
pub async fn catalog(file_path: &Path) -> Result<(), CommandError> {
    let source = std::fs::read_to_string(file_path).map_err(|source| CommandError::Io {
        path: file_path.display().to_string(),
        source,
    })?;
    let seed = parse(&source)?;
    info!(
        path = %file_path.display(),
        categories = seed.categories.len(),
        products = seed.products.len(),
        banners = seed.banners.len(),
        "Loaded catalog seed"
    );

    let pool = connect().await?;

    let categories = CategoryRepository::new(&pool);
    let mut tally = Tally::default();
    for input in &seed.categories {
        record(&mut tally, "category", &input.name, categories.create(input).await)?;
    }
    info!(created = tally.created, skipped = tally.skipped, "Categories seeded");

    let category_ids: HashMap<String, CategoryId> = categories
        .list()
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();

    let products = ProductRepository::new(&pool);
    let mut tally = Tally::default();
    for entry in seed.products {
        let mut input = entry.product;
        if let Some(slug) = entry.category {
            let id = category_ids.get(&slug).ok_or_else(|| CommandError::Invalid {
                entry: format!("product {:?}", input.name),
                message: format!("unknown category {slug:?}"),
            })?;
            input.category_id = Some(*id);
        }
        record(&mut tally, "product", &input.name, products.create(&input).await)?;
    }
    info!(created = tally.created, skipped = tally.skipped, "Products seeded");

    let banners = BannerRepository::new(&pool);
    let existing: Vec<String> = banners
        .list(false)
        .await?
        .into_iter()
        .map(|b| b.title)
        .collect();
    let mut tally = Tally::default();
    for input in &seed.banners {
        if existing.contains(&input.title) {
            tally.skipped += 1;
            continue;
        }
        banners.create(input).await?;
        tally.created += 1;
    }
    info!(created = tally.created, skipped = tally.skipped, "Banners seeded");

    Ok(())
}

fn record<T>(
    tally: &mut Tally,
    kind: &str,
    name: &str,
    result: Result<T, RepositoryError>,
) -> Result<(), CommandError> {
    match result {
        Ok(_) => tally.created += 1,
        Err(RepositoryError::Conflict(_)) => {
            warn!(kind, name, "Already exists, skipping");
            tally.skipped += 1;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Running Shoes
products:
  - name: " Velocity Runner "
    category: running-shoes
    price: "899000"
    variants:
      - { dimension: size, value: "42", stock: 5 }
banners:
  - title: New season
    image_url: https://cdn.athleon.id/banners/new-season.jpg
"#;

    #[test]
    fn test_parse_normalizes_entries() {
        let seed = parse(SAMPLE).unwrap();

        assert_eq!(seed.categories.len(), 1);
        assert_eq!(seed.categories[0].slug.as_deref(), Some("running-shoes"));

        let product = &seed.products[0];
        assert_eq!(product.category.as_deref(), Some("running-shoes"));
        assert_eq!(product.product.name, "Velocity Runner");
        assert_eq!(product.product.slug.as_deref(), Some("velocity-runner"));
        assert_eq!(product.product.variants.len(), 1);

        assert!(seed.banners[0].is_active);
    }

    #[test]
    fn test_parse_empty_document() {
        let seed = parse("{}").unwrap();
        assert!(seed.categories.is_empty());
        assert!(seed.products.is_empty());
    }

    #[test]
    fn test_parse_rejects_invalid_entry() {
        let err = parse("banners:\n  - title: ' '\n    image_url: x\n").unwrap_err();
        assert!(matches!(err, CommandError::Invalid { ref entry, .. } if entry.contains("banner")));
    }
}
