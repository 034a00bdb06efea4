//! Seed the product catalog from a YAML file.
//!
//! The file is either a bare list of products or a map with a `products`
//! key. Products are upserted by name, so re-running a seed updates price
//! and stock in place.
//!
//! ```yaml
//! products:
//!   - name: Arduino Uno R3
//!     price: "35000.00"
//!     stock: 12
//!     category: boards
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use quardcube_storefront::db::{self, NewProduct, ProductRepository};

use super::{CommandError, database_url};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Wrapped { products: Vec<NewProduct> },
    List(Vec<NewProduct>),
}

impl SeedFile {
    fn into_products(self) -> Vec<NewProduct> {
        match self {
            Self::Wrapped { products } | Self::List(products) => products,
        }
    }
}

fn parse_products(path: &str, content: &str) -> Result<Vec<NewProduct>, CommandError> {
    serde_yaml::from_str::<SeedFile>(content)
        .map(SeedFile::into_products)
        .map_err(|source| CommandError::Yaml {
            path: path.to_owned(),
            source,
        })
}

/// Upsert every product in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the database URL
/// is missing, or an upsert fails.
pub async fn products(file_path: &str) -> Result<(), CommandError> {
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;

    // Parse before connecting so a bad file fails fast.
    let products = parse_products(file_path, &content)?;
    info!(path = %file_path, count = products.len(), "Parsed product seed file");

    let pool = db::create_pool(&database_url()?).await?;
    let repo = ProductRepository::new(&pool);

    for product in &products {
        let saved = repo.upsert_by_name(product).await?;
        info!(id = %saved.id, name = %saved.name, stock = saved.stock, "Upserted product");
    }

    info!(count = products.len(), "Seeding complete");
    Ok(())
}
