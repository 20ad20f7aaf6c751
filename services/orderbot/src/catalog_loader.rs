use crate::config::{CatalogSource, DialogSettings};
use anyhow::{Context, Result};
use order_core::DialogManager;
use order_core::catalog::{Catalog, CatalogClient, Restaurant};
use order_core::fare::PlaceholderFare;
use order_core::static_catalog::StaticCatalog;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub fn load_static_catalog(path: &Path) -> Result<StaticCatalog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    StaticCatalog::from_json(&content)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
}

pub fn build_catalog(settings: &DialogSettings) -> Result<Arc<dyn Catalog>> {
    match &settings.catalog {
        CatalogSource::Remote(url) => {
            tracing::info!("Using remote catalog at {}", url);
            Ok(Arc::new(CatalogClient::new(
                url.clone(),
                settings.catalog_timeout,
            )?))
        }
        CatalogSource::File(path) => {
            let catalog = load_static_catalog(path)?;
            tracing::info!(
                "Loaded {} restaurants from {}",
                catalog.len(),
                path.display()
            );
            Ok(Arc::new(catalog))
        }
    }
}

/// Builds the dialog manager, resolving the configured default restaurant
/// against the catalog so responses can name it.
pub async fn build_dialog(settings: &DialogSettings) -> Result<DialogManager> {
    let catalog = build_catalog(settings)?;
    let fare = Arc::new(PlaceholderFare::new(settings.fare_min, settings.fare_max));
    let dialog = DialogManager::new(catalog.clone(), fare);

    let Some(id) = &settings.default_restaurant_id else {
        return Ok(dialog);
    };

    let known = match catalog.search_restaurants("").await {
        Ok(restaurants) => restaurants.into_iter().find(|r| &r.id == id),
        Err(e) => {
            tracing::warn!("Could not list restaurants to resolve {}: {:?}", id, e);
            None
        }
    };
    let restaurant = known.unwrap_or_else(|| {
        tracing::warn!("Default restaurant {} not found in catalog, using its id as name", id);
        Restaurant {
            id: id.clone(),
            name: id.clone(),
            city: None,
        }
    });
    tracing::info!("Default restaurant: {} ({})", restaurant.name, restaurant.id);
    Ok(dialog.with_default_restaurant(restaurant))
}
