use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub price: f64,
}

// The dialog only ever talks to the catalog through this trait, so the
// HTTP client, the in-memory fixture catalog and test mocks are
// interchangeable. An empty result is a valid answer, not an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search_restaurants(&self, query: &str) -> Result<Vec<Restaurant>>;

    /// An empty `query` lists the restaurant's top items.
    async fn search_menu(&self, restaurant_id: &str, query: &str) -> Result<Vec<MenuItem>>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
}

/// Catalog backed by a remote JSON API.
///
/// * `GET {base}/restaurants?q=<query>` -> `[{id, name, city?}]`
/// * `GET {base}/restaurants/{id}/menu?q=<query>` -> `[{id, name, price}]`
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build catalog HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String, query: &str) -> Result<T> {
        let resp = self.client.get(&url).query(&[("q", query)]).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url,
            }
            .into());
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Failed to decode catalog response from {url}"))
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn search_restaurants(&self, query: &str) -> Result<Vec<Restaurant>> {
        let url = format!("{}/restaurants", self.base_url);
        self.get_json(url, query).await
    }

    async fn search_menu(&self, restaurant_id: &str, query: &str) -> Result<Vec<MenuItem>> {
        let url = format!("{}/restaurants/{}/menu", self.base_url, restaurant_id);
        self.get_json(url, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = CatalogClient::new("http://localhost:8080/api/", Duration::from_secs(1))
            .expect("client builds");
        assert_eq!(client.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn restaurant_city_is_optional_on_the_wire() {
        let parsed: Vec<Restaurant> =
            serde_json::from_str(r#"[{"id": "r1", "name": "KFC Rondo"}]"#).unwrap();
        assert_eq!(parsed[0].city, None);

        let menu: Vec<MenuItem> =
            serde_json::from_str(r#"[{"id": "m1", "name": "Zinger Box", "price": 18}]"#).unwrap();
        assert_eq!(menu[0].price, 18.0);
    }

    // Needs a catalog service on localhost:8080. Run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_live_restaurant_search() {
        let client = CatalogClient::new("http://localhost:8080", Duration::from_secs(3))
            .expect("client builds");
        let restaurants = client
            .search_restaurants("kfc")
            .await
            .expect("catalog reachable");
        println!("Restaurants: {:?}", restaurants);
    }
}
