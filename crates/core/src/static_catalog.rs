use crate::catalog::{Catalog, MenuItem, Restaurant};
use crate::resolver::normalize;
use anyhow::Result;
use async_trait::async_trait;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Deserialize;

// Minimum skim score for a fuzzy menu hit.
const FUZZY_THRESHOLD: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantEntry {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    restaurants: Vec<RestaurantEntry>,
}

/// In-memory catalog, used offline and in tests.
pub struct StaticCatalog {
    entries: Vec<RestaurantEntry>,
    matcher: SkimMatcherV2,
}

impl std::fmt::Debug for StaticCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCatalog")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl StaticCatalog {
    pub fn new(entries: Vec<RestaurantEntry>) -> Self {
        Self {
            entries,
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Parses `{"restaurants": [{"id", "name", "city"?, "menu": [...]}]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::new(file.restaurants))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matches_menu_item(&self, item: &MenuItem, query: &str) -> bool {
        let name = normalize(&item.name);
        let word_hit = query
            .split(' ')
            .filter(|word| word.chars().count() >= 3)
            .any(|word| name.contains(word));
        word_hit
            || self
                .matcher
                .fuzzy_match(&name, query)
                .is_some_and(|score| score >= FUZZY_THRESHOLD)
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn search_restaurants(&self, query: &str) -> Result<Vec<Restaurant>> {
        let query = normalize(query);
        Ok(self
            .entries
            .iter()
            .filter(|entry| {
                let haystack = normalize(&format!(
                    "{} {}",
                    entry.restaurant.name,
                    entry.restaurant.city.as_deref().unwrap_or_default()
                ));
                query.split(' ').all(|word| haystack.contains(word))
                    || self
                        .matcher
                        .fuzzy_match(&normalize(&entry.restaurant.name), &query)
                        .is_some_and(|score| score >= FUZZY_THRESHOLD)
            })
            .map(|entry| entry.restaurant.clone())
            .collect())
    }

    async fn search_menu(&self, restaurant_id: &str, query: &str) -> Result<Vec<MenuItem>> {
        let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.restaurant.id == restaurant_id)
        else {
            return Ok(vec![]);
        };

        let query = normalize(query);
        if query.is_empty() {
            return Ok(entry.menu.clone());
        }

        Ok(entry
            .menu
            .iter()
            .filter(|item| self.matches_menu_item(item, &query))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "restaurants": [
            {
                "id": "kfc-kat",
                "name": "KFC Rondo",
                "city": "Katowice",
                "menu": [
                    {"id": "m1", "name": "Zinger Box", "price": 18.0},
                    {"id": "m2", "name": "Grander", "price": 16.5},
                    {"id": "m3", "name": "Frytki duże", "price": 8.0}
                ]
            },
            {"id": "kfc-waw", "name": "KFC Centrum", "city": "Warszawa", "menu": []}
        ]
    }"#;

    #[tokio::test]
    async fn restaurant_search_matches_all_words() {
        let catalog = StaticCatalog::from_json(FIXTURE).unwrap();

        let hits = catalog.search_restaurants("kfc Katowice").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "kfc-kat");

        assert_eq!(catalog.search_restaurants("kfc").await.unwrap().len(), 2);
        assert!(catalog.search_restaurants("kfc Kraków").await.unwrap().is_empty());
        assert_eq!(catalog.search_restaurants("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_menu_query_lists_items_in_order() {
        let catalog = StaticCatalog::from_json(FIXTURE).unwrap();
        let items = catalog.search_menu("kfc-kat", "").await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Zinger Box", "Grander", "Frytki duże"]);
    }

    #[tokio::test]
    async fn menu_search_matches_words_and_fuzzy() {
        let catalog = StaticCatalog::from_json(FIXTURE).unwrap();

        let items = catalog.search_menu("kfc-kat", "zinger").await.unwrap();
        assert_eq!(items[0].id, "m1");

        let items = catalog.search_menu("kfc-kat", "frytki").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "m3");

        assert!(catalog.search_menu("kfc-kat", "sushi").await.unwrap().is_empty());
        assert!(catalog.search_menu("missing", "zinger").await.unwrap().is_empty());
    }
}
