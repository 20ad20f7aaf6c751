//! Brand and city extraction from free text.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrandKind {
    Restaurant,
    RideService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brand {
    /// Normalized token used for catalog queries, e.g. `"kfc"`.
    pub token: &'static str,
    /// Display name used in responses.
    pub display: &'static str,
    pub kind: BrandKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub brand: Option<Brand>,
    pub city: Option<String>,
}

// Order matters: the first pattern that matches wins.
const BRAND_PATTERNS: &[(&str, &str, BrandKind, &str)] = &[
    ("pizza hut", "Pizza Hut", BrandKind::Restaurant, r"\bpizza ?hut\b"),
    ("telepizza", "Telepizza", BrandKind::Restaurant, r"\btele ?pizza\b"),
    ("burger king", "Burger King", BrandKind::Restaurant, r"\bburger ?king\b"),
    ("kfc", "KFC", BrandKind::Restaurant, r"\b(kfc|kentucky)\b"),
    ("mcdonalds", "McDonald's", BrandKind::Restaurant, r"\b(mc ?donald'?s?|maczek|mcd)\b"),
    ("dominos", "Domino's", BrandKind::Restaurant, r"\bdomino'?s?\b"),
    ("subway", "Subway", BrandKind::Restaurant, r"\bsubway\b"),
    ("starbucks", "Starbucks", BrandKind::Restaurant, r"\bstarbucks?\b"),
    ("uber", "Uber", BrandKind::RideService, r"\buber\b"),
    ("bolt", "Bolt", BrandKind::RideService, r"\bbolt\b"),
    ("free now", "FREE NOW", BrandKind::RideService, r"\bfree ?now\b"),
    ("itaxi", "iTaxi", BrandKind::RideService, r"\bitaxi\b"),
];

// Canonical city name followed by the normalized inflected forms we accept.
const KNOWN_CITIES: &[(&str, &[&str])] = &[
    ("Warszawa", &["warszawa", "warszawie", "warszawy"]),
    ("Kraków", &["krakow", "krakowie", "krakowa"]),
    ("Katowice", &["katowice", "katowicach"]),
    ("Gliwice", &["gliwice", "gliwicach"]),
    ("Wrocław", &["wroclaw", "wroclawiu", "wroclawia"]),
    ("Gdańsk", &["gdansk", "gdansku", "gdanska"]),
    ("Poznań", &["poznan", "poznaniu", "poznania"]),
    ("Łódź", &["lodz", "lodzi"]),
];

static BRANDS: LazyLock<Vec<(Brand, Regex)>> = LazyLock::new(|| {
    BRAND_PATTERNS
        .iter()
        .map(|(token, display, kind, pattern)| {
            let brand = Brand {
                token,
                display,
                kind: *kind,
            };
            (brand, Regex::new(pattern).expect("brand pattern is valid"))
        })
        .collect()
});

static TRAILING_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?:w|we|in)\s+([a-z][a-z-]*(?:\s[a-z][a-z-]*)?)$")
        .expect("city pattern is valid")
});

/// Lowercases, strips diacritics and punctuation, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'ł' | 'Ł' => 'l',
            c if c.is_alphanumeric() || c == '-' || c == '\'' => c,
            _ => ' ',
        })
        .collect::<String>()
        .to_lowercase();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn resolve(text: &str) -> Resolution {
    let normalized = normalize(text);

    let brand = BRANDS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&normalized))
        .map(|(brand, _)| *brand);

    let city = TRAILING_CITY
        .captures(&normalized)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|phrase| brand.is_none_or(|b| b.token != phrase))
        .map(|phrase| canonical_city(&phrase).map(str::to_string).unwrap_or(phrase));

    tracing::debug!(?brand, ?city, "resolved entities from \"{}\"", normalized);
    Resolution { brand, city }
}

/// Canonical name for a normalized city phrase, if it is a known city.
pub fn canonical_city(phrase: &str) -> Option<&'static str> {
    KNOWN_CITIES
        .iter()
        .find(|(_, forms)| forms.contains(&phrase))
        .map(|(name, _)| *name)
}

/// Finds a known city mentioned anywhere in the utterance.
pub fn known_city(text: &str) -> Option<&'static str> {
    normalize(text).split(' ').find_map(canonical_city)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_polish_diacritics() {
        assert_eq!(normalize("Łagodna, proszę!"), "lagodna prosze");
        assert_eq!(normalize("  Zażółć   gęślą jaźń "), "zazolc gesla jazn");
        assert_eq!(normalize("McDonald's"), "mcdonald's");
    }

    #[test]
    fn resolves_brand_and_city() {
        let resolution = resolve("KFC w Katowicach");
        assert_eq!(resolution.brand.map(|b| b.token), Some("kfc"));
        assert_eq!(resolution.city.as_deref(), Some("Katowice"));
    }

    #[test]
    fn unknown_city_is_returned_as_captured() {
        let resolution = resolve("Burger King w Pcimiu");
        assert_eq!(resolution.brand.map(|b| b.token), Some("burger king"));
        assert_eq!(resolution.city.as_deref(), Some("pcimiu"));
    }

    #[test]
    fn brand_is_not_mistaken_for_a_city() {
        let resolution = resolve("zamawiam w KFC");
        assert_eq!(resolution.brand.map(|b| b.token), Some("kfc"));
        assert_eq!(resolution.city, None);
    }

    #[test]
    fn first_brand_in_table_order_wins() {
        // "pizza hut" is listed before every other restaurant.
        let resolution = resolve("pizza hut albo kfc");
        assert_eq!(resolution.brand.map(|b| b.token), Some("pizza hut"));
    }

    #[test]
    fn ride_services_are_tagged() {
        let resolution = resolve("zamów Ubera... albo Bolt");
        assert_eq!(
            resolution.brand.map(|b| (b.token, b.kind)),
            Some(("bolt", BrandKind::RideService))
        );
    }

    #[test]
    fn no_brand_and_no_city() {
        assert_eq!(resolve("poproszę pizzę"), Resolution::default());
    }

    #[test]
    fn known_city_anywhere_in_text() {
        assert_eq!(known_city("restauracje w Krakowie"), Some("Kraków"));
        assert_eq!(known_city("jakie restauracje są w Łodzi?"), Some("Łódź"));
        assert_eq!(known_city("restauracje blisko mnie"), None);
    }
}
