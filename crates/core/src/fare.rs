use crate::resolver::normalize;
#[cfg(test)]
use mockall::automock;
use sha2::{Digest, Sha256};

/// Prices a ride between two free-text addresses.
#[cfg_attr(test, automock)]
pub trait FareEstimator: Send + Sync {
    fn estimate_fare(&self, pickup: &str, destination: &str) -> f64;
}

/// Stand-in for a real fare model: a stable pseudo-random whole-złoty price
/// within `[min, max]`, derived from the two addresses. The same route is
/// always quoted the same price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderFare {
    pub min: f64,
    pub max: f64,
}

impl Default for PlaceholderFare {
    fn default() -> Self {
        Self {
            min: 20.0,
            max: 60.0,
        }
    }
}

impl PlaceholderFare {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl FareEstimator for PlaceholderFare {
    fn estimate_fare(&self, pickup: &str, destination: &str) -> f64 {
        let material = format!("{}\n{}", normalize(pickup), normalize(destination));
        let digest = Sha256::digest(material.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);

        let low = self.min.ceil();
        let high = self.max.floor();
        if high <= low {
            return self.min;
        }
        let span = (high - low) as u64 + 1;
        low + (u64::from_be_bytes(seed) % span) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_stable_and_in_range() {
        let fare = PlaceholderFare::default();
        let routes = [
            ("domu", "centrum"),
            ("dworca", "lotniska"),
            ("ul. Mariacka 1", "Spodek"),
            ("", ""),
        ];
        for (pickup, destination) in routes {
            let price = fare.estimate_fare(pickup, destination);
            assert!((20.0..=60.0).contains(&price), "{price} out of range");
            assert_eq!(price, price.round());
            assert_eq!(price, fare.estimate_fare(pickup, destination));
        }
    }

    #[test]
    fn address_casing_does_not_change_the_quote() {
        let fare = PlaceholderFare::default();
        assert_eq!(
            fare.estimate_fare("Domu", "Centrum"),
            fare.estimate_fare("domu", "centrum")
        );
    }

    #[test]
    fn known_routes_keep_their_quotes() {
        let fare = PlaceholderFare::default();
        assert_eq!(fare.estimate_fare("domu", "centrum"), 40.0);
        assert_eq!(fare.estimate_fare("Dworca", "lotniska!"), 59.0);
    }

    #[test]
    fn degenerate_range_returns_min() {
        let fare = PlaceholderFare::new(35.0, 35.0);
        assert_eq!(fare.estimate_fare("a", "b"), 35.0);
    }
}
