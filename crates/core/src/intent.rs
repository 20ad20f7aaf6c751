//! Rule-based intent classification.
//!
//! [`RULES`] is evaluated top to bottom and its order is the precedence
//! between intents. Every matcher is a pure function of the utterance, the
//! current slots and the resolved entities.

use crate::resolver::{self, Brand, BrandKind, Resolution};
use crate::slots::{Size, Slots, Spice};

// Polish stems match inflected forms; English words only match whole.
const MILD_STEMS: &[&str] = &["lagodn"];
const MILD_WORDS: &[&str] = &["mild"];
const HOT_STEMS: &[&str] = &["ostr", "pikant"];
const HOT_WORDS: &[&str] = &["hot", "spicy"];

const TOTAL_PHRASES: &[&str] = &[
    "ile kosztuje",
    "ile to kosztuje",
    "ile place",
    "ile zaplace",
    "ile bedzie",
    "ile razem",
    "podsumuj",
    "podsumowanie",
    "suma",
    "how much",
    "summarize",
    "total",
];

const CONFIRM_PHRASES: &[&str] = &[
    "potwierdzam",
    "potwierdz",
    "zamawiam",
    "zamow to",
    "to wszystko",
    "tak",
    "ok",
    "okej",
    "zgoda",
    "confirm",
    "order it",
    "that's all",
    "thats all",
    "yes",
];

const DESIRE_WORDS: &[&str] = &[
    "chce",
    "chcialbym",
    "chcialabym",
    "chcemy",
    "zjem",
    "zjesc",
    "zjadlbym",
    "zjadlabym",
    "napije",
    "napic",
    "napilbym",
    "glodny",
    "glodna",
    "ochote",
    "want",
    "hungry",
];

// Generic food/drink nouns, and specific ones mapped to a search token.
const GENERIC_FOOD_WORDS: &[&str] = &[
    "cos", "jedzenie", "jesc", "zjesc", "pic", "napic", "picie", "obiad", "kolacje", "kolacja",
    "sniadanie", "lunch", "food", "something", "eat", "drink",
];
const SPECIFIC_FOOD_WORDS: &[(&str, &[&str])] = &[
    ("pizza", &["pizza", "pizze", "pizzy"]),
    ("burger", &["burger", "burgera", "burgery"]),
    ("kebab", &["kebab", "kebaba"]),
    ("sushi", &["sushi"]),
    ("kawa", &["kawa", "kawe", "kawy"]),
    ("herbata", &["herbata", "herbate"]),
    ("napoj", &["napoj", "napoje"]),
];

const RESTAURANT_STEMS: &[&str] = &["restaurac", "restaurant", "knajp", "lokal"];

const RIDE_STEMS: &[&str] = &["taxi", "taksow", "taksi", "przejazd", "podwiez", "ride", "cab"];

const DISH_STEMS: &[&str] = &[
    "zinger",
    "grander",
    "qurrito",
    "whopper",
    "bigmac",
    "cheeseburger",
    "burger",
    "frytki",
    "nugget",
    "stripsy",
    "kubelek",
    "skrzydel",
    "margherit",
    "pepperoni",
    "capricciosa",
    "hawajsk",
    "kebab",
    "wrap",
    "sushi",
    "ramen",
    "salatk",
    "zupa",
    "pierog",
];

const MENU_WORDS: &[&str] = &["menu", "karta", "karte", "oferta", "oferte"];
const MENU_PHRASES: &[&str] = &["co macie", "co jest", "co polecasz", "co mozna", "what's on"];

const NAVIGATION_WORDS: &[&str] = &[
    "wroc", "cofnij", "koszyk", "pomoc", "start", "pokaz", "zmien", "anuluj", "menu", "karta",
    "restauracje", "restauracja", "restauracji",
];

// Words that carry no dish content.
const FILLER_WORDS: &[&str] = &[
    "poprosze", "prosze", "dla", "mnie", "daj", "dajcie", "jeszcze", "i", "a", "to", "ten",
    "te", "ta", "z", "ze", "na", "do", "w", "we", "sztuki", "sztuk", "razy", "x", "moze",
    "please", "i'd", "like",
];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("jeden", 1),
    ("jedna", 1),
    ("jedno", 1),
    ("dwa", 2),
    ("dwie", 2),
    ("trzy", 3),
    ("cztery", 4),
    ("piec", 5),
    ("szesc", 6),
    ("siedem", 7),
    ("osiem", 8),
    ("dziewiec", 9),
    ("dziesiec", 10),
];

const MAX_QUANTITY: u32 = 99;

/// An utterance prepared for keyword matching.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub raw: String,
    pub normalized: String,
    words: Vec<String>,
}

impl Utterance {
    pub fn new(text: &str) -> Self {
        let normalized = resolver::normalize(text);
        let words = normalized.split(' ').filter(|w| !w.is_empty()).map(String::from).collect();
        Self {
            raw: text.trim().to_string(),
            normalized,
            words,
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn has_word(&self, candidates: &[&str]) -> bool {
        self.words.iter().any(|w| candidates.contains(&w.as_str()))
    }

    pub fn has_stem(&self, stems: &[&str]) -> bool {
        self.words
            .iter()
            .any(|w| stems.iter().any(|stem| w.starts_with(stem)))
    }

    /// Whole-word phrase containment.
    pub fn has_phrase(&self, phrases: &[&str]) -> bool {
        let padded = format!(" {} ", self.normalized);
        phrases
            .iter()
            .any(|phrase| padded.contains(&format!(" {phrase} ")))
    }

    /// Words left after dropping desire verbs, fillers and numbers.
    pub fn content_words(&self) -> Vec<&str> {
        self.words
            .iter()
            .map(String::as_str)
            .filter(|w| !DESIRE_WORDS.contains(w) && !FILLER_WORDS.contains(w))
            .filter(|w| number_value(w).is_none())
            .collect()
    }

    /// First positive quantity mentioned as digits or a number word.
    pub fn quantity(&self) -> Option<u32> {
        self.words
            .iter()
            .find_map(|w| number_value(w))
            .filter(|n| (1..=MAX_QUANTITY).contains(n))
    }

    fn is_ride_request(&self, resolution: &Resolution) -> bool {
        self.has_stem(RIDE_STEMS)
            || resolution
                .brand
                .is_some_and(|b| b.kind == BrandKind::RideService)
    }
}

fn number_value(word: &str) -> Option<u32> {
    let digits = word.trim_start_matches('x').trim_end_matches('x');
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.parse().ok();
    }
    NUMBER_WORDS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, n)| *n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReply {
    Size(Size),
    Spice(Spice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    QuickReply(QuickReply),
    RequestTotal,
    Confirm,
    GeneralFood { query: Option<String> },
    BrowseRestaurants { city: Option<&'static str> },
    RestaurantsIn { place: String },
    Brand { brand: Brand, city: Option<String> },
    Taxi { service: Option<String> },
    ImplicitDish { query: String },
    BrowseMenu,
    SearchMenu { query: String },
    Quantity(u32),
    FillSlots,
}

pub type Matcher = fn(&Utterance, &Slots, &Resolution) -> Option<Intent>;

pub struct Rule {
    pub name: &'static str,
    pub matcher: Matcher,
}

pub const RULES: &[Rule] = &[
    Rule { name: "quick_reply", matcher: quick_reply },
    Rule { name: "total_or_confirm", matcher: total_or_confirm },
    Rule { name: "general_food", matcher: general_food },
    Rule { name: "browse_restaurants", matcher: browse_restaurants },
    Rule { name: "brand", matcher: brand },
    Rule { name: "taxi", matcher: taxi },
    Rule { name: "implicit_dish", matcher: implicit_dish },
    Rule { name: "short_quantity", matcher: short_quantity },
    Rule { name: "menu", matcher: menu },
    Rule { name: "quantity", matcher: quantity },
    Rule { name: "fill_slots", matcher: fill_slots },
];

/// The highest-precedence intent for the utterance.
pub fn classify(utterance: &Utterance, slots: &Slots, resolution: &Resolution) -> Intent {
    RULES
        .iter()
        .find_map(|rule| (rule.matcher)(utterance, slots, resolution))
        .unwrap_or(Intent::FillSlots)
}

fn quick_reply(u: &Utterance, _: &Slots, _: &Resolution) -> Option<Intent> {
    if let Some(size) = Size::parse(&u.normalized) {
        return Some(Intent::QuickReply(QuickReply::Size(size)));
    }
    // Longer sentences mentioning spice are orders, not quick replies.
    if u.words.len() > 3 {
        return None;
    }
    if u.has_stem(MILD_STEMS) || u.has_word(MILD_WORDS) {
        Some(Intent::QuickReply(QuickReply::Spice(Spice::Mild)))
    } else if u.has_stem(HOT_STEMS) || u.has_word(HOT_WORDS) {
        Some(Intent::QuickReply(QuickReply::Spice(Spice::Hot)))
    } else {
        None
    }
}

fn total_or_confirm(u: &Utterance, _: &Slots, resolution: &Resolution) -> Option<Intent> {
    if u.is_ride_request(resolution) {
        return None;
    }
    if u.has_phrase(TOTAL_PHRASES) {
        return Some(Intent::RequestTotal);
    }
    if u.words.len() <= 5 && resolution.brand.is_none() && u.has_phrase(CONFIRM_PHRASES) {
        return Some(Intent::Confirm);
    }
    None
}

fn general_food(u: &Utterance, _: &Slots, resolution: &Resolution) -> Option<Intent> {
    if resolution.brand.is_some() || !u.has_word(DESIRE_WORDS) {
        return None;
    }
    let specific = SPECIFIC_FOOD_WORDS
        .iter()
        .find(|(_, forms)| u.has_word(forms))
        .map(|(token, _)| token.to_string());

    if specific.is_some() || u.has_word(GENERIC_FOOD_WORDS) {
        Some(Intent::GeneralFood { query: specific })
    } else {
        None
    }
}

fn browse_restaurants(u: &Utterance, slots: &Slots, resolution: &Resolution) -> Option<Intent> {
    if !u.has_stem(RESTAURANT_STEMS) {
        return None;
    }
    if let Some(city) = resolver::known_city(&u.normalized) {
        return Some(Intent::BrowseRestaurants { city: Some(city) });
    }
    if let Some(place) = &resolution.city {
        return Some(Intent::RestaurantsIn {
            place: place.clone(),
        });
    }
    // "restauracje w okolicy" with nothing chosen yet. Once a restaurant is
    // bound, "menu tej restauracji" belongs to menu browsing.
    let menu_request = u.has_word(MENU_WORDS) || u.has_phrase(MENU_PHRASES);
    if resolution.brand.is_none() && !slots.has_restaurant() && !menu_request {
        return Some(Intent::BrowseRestaurants { city: None });
    }
    None
}

fn brand(_: &Utterance, slots: &Slots, resolution: &Resolution) -> Option<Intent> {
    if slots.has_restaurant() {
        return None;
    }
    resolution
        .brand
        .filter(|b| b.kind == BrandKind::Restaurant)
        .map(|brand| Intent::Brand {
            brand,
            city: resolution.city.clone(),
        })
}

fn taxi(u: &Utterance, slots: &Slots, resolution: &Resolution) -> Option<Intent> {
    let ride_service = resolution
        .brand
        .filter(|b| b.kind == BrandKind::RideService)
        .map(|b| b.display.to_string());

    let awaiting_address = slots.service.is_some()
        && (slots.pickup_address.is_none() || slots.destination_address.is_none());

    if u.is_ride_request(resolution) || awaiting_address {
        Some(Intent::Taxi {
            service: ride_service,
        })
    } else {
        None
    }
}

fn implicit_dish(u: &Utterance, slots: &Slots, _: &Resolution) -> Option<Intent> {
    if slots.has_restaurant() || u.has_word(NAVIGATION_WORDS) {
        return None;
    }
    let content = u.content_words();
    let named_dish = content
        .iter()
        .any(|w| DISH_STEMS.iter().any(|stem| w.starts_with(stem)));
    if named_dish || content.len() >= 2 {
        Some(Intent::ImplicitDish {
            query: content.join(" "),
        })
    } else {
        None
    }
}

// A bare "2" or "trzy sztuki" after picking a dish sets the quantity even when
// a restaurant is bound, instead of being searched for in the menu.
fn short_quantity(u: &Utterance, slots: &Slots, _: &Resolution) -> Option<Intent> {
    if !slots.has_menu_item() || u.words.len() > 3 {
        return None;
    }
    u.quantity().map(Intent::Quantity)
}

fn menu(u: &Utterance, slots: &Slots, _: &Resolution) -> Option<Intent> {
    if !slots.has_restaurant() {
        return None;
    }
    if u.has_word(MENU_WORDS) || u.has_phrase(MENU_PHRASES) {
        return Some(Intent::BrowseMenu);
    }
    let query = u.content_words().join(" ");
    if query.is_empty() {
        None
    } else {
        Some(Intent::SearchMenu { query })
    }
}

fn quantity(u: &Utterance, slots: &Slots, _: &Resolution) -> Option<Intent> {
    if !slots.has_menu_item() {
        return None;
    }
    u.quantity().map(Intent::Quantity)
}

fn fill_slots(_: &Utterance, _: &Slots, _: &Resolution) -> Option<Intent> {
    Some(Intent::FillSlots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    fn intent_for(text: &str, slots: &Slots) -> Intent {
        classify(&Utterance::new(text), slots, &resolve(text))
    }

    fn with_menu_item() -> Slots {
        Slots {
            restaurant: Some("KFC Rondo".into()),
            restaurant_id: Some("kfc-kat".into()),
            menu_item: Some("Zinger Box".into()),
            menu_item_id: Some("m1".into()),
            price: Some(18.0),
            quantity: Some(1),
            ..Slots::default()
        }
    }

    #[test]
    fn quick_replies() {
        let empty = Slots::default();
        assert_eq!(intent_for("L", &empty), Intent::QuickReply(QuickReply::Size(Size::L)));
        assert_eq!(intent_for(" m. ", &empty), Intent::QuickReply(QuickReply::Size(Size::M)));
        assert_eq!(
            intent_for("ostra", &empty),
            Intent::QuickReply(QuickReply::Spice(Spice::Hot))
        );
        assert_eq!(
            intent_for("łagodną proszę", &empty),
            Intent::QuickReply(QuickReply::Spice(Spice::Mild))
        );
        assert_eq!(
            intent_for("spicy", &empty),
            Intent::QuickReply(QuickReply::Spice(Spice::Hot))
        );
    }

    #[test]
    fn english_spice_words_do_not_match_as_prefixes() {
        assert_eq!(
            intent_for("taxi do hotelu", &Slots::default()),
            Intent::Taxi { service: None }
        );
        assert_ne!(
            intent_for("hotel", &Slots::default()),
            Intent::QuickReply(QuickReply::Spice(Spice::Hot))
        );
        assert_ne!(
            intent_for("mildred", &Slots::default()),
            Intent::QuickReply(QuickReply::Spice(Spice::Mild))
        );
    }

    #[test]
    fn total_takes_precedence_over_confirm() {
        let slots = with_menu_item();
        assert_eq!(intent_for("ile kosztuje?", &slots), Intent::RequestTotal);
        assert_eq!(intent_for("tak, ile razem?", &slots), Intent::RequestTotal);
        assert_eq!(intent_for("Potwierdzam", &slots), Intent::Confirm);
        assert_eq!(intent_for("ok, to wszystko", &slots), Intent::Confirm);
    }

    #[test]
    fn ride_requests_are_not_confirmations() {
        let intent = intent_for("tak, zamawiam taxi do centrum", &Slots::default());
        assert_eq!(intent, Intent::Taxi { service: None });
    }

    #[test]
    fn desire_without_brand_is_a_general_search() {
        assert_eq!(
            intent_for("chcę coś zjeść", &Slots::default()),
            Intent::GeneralFood { query: None }
        );
        assert_eq!(
            intent_for("chciałbym pizzę", &Slots::default()),
            Intent::GeneralFood {
                query: Some("pizza".into())
            }
        );
        // A named brand wins over the generic desire.
        assert!(matches!(
            intent_for("chcę coś zjeść z KFC", &Slots::default()),
            Intent::Brand { .. }
        ));
    }

    #[test]
    fn restaurants_in_a_city() {
        assert_eq!(
            intent_for("pokaż restauracje w Katowicach", &Slots::default()),
            Intent::BrowseRestaurants {
                city: Some("Katowice")
            }
        );
        assert_eq!(
            intent_for("restauracje w Pcimiu", &Slots::default()),
            Intent::RestaurantsIn {
                place: "pcimiu".into()
            }
        );
        assert_eq!(
            intent_for("restauracje blisko mnie", &Slots::default()),
            Intent::BrowseRestaurants { city: None }
        );
    }

    #[test]
    fn bound_restaurant_keeps_restaurant_words_on_its_menu() {
        let bound = Slots {
            restaurant: Some("KFC Rondo".into()),
            restaurant_id: Some("kfc-kat".into()),
            ..Slots::default()
        };
        assert_eq!(
            intent_for("pokaż menu tej restauracji", &bound),
            Intent::BrowseMenu
        );
        assert_eq!(
            intent_for("menu tej restauracji", &Slots::default()),
            Intent::FillSlots
        );
    }

    #[test]
    fn brand_only_without_bound_restaurant() {
        let intent = intent_for("KFC w Katowicach", &Slots::default());
        match intent {
            Intent::Brand { brand, city } => {
                assert_eq!(brand.token, "kfc");
                assert_eq!(city.as_deref(), Some("Katowice"));
            }
            other => panic!("expected brand intent, got {other:?}"),
        }

        let bound = with_menu_item();
        assert!(!matches!(intent_for("KFC", &bound), Intent::Brand { .. }));
    }

    #[test]
    fn taxi_keywords_services_and_follow_ups() {
        assert_eq!(
            intent_for("taxi z domu do centrum", &Slots::default()),
            Intent::Taxi { service: None }
        );
        assert_eq!(
            intent_for("zamów bolta... albo bolt", &Slots::default()),
            Intent::Taxi {
                service: Some("Bolt".into())
            }
        );

        let awaiting = Slots {
            service: Some("taxi".into()),
            destination_address: Some("centrum".into()),
            ..Slots::default()
        };
        assert_eq!(
            intent_for("ulica Mariacka", &awaiting),
            Intent::Taxi { service: None }
        );
    }

    #[test]
    fn implicit_dish_needs_content() {
        assert_eq!(
            intent_for("poproszę zinger", &Slots::default()),
            Intent::ImplicitDish {
                query: "zinger".into()
            }
        );
        assert_eq!(
            intent_for("pizza margherita", &Slots::default()),
            Intent::ImplicitDish {
                query: "pizza margherita".into()
            }
        );
        // A bare category goes to slot filling.
        assert_eq!(intent_for("pizza", &Slots::default()), Intent::FillSlots);
    }

    #[test]
    fn bound_restaurant_routes_to_menu() {
        let slots = Slots {
            restaurant_id: Some("kfc-kat".into()),
            ..Slots::default()
        };
        assert_eq!(intent_for("co macie w menu?", &slots), Intent::BrowseMenu);
        assert_eq!(
            intent_for("poproszę grandera", &slots),
            Intent::SearchMenu {
                query: "grandera".into()
            }
        );
    }

    #[test]
    fn quantities_after_a_menu_item() {
        let slots = with_menu_item();
        assert_eq!(intent_for("2", &slots), Intent::Quantity(2));
        assert_eq!(intent_for("trzy sztuki", &slots), Intent::Quantity(3));
        assert_eq!(intent_for("x4", &slots), Intent::Quantity(4));
        // Without a bound item a number is just noise.
        assert_eq!(intent_for("2", &Slots::default()), Intent::FillSlots);
    }

    #[test]
    fn quantity_parsing_rejects_zero_and_huge_values() {
        assert_eq!(Utterance::new("0").quantity(), None);
        assert_eq!(Utterance::new("1000").quantity(), None);
        assert_eq!(Utterance::new("dwie").quantity(), Some(2));
    }
}
