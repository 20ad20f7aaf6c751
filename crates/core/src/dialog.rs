use crate::Command;
use crate::catalog::{Catalog, MenuItem, Restaurant};
use crate::fare::FareEstimator;
use crate::intent::{self, Intent, QuickReply, Utterance};
use crate::resolver::{self, Brand};
use crate::slots::{SlotStage, Slots};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

pub const MAX_SUGGESTIONS: usize = 6;
const TOP_MENU_ITEMS: usize = 5;

const FOOD_SUGGESTIONS: &[&str] = &["Pizza", "Burger", "Kebab", "Sushi"];
const BRAND_SUGGESTIONS: &[&str] = &["KFC", "McDonald's", "Pizza Hut", "Burger King"];
const QUANTITY_SUGGESTIONS: &[&str] = &["1", "2", "3"];
const CONFIRM_SUGGESTIONS: &[&str] = &["Potwierdzam", "Zmień"];

static ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:z|ze|from)\s+(.+?)\s+(?:do|to)\s+(.+?)[.!?]*$")
        .expect("route pattern is valid")
});
static PICKUP_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:z|ze|from)\s+(.+?)[.!?]*$").expect("pickup pattern is valid")
});
static DESTINATION_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdo\s+(.+?)[.!?]*$").expect("destination pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SearchRestaurants,
    SearchRestaurantsGeneral,
    SearchMenu,
    AddToCart,
    Checkout,
    TaxiOrder,
}

/// Everything the caller needs to render one turn and carry the
/// conversation forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub speech: String,
    #[serde(rename = "ui_suggestions", default)]
    pub ui_suggestions: Vec<String>,
    pub slots: Slots,
    #[serde(default)]
    pub ready_to_confirm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// `price × quantity` whenever the response quotes a total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl TurnResponse {
    pub fn new(speech: impl Into<String>, slots: Slots) -> Self {
        Self {
            speech: speech.into(),
            ui_suggestions: vec![],
            slots,
            ready_to_confirm: false,
            action: None,
            search_query: None,
            total: None,
        }
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ui_suggestions = suggestions
            .into_iter()
            .map(Into::into)
            .take(MAX_SUGGESTIONS)
            .collect();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn with_total(mut self, total: Option<f64>) -> Self {
        self.total = total;
        self
    }

    pub fn ready(mut self) -> Self {
        self.ready_to_confirm = true;
        self
    }

    /// Side effects for the runtime, in the order they should happen.
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = vec![Command::Speak(self.speech.clone())];
        if !self.ui_suggestions.is_empty() {
            commands.push(Command::Suggest(self.ui_suggestions.clone()));
        }
        if let Some(action) = self.action {
            commands.push(Command::Dispatch {
                action,
                slots: self.slots.clone(),
                search_query: self.search_query.clone(),
            });
        }
        commands
    }
}

fn zl(amount: f64) -> String {
    format!("{amount:.2} zł")
}

/// Picks the first candidate whose name contains any word of the query,
/// falling back to the first candidate.
pub fn best_match<'a>(items: &'a [MenuItem], query: &str) -> Option<&'a MenuItem> {
    let query = resolver::normalize(query);
    let words: Vec<&str> = query.split(' ').filter(|w| !w.is_empty()).collect();
    items
        .iter()
        .find(|item| {
            let name = resolver::normalize(&item.name);
            words.iter().filter(|w| name.contains(**w)).count() > 0
        })
        .or_else(|| items.first())
}

/// Parsed `(pickup, destination)`; either side may be missing.
fn parse_route(text: &str) -> (Option<String>, Option<String>) {
    fn clean(s: &str) -> String {
        s.trim().trim_end_matches([',', '.', '!', '?']).trim().to_string()
    }

    if let Some(caps) = ROUTE.captures(text) {
        return (Some(clean(&caps[1])), Some(clean(&caps[2])));
    }
    if let Some(caps) = DESTINATION_ONLY.captures(text) {
        return (None, Some(clean(&caps[1])));
    }
    if let Some(caps) = PICKUP_ONLY.captures(text) {
        return (Some(clean(&caps[1])), None);
    }
    (None, None)
}

/// Stateless turn processor. Every call is a pure function of the utterance,
/// the previous slots and what the catalog returns.
pub struct DialogManager {
    catalog: Arc<dyn Catalog>,
    fare: Arc<dyn FareEstimator>,
    default_restaurant: Option<Restaurant>,
}

impl DialogManager {
    pub fn new(catalog: Arc<dyn Catalog>, fare: Arc<dyn FareEstimator>) -> Self {
        Self {
            catalog,
            fare,
            default_restaurant: None,
        }
    }

    /// Restaurant whose menu is searched when a dish is named without one.
    pub fn with_default_restaurant(mut self, restaurant: Restaurant) -> Self {
        self.default_restaurant = Some(restaurant);
        self
    }

    pub async fn process_turn(&self, text: &str, slots: &Slots) -> TurnResponse {
        let utterance = Utterance::new(text);
        let resolution = resolver::resolve(text);

        for rule in intent::RULES {
            let Some(intent) = (rule.matcher)(&utterance, slots, &resolution) else {
                continue;
            };
            tracing::debug!(rule = rule.name, ?intent, "intent matched");
            if let Some(response) = self.respond(intent, &utterance, slots).await {
                if let Some(action) = response.action {
                    tracing::info!(?action, "turn produced action");
                }
                return response;
            }
            tracing::debug!(rule = rule.name, "handler declined, trying next rule");
        }

        self.next_missing_slot(slots.clone())
    }

    async fn respond(
        &self,
        intent: Intent,
        utterance: &Utterance,
        slots: &Slots,
    ) -> Option<TurnResponse> {
        let response = match intent {
            Intent::QuickReply(reply) => self.quick_reply(reply, slots),
            Intent::RequestTotal => self.total(slots),
            Intent::Confirm => self.confirm(slots),
            Intent::GeneralFood { query } => self.general_food(query, slots),
            Intent::BrowseRestaurants { city } => self.browse_restaurants(city, slots),
            Intent::RestaurantsIn { place } => self.restaurants_in(place, slots),
            Intent::Brand { brand, city } => self.brand(brand, city, slots).await,
            Intent::Taxi { service } => self.taxi(service, utterance, slots),
            Intent::ImplicitDish { query } => return self.implicit_dish(&query, slots).await,
            Intent::BrowseMenu => self.browse_menu(slots).await,
            Intent::SearchMenu { query } => self.search_menu(&query, slots).await,
            Intent::Quantity(quantity) => self.quantity(quantity, slots),
            Intent::FillSlots => self.fill_slots(utterance, slots),
        };
        Some(response)
    }

    /// Asks for the first missing required slot, or proposes the order.
    pub fn next_missing_slot(&self, slots: Slots) -> TurnResponse {
        match slots.stage() {
            SlotStage::NeedItem => TurnResponse::new("Co chcesz zamówić?", slots)
                .with_suggestions(FOOD_SUGGESTIONS.iter().copied()),
            SlotStage::NeedSize => {
                let item = slots.item.clone().unwrap_or_default();
                TurnResponse::new(format!("Jaki rozmiar {item}? S, M czy L?"), slots)
                    .with_suggestions(["S", "M", "L"])
            }
            SlotStage::NeedSpice => TurnResponse::new("Łagodna czy ostra?", slots)
                .with_suggestions(["łagodna", "ostra"]),
            SlotStage::ReadyToConfirm => {
                let speech = format!("{}. Potwierdzasz?", slots.summary());
                TurnResponse::new(speech, slots)
                    .with_suggestions(CONFIRM_SUGGESTIONS.iter().copied())
                    .ready()
            }
        }
    }

    fn quick_reply(&self, reply: QuickReply, slots: &Slots) -> TurnResponse {
        let update = match reply {
            QuickReply::Size(size) => Slots {
                size: Some(size),
                ..Slots::default()
            },
            QuickReply::Spice(spice) => Slots {
                spice: Some(spice),
                ..Slots::default()
            },
        };
        self.next_missing_slot(slots.merge(&update))
    }

    fn total(&self, slots: &Slots) -> TurnResponse {
        match (slots.menu_item.as_deref(), slots.total()) {
            (Some(name), Some(total)) => {
                let speech = format!(
                    "{} × {name} to razem {}. Potwierdzasz zamówienie?",
                    slots.quantity_or_default(),
                    zl(total)
                );
                TurnResponse::new(speech, slots.clone())
                    .with_suggestions(["Potwierdzam", "Zmień ilość"])
                    .with_total(Some(total))
                    .ready()
            }
            _ => TurnResponse::new(
                "Nie wybrałeś jeszcze nic z ceną. Wybierz pozycję z menu.",
                slots.clone(),
            )
            .with_suggestions(["Pokaż menu"]),
        }
    }

    fn confirm(&self, slots: &Slots) -> TurnResponse {
        if let (true, Some(total)) = (slots.has_menu_item(), slots.total()) {
            let name = slots.menu_item.as_deref().unwrap_or("zamówienie");
            let speech = format!(
                "Zamawiam {} × {name} za {}. Przechodzę do płatności.",
                slots.quantity_or_default(),
                zl(total)
            );
            return TurnResponse::new(speech, slots.clone())
                .with_action(Action::Checkout)
                .with_total(Some(total))
                .ready();
        }

        if slots.has_menu_item() {
            let name = slots.menu_item.as_deref().unwrap_or("wybraną pozycję");
            return TurnResponse::new(
                format!("Nie znam ceny: {name}. Czy mimo to dodać do koszyka?"),
                slots.clone(),
            )
            .with_suggestions(["Tak", "Nie"])
            .with_action(Action::AddToCart);
        }

        // A slot-filled order has nothing the cart can reference.
        match slots.stage() {
            SlotStage::NeedItem => {
                TurnResponse::new("Najpierw wybierz, co chcesz zamówić.", slots.clone())
                    .with_suggestions(FOOD_SUGGESTIONS.iter().copied())
            }
            SlotStage::ReadyToConfirm => TurnResponse::new(
                format!(
                    "{}. Wybierz jeszcze restaurację, żebym mógł dodać to do koszyka.",
                    slots.summary()
                ),
                slots.clone(),
            )
            .with_suggestions(["Restauracje w okolicy", "Pokaż menu"]),
            _ => self.next_missing_slot(slots.clone()),
        }
    }

    fn general_food(&self, query: Option<String>, slots: &Slots) -> TurnResponse {
        let speech = match &query {
            Some(food) => format!("Jasne! Szukam miejsc, gdzie zjesz: {food}."),
            None => "Jasne! Na co masz ochotę? Poszukam restauracji w okolicy.".to_string(),
        };
        let response = TurnResponse::new(speech, slots.clone())
            .with_suggestions(FOOD_SUGGESTIONS.iter().copied())
            .with_action(Action::SearchRestaurantsGeneral);
        match query {
            Some(food) => response.with_search_query(food),
            None => response,
        }
    }

    fn browse_restaurants(&self, city: Option<&'static str>, slots: &Slots) -> TurnResponse {
        let response = match city {
            Some(city) => TurnResponse::new(
                format!("Oto restauracje w mieście {city}. Którą wybierasz?"),
                slots.clone(),
            )
            .with_search_query(city),
            None => TurnResponse::new("Oto restauracje w okolicy. Którą wybierasz?", slots.clone()),
        };
        response
            .with_suggestions(BRAND_SUGGESTIONS.iter().copied())
            .with_action(Action::SearchRestaurantsGeneral)
    }

    fn restaurants_in(&self, place: String, slots: &Slots) -> TurnResponse {
        TurnResponse::new(format!("Szukam restauracji: {place}."), slots.clone())
            .with_suggestions(BRAND_SUGGESTIONS.iter().copied())
            .with_action(Action::SearchRestaurants)
            .with_search_query(place)
    }

    async fn brand(&self, brand: Brand, city: Option<String>, slots: &Slots) -> TurnResponse {
        let query = match &city {
            Some(city) => format!("{} {city}", brand.token),
            None => brand.token.to_string(),
        };

        let Some(restaurant) = self.lookup_restaurants(&query).await.into_iter().next() else {
            let place = city.map(|c| format!(" w {c}")).unwrap_or_default();
            return TurnResponse::new(
                format!("Nie znalazłem {}{place}. Spróbuj innej restauracji.", brand.display),
                slots.clone(),
            )
            .with_suggestions(BRAND_SUGGESTIONS.iter().copied());
        };

        tracing::info!(id = %restaurant.id, "bound restaurant {}", restaurant.name);
        let update = Slots {
            restaurant: Some(restaurant.name.clone()),
            restaurant_id: Some(restaurant.id.clone()),
            ..Slots::default()
        };

        let top_items: Vec<String> = self
            .lookup_menu(&restaurant.id, "")
            .await
            .into_iter()
            .take(TOP_MENU_ITEMS)
            .map(|item| item.name)
            .collect();
        let suggestions = if top_items.is_empty() {
            vec!["Pokaż menu".to_string()]
        } else {
            top_items
        };

        TurnResponse::new(
            format!("Znalazłem {}. Co podać?", restaurant.name),
            slots.merge(&update),
        )
        .with_suggestions(suggestions)
        .with_action(Action::SearchMenu)
        .with_search_query(brand.token)
    }

    fn taxi(&self, service: Option<String>, utterance: &Utterance, slots: &Slots) -> TurnResponse {
        let (mut pickup, mut destination) = parse_route(&utterance.raw);

        // A follow-up like "ulica Mariacka 5" answers whichever address is missing.
        let follow_up = slots.service.is_some() && pickup.is_none() && destination.is_none();
        if follow_up && !utterance.raw.is_empty() {
            let answer = utterance.raw.trim_end_matches(['.', '!', '?']).to_string();
            match (&slots.pickup_address, &slots.destination_address) {
                (None, Some(_)) => pickup = Some(answer),
                (Some(_), None) => destination = Some(answer),
                _ => {}
            }
        }

        let update = Slots {
            service: service
                .or_else(|| slots.service.clone())
                .or_else(|| Some("taxi".to_string())),
            pickup_address: pickup,
            destination_address: destination,
            ..Slots::default()
        };
        let merged = slots.merge(&update);
        let service = merged.service.clone().unwrap_or_default();

        match (
            merged.pickup_address.clone(),
            merged.destination_address.clone(),
        ) {
            (Some(pickup), Some(destination)) => {
                let estimate = self.fare.estimate_fare(&pickup, &destination);
                tracing::info!("estimated {service} fare {pickup} -> {destination}: {estimate}");
                let merged = merged.merge(&Slots {
                    estimated_price: Some(estimate),
                    ..Slots::default()
                });
                TurnResponse::new(
                    format!(
                        "Zamawiam {service}: {pickup} → {destination}. Szacowany koszt {}.",
                        zl(estimate)
                    ),
                    merged,
                )
                .with_suggestions(["Potwierdzam", "Anuluj"])
                .with_action(Action::TaxiOrder)
                .ready()
            }
            (None, Some(_)) => TurnResponse::new("Skąd mam cię odebrać?", merged)
                .with_suggestions(["Z domu", "Z pracy"]),
            (Some(_), None) => TurnResponse::new("Dokąd jedziemy?", merged)
                .with_suggestions(["Do centrum", "Na dworzec", "Na lotnisko"]),
            (None, None) => TurnResponse::new(
                "Skąd i dokąd jedziemy? Powiedz na przykład: z domu do centrum.",
                merged,
            )
            .with_suggestions(["Z domu do centrum", "Z pracy do domu"]),
        }
    }

    async fn implicit_dish(&self, query: &str, slots: &Slots) -> Option<TurnResponse> {
        let restaurant = match &self.default_restaurant {
            Some(restaurant) => restaurant.clone(),
            None => self.lookup_restaurants("").await.into_iter().next()?,
        };

        let item = self
            .lookup_menu(&restaurant.id, query)
            .await
            .into_iter()
            .next()?;

        tracing::info!(id = %item.id, "bound {} from {}", item.name, restaurant.name);
        let update = Slots {
            restaurant: Some(restaurant.name.clone()),
            restaurant_id: Some(restaurant.id.clone()),
            menu_item: Some(item.name.clone()),
            menu_item_id: Some(item.id.clone()),
            price: Some(item.price),
            quantity: Some(1),
            ..Slots::default()
        };
        let merged = slots.merge(&update);
        let total = merged.total();

        Some(
            TurnResponse::new(
                format!(
                    "Dodaję {} z {} ({}). Ile sztuk?",
                    item.name,
                    restaurant.name,
                    zl(item.price)
                ),
                merged,
            )
            .with_suggestions(QUANTITY_SUGGESTIONS.iter().copied())
            .with_action(Action::AddToCart)
            .with_total(total)
            .ready(),
        )
    }

    async fn browse_menu(&self, slots: &Slots) -> TurnResponse {
        let restaurant_id = slots.restaurant_id.as_deref().unwrap_or_default();
        let restaurant = slots.restaurant.as_deref().unwrap_or("tej restauracji");

        let names: Vec<String> = self
            .lookup_menu(restaurant_id, "")
            .await
            .into_iter()
            .take(TOP_MENU_ITEMS)
            .map(|item| item.name)
            .collect();

        if names.is_empty() {
            return TurnResponse::new(
                format!("Nie udało się pobrać menu {restaurant}. Spróbuj jeszcze raz."),
                slots.clone(),
            )
            .with_suggestions(["Pokaż menu"]);
        }

        TurnResponse::new(
            format!("W {restaurant} mamy m.in.: {}. Co wybierasz?", names.join(", ")),
            slots.clone(),
        )
        .with_suggestions(names)
        .with_action(Action::SearchMenu)
    }

    async fn search_menu(&self, query: &str, slots: &Slots) -> TurnResponse {
        let restaurant_id = slots.restaurant_id.as_deref().unwrap_or_default();
        let restaurant = slots.restaurant.as_deref().unwrap_or("tej restauracji");

        let items = self.lookup_menu(restaurant_id, query).await;
        let Some(item) = best_match(&items, query) else {
            return TurnResponse::new(
                format!("Nie znalazłem „{query}” w menu {restaurant}."),
                slots.clone(),
            )
            .with_suggestions(["Pokaż menu"]);
        };

        tracing::info!(id = %item.id, "bound menu item {}", item.name);
        let update = Slots {
            menu_item: Some(item.name.clone()),
            menu_item_id: Some(item.id.clone()),
            price: Some(item.price),
            quantity: Some(1),
            ..Slots::default()
        };

        TurnResponse::new(
            format!("{} kosztuje {}. Ile sztuk?", item.name, zl(item.price)),
            slots.merge(&update),
        )
        .with_suggestions(QUANTITY_SUGGESTIONS.iter().copied())
    }

    fn quantity(&self, quantity: u32, slots: &Slots) -> TurnResponse {
        let merged = slots.merge(&Slots {
            quantity: Some(quantity),
            ..Slots::default()
        });
        let name = merged.menu_item.clone().unwrap_or_default();

        match merged.total() {
            Some(total) => TurnResponse::new(
                format!("Dodaję {quantity} × {name}. Razem {}. Potwierdzasz?", zl(total)),
                merged,
            )
            .with_suggestions(["Potwierdzam", "Zmień ilość"])
            .with_action(Action::AddToCart)
            .with_total(Some(total))
            .ready(),
            None => TurnResponse::new(format!("Dodaję {quantity} × {name} do koszyka."), merged)
                .with_suggestions(["Potwierdzam", "Zmień ilość"])
                .with_action(Action::AddToCart),
        }
    }

    fn fill_slots(&self, utterance: &Utterance, slots: &Slots) -> TurnResponse {
        let mentions_pizza = utterance.words().iter().any(|w| w.starts_with("pizz"));
        if mentions_pizza && slots.item.is_none() {
            return self.next_missing_slot(slots.merge(&Slots {
                item: Some("pizza".to_string()),
                ..Slots::default()
            }));
        }
        self.next_missing_slot(slots.clone())
    }

    async fn lookup_restaurants(&self, query: &str) -> Vec<Restaurant> {
        match self.catalog.search_restaurants(query).await {
            Ok(restaurants) => restaurants,
            Err(e) => {
                tracing::warn!("restaurant search for \"{}\" failed: {:?}", query, e);
                vec![]
            }
        }
    }

    async fn lookup_menu(&self, restaurant_id: &str, query: &str) -> Vec<MenuItem> {
        match self.catalog.search_menu(restaurant_id, query).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    "menu search for \"{}\" in {} failed: {:?}",
                    query,
                    restaurant_id,
                    e
                );
                vec![]
            }
        }
    }
}
