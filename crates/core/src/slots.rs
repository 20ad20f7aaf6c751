use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Size {
    S,
    M,
    L,
}

impl Size {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_uppercase().as_str() {
            "S" => Some(Size::S),
            "M" => Some(Size::M),
            "L" => Some(Size::L),
            _ => None,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Size::S => "S",
            Size::M => "M",
            Size::L => "L",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spice {
    Mild,
    Hot,
}

impl fmt::Display for Spice {
    // Spoken labels agree with the feminine "pizza".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Spice::Mild => "łagodna",
            Spice::Hot => "ostra",
        };
        f.write_str(label)
    }
}

/// Where the required-slot sub-flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStage {
    NeedItem,
    NeedSize,
    NeedSpice,
    ReadyToConfirm,
}

/// Accumulated understanding of the current order.
///
/// Slots are owned by the caller and only ever change by merging a partial
/// update into the previous value. Defaults (`size = M`, `spice = mild`,
/// `quantity = 1`) are applied when read, never when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spice: Option<Spice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toppings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crust: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dietary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Unit price of the referenced menu item. Never a running total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<f64>,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `Slots` with every field present in `update` overwriting
    /// the corresponding field of `self`. Absent fields are kept.
    pub fn merge(&self, update: &Slots) -> Slots {
        fn pick<T: Clone>(old: &Option<T>, new: &Option<T>) -> Option<T> {
            new.clone().or_else(|| old.clone())
        }

        Slots {
            item: pick(&self.item, &update.item),
            size: pick(&self.size, &update.size),
            spice: pick(&self.spice, &update.spice),
            toppings: if update.toppings.is_empty() {
                self.toppings.clone()
            } else {
                update.toppings.clone()
            },
            crust: pick(&self.crust, &update.crust),
            dietary: pick(&self.dietary, &update.dietary),
            time: pick(&self.time, &update.time),
            address: pick(&self.address, &update.address),
            restaurant: pick(&self.restaurant, &update.restaurant),
            restaurant_id: pick(&self.restaurant_id, &update.restaurant_id),
            menu_item: pick(&self.menu_item, &update.menu_item),
            menu_item_id: pick(&self.menu_item_id, &update.menu_item_id),
            quantity: pick(&self.quantity, &update.quantity),
            price: pick(&self.price, &update.price),
            service: pick(&self.service, &update.service),
            pickup_address: pick(&self.pickup_address, &update.pickup_address),
            destination_address: pick(&self.destination_address, &update.destination_address),
            estimated_price: pick(&self.estimated_price, &update.estimated_price),
        }
    }

    pub fn size_or_default(&self) -> Size {
        self.size.unwrap_or(Size::M)
    }

    pub fn spice_or_default(&self) -> Spice {
        self.spice.unwrap_or(Spice::Mild)
    }

    pub fn quantity_or_default(&self) -> u32 {
        self.quantity.unwrap_or(1)
    }

    pub fn has_menu_item(&self) -> bool {
        self.menu_item_id.is_some() || self.menu_item.is_some()
    }

    pub fn has_restaurant(&self) -> bool {
        self.restaurant_id.is_some()
    }

    /// Total for the referenced menu item, derived at read time.
    pub fn total(&self) -> Option<f64> {
        self.price
            .map(|price| price * f64::from(self.quantity_or_default()))
    }

    pub fn stage(&self) -> SlotStage {
        if self.item.is_none() {
            SlotStage::NeedItem
        } else if self.size.is_none() {
            SlotStage::NeedSize
        } else if self.spice.is_none() {
            SlotStage::NeedSpice
        } else {
            SlotStage::ReadyToConfirm
        }
    }

    /// Spoken summary of the slot-filled order, e.g. "pizza L, ostra".
    pub fn summary(&self) -> String {
        let item = self.item.as_deref().unwrap_or("zamówienie");
        let mut line = format!(
            "{item} {}, {}",
            self.size_or_default(),
            self.spice_or_default()
        );
        if !self.toppings.is_empty() {
            line.push_str(", dodatki: ");
            line.push_str(&self.toppings.join(", "));
        }
        line
    }
}
