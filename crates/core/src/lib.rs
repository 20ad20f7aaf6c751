pub mod capture;
pub mod catalog;
pub mod conversation;
pub mod dialog;
pub mod fare;
pub mod intent;
pub mod recognizer;
pub mod resolver;
pub mod slots;
pub mod static_catalog;

pub use dialog::{Action, DialogManager, TurnResponse};
pub use slots::Slots;

/// Represents commands that the dialog issues to the runtime.
///
/// The dialog decides what should happen; the runtime owns the side effects
/// (speaking, rendering suggestions, handing actions to the cart or router).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Speak the given text to the user.
    Speak(String),
    /// Offer quick-reply options.
    Suggest(Vec<String>),
    /// Hand an action and the updated slots to the cart or navigation layer.
    Dispatch {
        action: Action,
        slots: Slots,
        search_query: Option<String>,
    },
}
