//! Pure event routing.
//!
//! `route` maps (current screen, inbound event) to the action the
//! effectful layer must perform. No I/O happens here, which is what
//! makes the conversation's control flow testable on its own.
//!
//! Payload syntaxes are disjoint: fixed words (`cart`, `back`, ...),
//! pure-digit quantity strings, and opaque backend IDs (UUIDs, never
//! all-digits), so an opaque payload has exactly one interpretation
//! per screen.

use pizzatime_core::Coordinates;

use crate::screens;
use crate::session::ChatState;

/// An inbound chat event, already stripped of transport details.
#[derive(Debug, Clone)]
pub enum Event {
    /// `/start` command.
    Start,
    /// Inline-button press with an opaque payload.
    Callback(String),
    /// Free-text message.
    Text(String),
    /// Shared geolocation.
    Location(Coordinates),
    /// Invoice pre-checkout validation request.
    PreCheckout { query_id: String, payload: String },
    /// Payment went through; Telegram reports the collected email.
    PaymentDone { email: Option<String> },
}

/// Which menu page to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Next,
    Prev,
}

/// The user's location, as text to geocode or as raw coordinates.
#[derive(Debug, Clone)]
pub enum LocationInput {
    Address(String),
    Point(Coordinates),
}

/// What the effectful layer should do for this turn.
#[derive(Debug, Clone)]
pub enum Action {
    ShowMenu(PageNav),
    ShowCart,
    ShowProduct(String),
    AddToCart(u32),
    RemoveCartItem(String),
    PromptLocation,
    ResolveLocation(LocationInput),
    ChoosePickup,
    ChooseDelivery,
    AnswerPreCheckout { query_id: String, payload: String },
    CompleteOrder { email: Option<String> },
    /// Acknowledge the callback without rendering anything (display-only
    /// buttons such as the page badge).
    Ignore,
    Fallback,
}

/// Route one event. Global rules (start, back, payment events) apply in
/// every state; the rest branches on the current screen.
#[must_use]
pub fn route(state: ChatState, event: &Event) -> Action {
    // Global rules first.
    match event {
        Event::Start => return Action::ShowMenu(PageNav::First),
        Event::Callback(payload) if payload == screens::BACK => {
            return Action::ShowMenu(PageNav::First);
        }
        Event::Callback(payload) if payload == screens::NOOP => return Action::Ignore,
        Event::PreCheckout { query_id, payload } => {
            return Action::AnswerPreCheckout {
                query_id: query_id.clone(),
                payload: payload.clone(),
            };
        }
        Event::PaymentDone { email } => {
            return Action::CompleteOrder {
                email: email.clone(),
            };
        }
        _ => {}
    }

    match (state, event) {
        (ChatState::Menu, Event::Callback(payload)) => match payload.as_str() {
            screens::CART => Action::ShowCart,
            screens::NEXT_PAGE => Action::ShowMenu(PageNav::Next),
            screens::PREV_PAGE => Action::ShowMenu(PageNav::Prev),
            product_id => Action::ShowProduct(product_id.to_string()),
        },

        (ChatState::Description, Event::Callback(payload)) => {
            if payload == screens::CART {
                Action::ShowCart
            } else if let Some(quantity) = screens::parse_quantity(payload) {
                Action::AddToCart(quantity)
            } else {
                Action::ShowProduct(payload.clone())
            }
        }

        (ChatState::Cart, Event::Callback(payload)) => {
            if payload == screens::CHECKOUT {
                Action::PromptLocation
            } else {
                // Opaque cart-line ID; the handler verifies membership.
                Action::RemoveCartItem(payload.clone())
            }
        }

        (ChatState::AwaitingLocation, Event::Text(text)) => {
            Action::ResolveLocation(LocationInput::Address(text.clone()))
        }
        (ChatState::AwaitingLocation, Event::Location(point)) => {
            Action::ResolveLocation(LocationInput::Point(*point))
        }

        (ChatState::Delivery, Event::Callback(payload)) => match payload.as_str() {
            screens::PICKUP => Action::ChoosePickup,
            screens::DELIVERY => Action::ChooseDelivery,
            _ => Action::Fallback,
        },

        _ => Action::Fallback,
    }
}
