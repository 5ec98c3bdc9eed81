//! The conversation state machine.
//!
//! For every inbound event this module decides which screen to render
//! next, which remote calls are needed to build it, and how the per-user
//! session context changes. Routing itself is pure (see [`transition`]);
//! this layer executes the routed action through the commerce and
//! geocoding seams and returns a [`Turn`] for the transport to render.
//!
//! Every handler runs behind the credential freshness check, except the
//! pre-checkout validator (which touches no commerce resources and must
//! answer within Telegram's deadline).

pub mod transition;

use pizzatime_core::{
    CartItemId, ChatId, Coordinates, CustomerId, Email, FileId, ProductId, UserId,
};
use tracing::{debug, warn};
use url::Url;

use crate::commerce::types::{CartItem, Customer, Outlet, Product, ProductPage};
use crate::commerce::CommerceError;
use crate::credential::{CredentialCache, TokenSource};
use crate::error::BotError;
use crate::geocode::{nearest_outlet, GeocodeError};
use crate::screens::{self, Screen};
use crate::session::{ChatState, NearestOutlet, Session};

pub use transition::{route, Action, Event, LocationInput, PageNav};

// =============================================================================
// Seams
// =============================================================================

/// Commerce operations the machine needs. Implemented by the REST client
/// and by in-memory stubs in tests.
pub trait CommerceApi {
    fn list_products(
        &self,
        token: &str,
        page: usize,
        page_size: usize,
    ) -> impl Future<Output = Result<ProductPage, CommerceError>> + Send;

    fn get_product(
        &self,
        token: &str,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Product, CommerceError>> + Send;

    fn get_file_url(
        &self,
        token: &str,
        file_id: &FileId,
    ) -> impl Future<Output = Result<Url, CommerceError>> + Send;

    fn add_cart_item(
        &self,
        token: &str,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), CommerceError>> + Send;

    fn remove_cart_item(
        &self,
        token: &str,
        user_id: UserId,
        item_id: &CartItemId,
    ) -> impl Future<Output = Result<(), CommerceError>> + Send;

    fn list_cart_items(
        &self,
        token: &str,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<CartItem>, CommerceError>> + Send;

    fn list_outlets(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Vec<Outlet>, CommerceError>> + Send;

    fn save_customer_address(
        &self,
        token: &str,
        user_id: UserId,
        coordinates: Coordinates,
    ) -> impl Future<Output = Result<(), CommerceError>> + Send;

    fn create_customer(
        &self,
        token: &str,
        user_id: UserId,
        email: &str,
    ) -> impl Future<Output = Result<Customer, CommerceError>> + Send;

    fn get_customer(
        &self,
        token: &str,
        customer_id: &CustomerId,
    ) -> impl Future<Output = Result<Customer, CommerceError>> + Send;
}

/// Geocoding operations the machine needs.
pub trait GeocodeApi {
    fn resolve_address(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Coordinates, GeocodeError>> + Send;
}

impl CommerceApi for crate::commerce::CommerceClient {
    async fn list_products(
        &self,
        token: &str,
        page: usize,
        page_size: usize,
    ) -> Result<ProductPage, CommerceError> {
        Self::list_products(self, token, page, page_size).await
    }

    async fn get_product(
        &self,
        token: &str,
        product_id: &ProductId,
    ) -> Result<Product, CommerceError> {
        Self::get_product(self, token, product_id).await
    }

    async fn get_file_url(
        &self,
        token: &str,
        file_id: &FileId,
    ) -> Result<Url, CommerceError> {
        Self::get_file_url(self, token, file_id).await
    }

    async fn add_cart_item(
        &self,
        token: &str,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CommerceError> {
        Self::add_cart_item(self, token, user_id, product_id, quantity).await
    }

    async fn remove_cart_item(
        &self,
        token: &str,
        user_id: UserId,
        item_id: &CartItemId,
    ) -> Result<(), CommerceError> {
        Self::remove_cart_item(self, token, user_id, item_id).await
    }

    async fn list_cart_items(
        &self,
        token: &str,
        user_id: UserId,
    ) -> Result<Vec<CartItem>, CommerceError> {
        Self::list_cart_items(self, token, user_id).await
    }

    async fn list_outlets(&self, token: &str) -> Result<Vec<Outlet>, CommerceError> {
        Self::list_outlets(self, token).await
    }

    async fn save_customer_address(
        &self,
        token: &str,
        user_id: UserId,
        coordinates: Coordinates,
    ) -> Result<(), CommerceError> {
        Self::save_customer_address(self, token, user_id, coordinates).await
    }

    async fn create_customer(
        &self,
        token: &str,
        user_id: UserId,
        email: &str,
    ) -> Result<Customer, CommerceError> {
        Self::create_customer(self, token, user_id, email).await
    }

    async fn get_customer(
        &self,
        token: &str,
        customer_id: &CustomerId,
    ) -> Result<Customer, CommerceError> {
        Self::get_customer(self, token, customer_id).await
    }
}

impl GeocodeApi for crate::geocode::GeocodeClient {
    async fn resolve_address(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        Self::resolve_address(self, address).await
    }
}

// =============================================================================
// Turn output
// =============================================================================

/// Transport-side effects a turn can request besides rendering a screen.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Tell the outlet's courier about a new delivery order.
    NotifyCourier {
        chat_id: ChatId,
        summary: String,
        coordinates: Coordinates,
    },
    /// Send a payment invoice to the user.
    SendInvoice {
        title: String,
        description: String,
        payload: String,
        total_minor_units: i64,
    },
    /// Arm (or re-arm) the delayed delivery-status reminder.
    ScheduleReminder,
    /// Answer a pre-checkout query.
    AnswerPreCheckout {
        query_id: String,
        ok: bool,
        error_message: Option<String>,
    },
}

/// The outcome of one conversation turn.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    /// Screen to render, replacing the previous prompt.
    pub screen: Option<Screen>,
    /// Short toast shown on the pressed button instead of a new screen.
    pub toast: Option<String>,
    pub effects: Vec<Effect>,
}

impl Turn {
    fn screen(screen: Screen) -> Self {
        Self {
            screen: Some(screen),
            ..Self::default()
        }
    }

    fn toast(text: &str) -> Self {
        Self {
            toast: Some(text.to_string()),
            ..Self::default()
        }
    }
}

/// Expected pre-checkout payload for a user.
fn invoice_payload(user_id: UserId) -> String {
    format!("user_id {user_id}")
}

// =============================================================================
// Machine
// =============================================================================

/// The conversation state machine, wired to its remote seams.
pub struct Machine<S, C, G> {
    credentials: CredentialCache<S>,
    commerce: C,
    geocode: G,
    page_size: usize,
}

impl<S, C, G> Machine<S, C, G>
where
    S: TokenSource + Send + Sync,
    C: CommerceApi + Send + Sync,
    G: GeocodeApi + Send + Sync,
{
    /// Build a machine over concrete seam implementations.
    pub const fn new(
        credentials: CredentialCache<S>,
        commerce: C,
        geocode: G,
        page_size: usize,
    ) -> Self {
        Self {
            credentials,
            commerce,
            geocode,
            page_size,
        }
    }

    /// Handle one inbound event for one user session.
    ///
    /// # Errors
    ///
    /// Propagates commerce/geocoding failures the turn cannot recover
    /// from locally; the transport renders them as a retry message
    /// without changing the session state.
    pub async fn handle(&self, session: &mut Session, event: Event) -> Result<Turn, BotError> {
        let action = route(session.state, &event);
        debug!(user_id = %session.user_id, state = ?session.state, action = ?action, "turn");

        // The pre-checkout validator and inert payloads run outside the
        // credential guard; neither touches a commerce resource.
        if let Action::AnswerPreCheckout { query_id, payload } = action {
            return Ok(Self::answer_pre_checkout(session, query_id, &payload));
        }
        if matches!(action, Action::Ignore) {
            return Ok(Turn::default());
        }

        let token = self.credentials.access_token().await?;

        match action {
            Action::ShowMenu(nav) => self.show_menu(&token, session, nav).await,
            Action::ShowCart => self.show_cart(&token, session).await,
            Action::ShowProduct(product_id) => {
                self.show_product(&token, session, &ProductId::from(product_id))
                    .await
            }
            Action::AddToCart(quantity) => self.add_to_cart(&token, session, quantity).await,
            Action::RemoveCartItem(payload) => {
                self.remove_cart_item(&token, session, &payload).await
            }
            Action::PromptLocation => {
                session.state = ChatState::AwaitingLocation;
                Ok(Turn::screen(screens::location_prompt()))
            }
            Action::ResolveLocation(input) => self.resolve_location(&token, session, input).await,
            Action::ChoosePickup => Ok(Self::choose_pickup(session)),
            Action::ChooseDelivery => self.choose_delivery(&token, session).await,
            Action::CompleteOrder { email } => {
                self.complete_order(&token, session, email.as_deref()).await
            }
            Action::Fallback => Ok(Turn::screen(screens::fallback())),
            Action::AnswerPreCheckout { .. } | Action::Ignore => {
                unreachable!("handled before the guard")
            }
        }
    }

    async fn show_menu(
        &self,
        token: &str,
        session: &mut Session,
        nav: PageNav,
    ) -> Result<Turn, BotError> {
        // First page also carries the catalog size for paging math.
        let first = self.commerce.list_products(token, 0, self.page_size).await?;
        let pages = screens::page_count(first.total, self.page_size);

        let target = match nav {
            PageNav::First => 0,
            PageNav::Next => screens::next_page(session.menu_page, pages),
            PageNav::Prev => screens::prev_page(session.menu_page, pages),
        };

        let page = if target == 0 {
            first
        } else {
            self.commerce
                .list_products(token, target, self.page_size)
                .await?
        };

        session.menu_page = target;
        session.state = ChatState::Menu;
        Ok(Turn::screen(screens::menu(
            &session.first_name,
            &page.products,
            target,
            pages,
        )))
    }

    async fn show_cart(&self, token: &str, session: &mut Session) -> Result<Turn, BotError> {
        let items = self.commerce.list_cart_items(token, session.user_id).await?;
        session.state = ChatState::Cart;
        Ok(Turn::screen(screens::cart(&items)))
    }

    async fn show_product(
        &self,
        token: &str,
        session: &mut Session,
        product_id: &ProductId,
    ) -> Result<Turn, BotError> {
        let product = self.commerce.get_product(token, product_id).await?;

        let items = self.commerce.list_cart_items(token, session.user_id).await?;
        let in_cart = items
            .iter()
            .filter(|item| &item.product_id == product_id)
            .map(|item| item.quantity)
            .sum();

        let image = match &product.image {
            Some(file_id) => Some(self.commerce.get_file_url(token, file_id).await?),
            None => None,
        };

        session.active_product = Some(product.id.clone());
        session.state = ChatState::Description;
        Ok(Turn::screen(screens::description(&product, in_cart, image)))
    }

    async fn add_to_cart(
        &self,
        token: &str,
        session: &mut Session,
        quantity: u32,
    ) -> Result<Turn, BotError> {
        let Some(product_id) = session.active_product.clone() else {
            // Stale context (e.g. session evicted between taps).
            warn!(user_id = %session.user_id, "quantity tap without active product");
            return Ok(Turn::screen(screens::fallback()));
        };

        self.commerce
            .add_cart_item(token, session.user_id, &product_id, quantity)
            .await?;
        Ok(Turn::toast("Товар добавлен в корзину"))
    }

    async fn remove_cart_item(
        &self,
        token: &str,
        session: &mut Session,
        payload: &str,
    ) -> Result<Turn, BotError> {
        let items = self.commerce.list_cart_items(token, session.user_id).await?;

        let turn = if let Some(item_id) = screens::cart_line(&items, payload) {
            self.commerce
                .remove_cart_item(token, session.user_id, &item_id)
                .await?;
            let items = self.commerce.list_cart_items(token, session.user_id).await?;
            let mut turn = Turn::screen(screens::cart(&items));
            turn.toast = Some("Товар удален из корзины".to_string());
            turn
        } else {
            // Unknown payload (stale keyboard): just re-render the cart.
            Turn::screen(screens::cart(&items))
        };

        session.state = ChatState::Cart;
        Ok(turn)
    }

    async fn resolve_location(
        &self,
        token: &str,
        session: &mut Session,
        input: LocationInput,
    ) -> Result<Turn, BotError> {
        let coordinates = match input {
            LocationInput::Point(point) => point,
            LocationInput::Address(address) => {
                match self.geocode.resolve_address(&address).await {
                    Ok(point) => point,
                    Err(GeocodeError::AddressNotFound(query)) => {
                        // Recoverable: re-prompt, stay in AwaitingLocation.
                        debug!(user_id = %session.user_id, query, "address not found");
                        return Ok(Turn::screen(screens::address_retry()));
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        };

        let outlets = self.commerce.list_outlets(token).await?;
        let Some((outlet, distance_km)) = nearest_outlet(coordinates, &outlets) else {
            warn!("no outlets configured");
            return Ok(Turn::screen(screens::failure(
                "Пока не можем принять заказ: нет открытых пиццерий.",
            )));
        };

        self.commerce
            .save_customer_address(token, session.user_id, coordinates)
            .await?;

        let snapshot = NearestOutlet {
            address: outlet.address.clone(),
            alias: outlet.alias.clone(),
            distance_km,
            courier_chat_id: outlet.courier_chat_id,
        };
        let tier = screens::delivery_tier(distance_km);
        let screen = screens::delivery_prompt(&snapshot, tier);

        session.delivery_coordinates = Some(coordinates);
        session.nearest_outlet = Some(snapshot);
        session.state = ChatState::Delivery;
        Ok(Turn::screen(screen))
    }

    fn choose_pickup(session: &mut Session) -> Turn {
        let Some(outlet) = session.nearest_outlet.as_ref() else {
            session.state = ChatState::AwaitingLocation;
            return Turn::screen(screens::location_prompt());
        };
        Turn::screen(screens::pickup_confirmation(outlet))
    }

    async fn choose_delivery(&self, token: &str, session: &mut Session) -> Result<Turn, BotError> {
        let (Some(outlet), Some(coordinates)) = (
            session.nearest_outlet.clone(),
            session.delivery_coordinates,
        ) else {
            session.state = ChatState::AwaitingLocation;
            return Ok(Turn::screen(screens::location_prompt()));
        };

        let tier = screens::delivery_tier(outlet.distance_km);
        if !tier.delivery_available() {
            return Ok(Turn::screen(screens::delivery_prompt(&outlet, tier)));
        }

        let items = self.commerce.list_cart_items(token, session.user_id).await?;
        if items.is_empty() {
            session.state = ChatState::Cart;
            return Ok(Turn::screen(screens::cart(&items)));
        }

        let turn = Turn {
            screen: None,
            toast: None,
            effects: vec![
                Effect::NotifyCourier {
                    chat_id: outlet.courier_chat_id,
                    summary: screens::courier_summary(&items),
                    coordinates,
                },
                Effect::SendInvoice {
                    title: "Заказ в \"Пицца тайм\"".to_string(),
                    description: format!(
                        "Пиццы: {} шт, доставка до вашей точки.",
                        items.iter().map(|item| item.quantity).sum::<u32>()
                    ),
                    payload: invoice_payload(session.user_id),
                    total_minor_units: screens::invoice_total_minor_units(&items, tier),
                },
                Effect::ScheduleReminder,
            ],
        };

        session.state = ChatState::Payment;
        Ok(turn)
    }

    fn answer_pre_checkout(session: &Session, query_id: String, payload: &str) -> Turn {
        let ok = payload == invoice_payload(session.user_id);
        let error_message = if ok {
            None
        } else {
            warn!(user_id = %session.user_id, payload, "pre-checkout payload mismatch");
            Some("Не удалось подтвердить заказ. Начните оформление заново.".to_string())
        };

        // Never changes the session state.
        Turn {
            screen: None,
            toast: None,
            effects: vec![Effect::AnswerPreCheckout {
                query_id,
                ok,
                error_message,
            }],
        }
    }

    async fn complete_order(
        &self,
        token: &str,
        session: &mut Session,
        email: Option<&str>,
    ) -> Result<Turn, BotError> {
        // The payer types the email into the invoice form; only a
        // structurally valid one reaches the customer record.
        let email = email.and_then(|raw| match Email::parse(raw) {
            Ok(email) => Some(email),
            Err(error) => {
                warn!(user_id = %session.user_id, %error, "discarding malformed payment email");
                None
            }
        });

        let screen = if let Some(customer_id) = &session.customer_id {
            // Telegram may redeliver a successful-payment update; re-read
            // the record instead of creating a second customer.
            let customer = self.commerce.get_customer(token, customer_id).await?;
            screens::order_confirmation(customer.id.short(), Some(&customer.email))
        } else if let Some(email) = email {
            let customer = self
                .commerce
                .create_customer(token, session.user_id, email.as_str())
                .await?;
            let screen = screens::order_confirmation(customer.id.short(), Some(&customer.email));
            session.customer_id = Some(customer.id);
            screen
        } else {
            // Telegram collects the email (need_email), but be lenient.
            screens::order_confirmation(&session.user_id.to_string(), None)
        };

        session.state = ChatState::Menu;
        Ok(Turn::screen(screen))
    }
}
