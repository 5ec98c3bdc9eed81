//! Screen builders.
//!
//! Pure functions: they take already-fetched data and produce a
//! renderable screen descriptor (text, optional image, button rows).
//! All presentation policy lives here - pagination, price formatting,
//! delivery-fee tiering - so it is testable without any I/O.

use std::fmt::Write as _;

use pizzatime_core::{CartItemId, Price};
use rust_decimal::Decimal;
use url::Url;

use crate::commerce::types::{CartItem, Product};
use crate::session::NearestOutlet;

// =============================================================================
// Callback payload dictionary
// =============================================================================
//
// Payload syntaxes are disjoint by construction: fixed words below,
// pure-digit strings for quantities, and opaque backend UUIDs for
// products/cart lines (which always contain non-digits).

pub const CART: &str = "cart";
pub const BACK: &str = "back";
pub const CHECKOUT: &str = "checkout";
pub const DELIVERY: &str = "delivery";
pub const PICKUP: &str = "pickup";
pub const NEXT_PAGE: &str = "next";
pub const PREV_PAGE: &str = "prev";
/// Inert payload for display-only buttons (the page badge).
pub const NOOP: &str = "noop";

/// A quantity choice is a pure digit string.
#[must_use]
pub fn parse_quantity(payload: &str) -> Option<u32> {
    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    payload.parse().ok()
}

// =============================================================================
// Screen descriptor
// =============================================================================

/// One button: visible label and opaque callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub payload: String,
}

impl Choice {
    fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// A renderable conversation turn: text, optional image, button rows.
#[derive(Debug, Clone)]
pub struct Screen {
    pub text: String,
    pub image: Option<Url>,
    pub choices: Vec<Vec<Choice>>,
}

fn back_row() -> Vec<Choice> {
    vec![Choice::new("В меню", BACK)]
}

// =============================================================================
// Pagination
// =============================================================================

/// Number of menu pages for a catalog of `total` products.
#[must_use]
pub const fn page_count(total: usize, page_size: usize) -> usize {
    if total == 0 || page_size == 0 {
        1
    } else {
        total.div_ceil(page_size)
    }
}

/// Next page with cyclic wrap (after the last page comes the first).
#[must_use]
pub const fn next_page(current: usize, pages: usize) -> usize {
    (current + 1) % pages
}

/// Previous page with cyclic wrap (before the first page comes the last).
#[must_use]
pub const fn prev_page(current: usize, pages: usize) -> usize {
    (current + pages - 1) % pages
}

// =============================================================================
// Menu
// =============================================================================

/// The product-list screen for one page of the catalog.
#[must_use]
pub fn menu(first_name: &str, products: &[Product], page: usize, pages: usize) -> Screen {
    let name = if first_name.is_empty() {
        "друг"
    } else {
        first_name
    };
    let text = format!("Привет, {name}!\nДобро пожаловать в пиццерию \"Пицца тайм\"!");

    let mut choices: Vec<Vec<Choice>> = products
        .iter()
        .map(|product| vec![Choice::new(&product.name, product.id.as_str())])
        .collect();

    if pages > 1 {
        choices.push(vec![
            Choice::new("⬅️", PREV_PAGE),
            Choice::new(format!("{}/{pages}", page + 1), NOOP),
            Choice::new("➡️", NEXT_PAGE),
        ]);
        choices.push(vec![Choice::new("Корзина", CART)]);
    } else {
        choices.push(vec![Choice::new("Корзина", CART)]);
    }

    Screen {
        text,
        image: None,
        choices,
    }
}

// =============================================================================
// Description
// =============================================================================

/// One product, with the quantity of it already in the user's cart.
#[must_use]
pub fn description(product: &Product, in_cart: u32, image: Option<Url>) -> Screen {
    let text = format!(
        "{}\n\nСтоимость: {} за шт.\n\n{}\n\nВ корзине: {in_cart} шт.",
        product.name, product.price.formatted, product.description
    );

    let choices = vec![
        vec![
            Choice::new("1 шт", "1"),
            Choice::new("5 шт", "5"),
            Choice::new("10 шт", "10"),
        ],
        vec![Choice::new("Корзина", CART)],
        back_row(),
    ];

    Screen {
        text,
        image,
        choices,
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Cart total: sum of `unit price * quantity` over all lines.
#[must_use]
pub fn cart_total(items: &[CartItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.unit_price.line_total(item.quantity))
        .sum()
}

fn format_amount(amount: Decimal, sample: &Price) -> String {
    // The backend formats unit prices; totals reuse its currency code.
    format!("{amount} {}", sample.currency)
}

/// The cart screen: one line and one remove button per item.
#[must_use]
pub fn cart(items: &[CartItem]) -> Screen {
    if items.is_empty() {
        return Screen {
            text: "Корзина пуста.".to_string(),
            image: None,
            choices: vec![back_row()],
        };
    }

    let mut text = String::new();
    for item in items {
        let subtotal = item.unit_price.line_total(item.quantity);
        let _ = writeln!(
            text,
            "{} — {} шт × {} = {}",
            item.name,
            item.quantity,
            item.unit_price.formatted,
            format_amount(subtotal, &item.unit_price),
        );
    }
    if let Some(first) = items.first() {
        let _ = write!(
            text,
            "\nИтого: {}",
            format_amount(cart_total(items), &first.unit_price)
        );
    }

    let mut choices: Vec<Vec<Choice>> = items
        .iter()
        .map(|item| vec![Choice::new(format!("Убрать {}", item.name), item.id.as_str())])
        .collect();
    choices.push(vec![Choice::new("Оформить заказ", CHECKOUT)]);
    choices.push(back_row());

    Screen {
        text,
        image: None,
        choices,
    }
}

/// Whether `payload` names a line currently in the cart.
#[must_use]
pub fn cart_line(items: &[CartItem], payload: &str) -> Option<CartItemId> {
    items
        .iter()
        .find(|item| item.id.as_str() == payload)
        .map(|item| item.id.clone())
}

// =============================================================================
// Delivery-fee tiering
// =============================================================================

/// Delivery option for a rounded distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTier {
    /// Close enough that pickup and delivery are both free.
    Free,
    /// Courier delivery for a fee (standard currency units).
    Paid { fee: i64 },
    /// Too far for the courier; pickup only.
    PickupOnly,
}

impl DeliveryTier {
    /// Delivery fee in standard currency units.
    #[must_use]
    pub const fn fee(self) -> i64 {
        match self {
            Self::Paid { fee } => fee,
            Self::Free | Self::PickupOnly => 0,
        }
    }

    /// Whether courier delivery is offered at all.
    #[must_use]
    pub const fn delivery_available(self) -> bool {
        !matches!(self, Self::PickupOnly)
    }
}

/// Fee tier for a distance already rounded to one decimal place.
/// Thresholds are strictly increasing; first match wins.
#[must_use]
pub fn delivery_tier(rounded_km: f64) -> DeliveryTier {
    if rounded_km <= 0.5 {
        DeliveryTier::Free
    } else if rounded_km <= 5.0 {
        DeliveryTier::Paid { fee: 100 }
    } else if rounded_km <= 20.0 {
        DeliveryTier::Paid { fee: 300 }
    } else {
        DeliveryTier::PickupOnly
    }
}

// =============================================================================
// Location & delivery screens
// =============================================================================

/// Ask for an address or shared geolocation.
#[must_use]
pub fn location_prompt() -> Screen {
    Screen {
        text: "Пришлите адрес текстом или поделитесь геолокацией.".to_string(),
        image: None,
        choices: vec![back_row()],
    }
}

/// Re-prompt after a failed address resolution.
#[must_use]
pub fn address_retry() -> Screen {
    Screen {
        text: "Не удалось распознать адрес. Напишите его точнее или отправьте геолокацию."
            .to_string(),
        image: None,
        choices: vec![back_row()],
    }
}

/// Delivery/pickup choice for the resolved location.
#[must_use]
pub fn delivery_prompt(outlet: &NearestOutlet, tier: DeliveryTier) -> Screen {
    let text = match tier {
        DeliveryTier::Free => format!(
            "Ближайшая пиццерия — \"{}\" по адресу {} (всего {} км от вас!). \
             Можем доставить бесплатно или ждём вас на самовывоз.",
            outlet.alias, outlet.address, outlet.distance_km
        ),
        DeliveryTier::Paid { fee } => format!(
            "Ближайшая пиццерия — \"{}\" по адресу {} ({} км от вас). \
             Доставка — {fee} ₽, или заберите заказ сами.",
            outlet.alias, outlet.address, outlet.distance_km
        ),
        DeliveryTier::PickupOnly => format!(
            "Вы довольно далеко: ближайшая пиццерия — \"{}\" по адресу {}, \
             это {} км. Доставка недоступна, но возможен самовывоз.",
            outlet.alias, outlet.address, outlet.distance_km
        ),
    };

    let mut option_row = vec![Choice::new("Самовывоз", PICKUP)];
    if tier.delivery_available() {
        option_row.push(Choice::new("Доставка", DELIVERY));
    }

    Screen {
        text,
        image: None,
        choices: vec![option_row, back_row()],
    }
}

/// Pickup confirmation with the chosen outlet's address.
#[must_use]
pub fn pickup_confirmation(outlet: &NearestOutlet) -> Screen {
    Screen {
        text: format!(
            "Ждём вас в пиццерии \"{}\" по адресу: {} ({} км от вас).",
            outlet.alias, outlet.address, outlet.distance_km
        ),
        image: None,
        choices: vec![back_row()],
    }
}

/// Order confirmation shown after a successful payment.
#[must_use]
pub fn order_confirmation(order_number: &str, email: Option<&str>) -> Screen {
    let text = email.map_or_else(
        || format!("Оплата получена! Номер вашего заказа — {order_number}."),
        |email| {
            format!(
                "Оплата получена! Номер вашего заказа — {order_number}. \
                 Чек отправим на {email}."
            )
        },
    );

    Screen {
        text,
        image: None,
        choices: vec![back_row()],
    }
}

/// Shown for events the current screen has no rule for.
#[must_use]
pub fn fallback() -> Screen {
    Screen {
        text: "Воспользуйтесь, пожалуйста, кнопками под сообщением.".to_string(),
        image: None,
        choices: vec![back_row()],
    }
}

/// Error screen keeping the user on the same choice set.
#[must_use]
pub fn failure(message: &str) -> Screen {
    Screen {
        text: message.to_string(),
        image: None,
        choices: vec![back_row()],
    }
}

// =============================================================================
// Courier / invoice / reminder texts
// =============================================================================

/// Order summary sent to the outlet's courier.
#[must_use]
pub fn courier_summary(items: &[CartItem]) -> String {
    let mut text = String::from("Новый заказ на доставку:\n");
    for item in items {
        let _ = writeln!(text, "• {} — {} шт", item.name, item.quantity);
    }
    if let Some(first) = items.first() {
        let _ = write!(
            text,
            "Итого: {}\nТочка доставки в сообщении ниже.",
            format_amount(cart_total(items), &first.unit_price)
        );
    }
    text
}

/// Invoice total in minor currency units (kopecks): cart total plus fee.
#[must_use]
pub fn invoice_total_minor_units(items: &[CartItem], tier: DeliveryTier) -> i64 {
    use rust_decimal::prelude::ToPrimitive;

    let total = (cart_total(items) + Decimal::from(tier.fee())) * Decimal::from(100);
    total.to_i64().unwrap_or(0)
}

/// Delayed delivery-status follow-up.
#[must_use]
pub const fn reminder_text() -> &'static str {
    "Приятного аппетита! Если пицца ещё не приехала — напишите нам, \
     и следующий заказ будет за наш счёт."
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pizzatime_core::{CartItemId, ChatId, Price, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn price(rub: i64) -> Price {
        Price::new(Decimal::from(rub), "RUB", true, format!("{rub} ₽"))
    }

    fn item(id: &str, name: &str, rub: i64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::from(id),
            product_id: ProductId::from(format!("product-{id}")),
            name: name.to_string(),
            description: String::new(),
            quantity,
            unit_price: price(rub),
        }
    }

    fn product(id: &str, name: &str, rub: i64) -> Product {
        Product {
            id: ProductId::from(id),
            name: name.to_string(),
            description: "Описание".to_string(),
            price: price(rub),
            image: None,
        }
    }

    fn outlet(distance_km: f64) -> NearestOutlet {
        NearestOutlet {
            address: "Ленина, 1".to_string(),
            alias: "Центральная".to_string(),
            distance_km,
            courier_chat_id: ChatId::new(7),
        }
    }

    // -------------------------------------------------------------------------
    // Delivery tiering (boundaries pinned)
    // -------------------------------------------------------------------------

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(delivery_tier(0.4), DeliveryTier::Free);
        assert_eq!(delivery_tier(0.5), DeliveryTier::Free);
        assert_eq!(delivery_tier(0.500_01), DeliveryTier::Paid { fee: 100 });
        assert_eq!(delivery_tier(5.0), DeliveryTier::Paid { fee: 100 });
        assert_eq!(delivery_tier(5.1), DeliveryTier::Paid { fee: 300 });
        assert_eq!(delivery_tier(20.0), DeliveryTier::Paid { fee: 300 });
        assert_eq!(delivery_tier(20.1), DeliveryTier::PickupOnly);
    }

    #[test]
    fn pickup_only_has_no_delivery_and_no_fee() {
        let tier = delivery_tier(25.0);
        assert!(!tier.delivery_available());
        assert_eq!(tier.fee(), 0);
    }

    // -------------------------------------------------------------------------
    // Pagination
    // -------------------------------------------------------------------------

    #[test]
    fn seventeen_products_with_page_size_eight_is_three_pages() {
        assert_eq!(page_count(17, 8), 3);
    }

    #[test]
    fn pagination_wraps_cyclically() {
        // next from the last page returns to the first
        assert_eq!(next_page(2, 3), 0);
        // previous from the first page wraps to the last
        assert_eq!(prev_page(0, 3), 2);
        assert_eq!(next_page(0, 3), 1);
        assert_eq!(prev_page(2, 3), 1);
    }

    #[test]
    fn empty_catalog_still_has_one_page() {
        assert_eq!(page_count(0, 8), 1);
    }

    #[test]
    fn single_page_menu_has_no_nav_row() {
        let products = vec![product("p1", "Маргарита", 400)];
        let screen = menu("Иван", &products, 0, 1);
        let payloads: Vec<&str> = screen
            .choices
            .iter()
            .flatten()
            .map(|c| c.payload.as_str())
            .collect();
        assert!(!payloads.contains(&NEXT_PAGE));
        assert!(payloads.contains(&CART));
        assert!(payloads.contains(&"p1"));
    }

    #[test]
    fn multi_page_menu_has_nav_row() {
        let products = vec![product("p1", "Маргарита", 400)];
        let screen = menu("Иван", &products, 1, 3);
        let payloads: Vec<&str> = screen
            .choices
            .iter()
            .flatten()
            .map(|c| c.payload.as_str())
            .collect();
        assert!(payloads.contains(&NEXT_PAGE));
        assert!(payloads.contains(&PREV_PAGE));
    }

    #[test]
    fn page_badge_carries_the_inert_payload() {
        let products = vec![product("p1", "Маргарита", 400)];
        let screen = menu("Иван", &products, 1, 3);
        let badge = screen
            .choices
            .iter()
            .flatten()
            .find(|c| c.label == "2/3")
            .unwrap();
        assert_eq!(badge.payload, NOOP);
    }

    #[test]
    fn menu_greets_by_first_name() {
        let screen = menu("Иван", &[], 0, 1);
        assert!(screen.text.contains("Иван"));
    }

    // -------------------------------------------------------------------------
    // Cart math
    // -------------------------------------------------------------------------

    #[test]
    fn cart_total_is_sum_of_line_subtotals() {
        let items = vec![item("a", "Пепперони", 250, 2), item("b", "Маргарита", 400, 1)];
        assert_eq!(cart_total(&items), Decimal::from(900));
    }

    #[test]
    fn cart_screen_shows_lines_and_total() {
        let items = vec![item("a", "Пепперони", 250, 2), item("b", "Маргарита", 400, 1)];
        let screen = cart(&items);
        assert!(screen.text.contains("Пепперони"));
        assert!(screen.text.contains("Итого: 900 RUB"));
        // one remove button per line plus checkout and back rows
        assert_eq!(screen.choices.len(), 4);
    }

    #[test]
    fn empty_cart_offers_only_back() {
        let screen = cart(&[]);
        assert!(screen.text.contains("пуста"));
        assert_eq!(screen.choices, vec![vec![Choice::new("В меню", BACK)]]);
    }

    #[test]
    fn cart_line_matches_only_existing_ids() {
        let items = vec![item("a1b2", "Пепперони", 250, 1)];
        assert!(cart_line(&items, "a1b2").is_some());
        assert!(cart_line(&items, "zzz").is_none());
    }

    // -------------------------------------------------------------------------
    // Payload syntaxes
    // -------------------------------------------------------------------------

    #[test]
    fn quantities_are_pure_digit_strings() {
        assert_eq!(parse_quantity("5"), Some(5));
        assert_eq!(parse_quantity("10"), Some(10));
        assert_eq!(parse_quantity(""), None);
        // backend UUIDs contain non-digits, so the syntaxes cannot collide
        assert_eq!(parse_quantity("5ab4b3b4-8c0b"), None);
        assert_eq!(parse_quantity(CART), None);
    }

    // -------------------------------------------------------------------------
    // Delivery screens & invoice
    // -------------------------------------------------------------------------

    #[test]
    fn delivery_prompt_hides_delivery_when_pickup_only() {
        let screen = delivery_prompt(&outlet(25.0), DeliveryTier::PickupOnly);
        let payloads: Vec<&str> = screen
            .choices
            .iter()
            .flatten()
            .map(|c| c.payload.as_str())
            .collect();
        assert!(payloads.contains(&PICKUP));
        assert!(!payloads.contains(&DELIVERY));
    }

    #[test]
    fn delivery_prompt_offers_both_when_close() {
        let screen = delivery_prompt(&outlet(3.2), DeliveryTier::Paid { fee: 100 });
        let payloads: Vec<&str> = screen
            .choices
            .iter()
            .flatten()
            .map(|c| c.payload.as_str())
            .collect();
        assert!(payloads.contains(&PICKUP));
        assert!(payloads.contains(&DELIVERY));
        assert!(screen.text.contains("100"));
    }

    #[test]
    fn pickup_confirmation_names_outlet_and_distance() {
        let screen = pickup_confirmation(&outlet(1.5));
        assert!(screen.text.contains("Ленина, 1"));
        assert!(screen.text.contains("1.5"));
    }

    #[test]
    fn invoice_total_includes_fee_in_minor_units() {
        let items = vec![item("a", "Пепперони", 250, 2), item("b", "Маргарита", 400, 1)];
        // 900 + 100 fee = 1000 rubles = 100000 kopecks
        assert_eq!(
            invoice_total_minor_units(&items, DeliveryTier::Paid { fee: 100 }),
            100_000
        );
        assert_eq!(
            invoice_total_minor_units(&items, DeliveryTier::Free),
            90_000
        );
    }

    #[test]
    fn courier_summary_lists_items() {
        let items = vec![item("a", "Пепперони", 250, 2)];
        let summary = courier_summary(&items);
        assert!(summary.contains("Пепперони — 2 шт"));
        assert!(summary.contains("500"));
    }
}
