//! Wire types for the commerce backend API.
//!
//! The raw `Raw*` structs mirror the backend's JSON envelope shapes; the
//! domain types below them are what the rest of the bot works with.
//! Conversions live here so response-shape changes stay in one file.

use pizzatime_core::{CartItemId, ChatId, Coordinates, CustomerId, FileId, Price, ProductId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Raw wire types
// =============================================================================

/// Single-resource envelope: `{"data": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Document<T> {
    pub data: T,
}

/// List envelope with pagination metadata: `{"data": [...], "meta": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ListDocument<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<ListMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListMeta {
    pub results: ResultsMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultsMeta {
    pub total: usize,
}

/// Token endpoint response. `expires` is an absolute epoch second.
#[derive(Debug, Deserialize)]
pub(crate) struct RawToken {
    pub access_token: String,
    pub expires: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPrice {
    pub amount: i64,
    pub currency: String,
    pub formatted: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDisplayPrice {
    pub with_tax: RawPrice,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProductMeta {
    pub display_price: RawDisplayPrice,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRelated {
    pub id: FileId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRelationship {
    pub data: RawRelated,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawProductRelationships {
    #[serde(default)]
    pub main_image: Option<RawRelationship>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub meta: RawProductMeta,
    #[serde(default)]
    pub relationships: Option<RawProductRelationships>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCartPrices {
    pub unit: RawPrice,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCartDisplayPrice {
    pub with_tax: RawCartPrices,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCartItemMeta {
    pub display_price: RawCartDisplayPrice,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub meta: RawCartItemMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFileLink {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFile {
    pub link: RawFileLink,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCustomer {
    pub id: CustomerId,
    pub email: String,
}

/// An outlet record from the `pizzeria` entries flow.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOutletEntry {
    pub address: String,
    pub alias: String,
    pub latitude: f64,
    pub longitude: f64,
    pub courier_telegram_id: i64,
}

/// Fields for a saved user-coordinates record (`customer-address` flow).
#[derive(Debug, Serialize)]
pub(crate) struct CustomerAddressFields {
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    pub telegram_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

// =============================================================================
// Domain types
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image: Option<FileId>,
}

/// A page of the catalog, with the total catalog size for paging math.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: usize,
}

/// One line of a user's cart.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Price,
}

/// A physical pizzeria location.
#[derive(Debug, Clone)]
pub struct Outlet {
    pub address: String,
    pub alias: String,
    pub coordinates: Coordinates,
    pub courier_chat_id: ChatId,
}

/// A customer record created at checkout.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
}

// =============================================================================
// Conversions
// =============================================================================

impl From<RawPrice> for Price {
    fn from(raw: RawPrice) -> Self {
        // `with_tax` display prices are tax-inclusive by definition.
        Self::from_minor_units(raw.amount, raw.currency, true, raw.formatted)
    }
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            price: raw.meta.display_price.with_tax.into(),
            image: raw
                .relationships
                .and_then(|rel| rel.main_image)
                .map(|img| img.data.id),
        }
    }
}

impl From<RawCartItem> for CartItem {
    fn from(raw: RawCartItem) -> Self {
        Self {
            id: raw.id,
            product_id: raw.product_id,
            name: raw.name,
            description: raw.description,
            quantity: raw.quantity,
            unit_price: raw.meta.display_price.with_tax.unit.into(),
        }
    }
}

impl From<RawOutletEntry> for Outlet {
    fn from(raw: RawOutletEntry) -> Self {
        Self {
            address: raw.address,
            alias: raw.alias,
            coordinates: Coordinates::new(raw.latitude, raw.longitude),
            courier_chat_id: ChatId::new(raw.courier_telegram_id),
        }
    }
}

impl From<RawCustomer> for Customer {
    fn from(raw: RawCustomer) -> Self {
        Self {
            id: raw.id,
            email: raw.email,
        }
    }
}
