//! Commerce backend REST API client.
//!
//! A typed façade over the remote commerce backend: catalog, per-user
//! carts, flexible-schema entries (outlets and saved coordinates), file
//! URL resolution, and customer records. Every privileged call takes a
//! bearer token obtained through [`crate::credential::CredentialCache`];
//! the client itself holds no credential state.

pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pizzatime_core::{CartItemId, Coordinates, CustomerId, FileId, ProductId, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::CommerceConfig;
use crate::credential::{Credential, TokenSource};

use types::{
    CartItem, Customer, CustomerAddressFields, Document, ListDocument, Outlet, Product,
    ProductPage, RawCartItem, RawCustomer, RawFile, RawOutletEntry, RawProduct, RawToken,
};

/// Entries flow holding outlet records.
const OUTLET_FLOW: &str = "pizzeria";
/// Entries flow holding saved user coordinates.
const ADDRESS_FLOW: &str = "customer-address";

/// Errors that can occur when interacting with the commerce backend.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-2xx response.
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Token endpoint rejected the client credentials.
    #[error("Auth error: {status} - {body}")]
    Auth { status: u16, body: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client for the commerce backend REST API.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl CommerceClient {
    /// Create a new commerce API client.
    #[must_use]
    pub fn new(config: &CommerceConfig) -> Self {
        Self {
            inner: Arc::new(CommerceClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Check status, then deserialize the response body.
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CommerceError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CommerceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| CommerceError::Parse(e.to_string()))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetch one fixed-size page of the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Api` on any non-2xx response.
    pub async fn list_products(
        &self,
        token: &str,
        page: usize,
        page_size: usize,
    ) -> Result<ProductPage, CommerceError> {
        let response = self
            .inner
            .client
            .get(self.url("/v2/products"))
            .bearer_auth(token)
            .query(&[
                ("page[limit]", page_size.to_string()),
                ("page[offset]", (page * page_size).to_string()),
            ])
            .send()
            .await?;

        let doc: ListDocument<RawProduct> = Self::read_json(response).await?;
        let products: Vec<Product> = doc.data.into_iter().map(Product::from).collect();
        // Older backend versions omit pagination meta on small catalogs.
        let total = doc
            .meta
            .map_or(products.len(), |meta| meta.results.total);

        Ok(ProductPage { products, total })
    }

    /// Fetch a single product.
    pub async fn get_product(
        &self,
        token: &str,
        product_id: &ProductId,
    ) -> Result<Product, CommerceError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/v2/products/{product_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        let doc: Document<RawProduct> = Self::read_json(response).await?;
        Ok(doc.data.into())
    }

    /// Resolve a stored file ID to its public URL.
    pub async fn get_file_url(&self, token: &str, file_id: &FileId) -> Result<Url, CommerceError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/v2/files/{file_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        let doc: Document<RawFile> = Self::read_json(response).await?;
        Url::parse(&doc.data.link.href).map_err(|e| CommerceError::Parse(e.to_string()))
    }

    // =========================================================================
    // Cart (cart id = Telegram user id; one cart per user)
    // =========================================================================

    /// Add `quantity` units of a product to the user's cart. The backend
    /// accumulates quantity when the product is already in the cart.
    pub async fn add_cart_item(
        &self,
        token: &str,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CommerceError> {
        let body = serde_json::json!({
            "data": {
                "id": product_id,
                "type": "cart_item",
                "quantity": quantity,
            }
        });

        let response = self
            .inner
            .client
            .post(self.url(&format!("/v2/carts/{user_id}/items")))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let _: ListDocument<RawCartItem> = Self::read_json(response).await?;
        Ok(())
    }

    /// Remove one cart line by its cart-item ID.
    pub async fn remove_cart_item(
        &self,
        token: &str,
        user_id: UserId,
        item_id: &CartItemId,
    ) -> Result<(), CommerceError> {
        let response = self
            .inner
            .client
            .delete(self.url(&format!("/v2/carts/{user_id}/items/{item_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommerceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// List the user's cart contents.
    pub async fn list_cart_items(
        &self,
        token: &str,
        user_id: UserId,
    ) -> Result<Vec<CartItem>, CommerceError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/v2/carts/{user_id}/items")))
            .bearer_auth(token)
            .send()
            .await?;

        let doc: ListDocument<RawCartItem> = Self::read_json(response).await?;
        Ok(doc.data.into_iter().map(CartItem::from).collect())
    }

    // =========================================================================
    // Entries (flexible-schema records)
    // =========================================================================

    /// List all entries of a flow, deserialized to `T`.
    async fn list_entries<T: DeserializeOwned>(
        &self,
        token: &str,
        flow: &str,
    ) -> Result<Vec<T>, CommerceError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/v2/flows/{flow}/entries")))
            .bearer_auth(token)
            .send()
            .await?;

        let doc: ListDocument<T> = Self::read_json(response).await?;
        Ok(doc.data)
    }

    /// Create one entry in a flow.
    async fn create_entry(
        &self,
        token: &str,
        flow: &str,
        fields: &impl serde::Serialize,
    ) -> Result<(), CommerceError> {
        let body = serde_json::json!({ "data": fields });

        let response = self
            .inner
            .client
            .post(self.url(&format!("/v2/flows/{flow}/entries")))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let _: Document<serde_json::Value> = Self::read_json(response).await?;
        Ok(())
    }

    /// List the pizzeria outlets.
    pub async fn list_outlets(&self, token: &str) -> Result<Vec<Outlet>, CommerceError> {
        let entries: Vec<RawOutletEntry> = self.list_entries(token, OUTLET_FLOW).await?;
        Ok(entries.into_iter().map(Outlet::from).collect())
    }

    /// Persist a user's resolved delivery coordinates.
    pub async fn save_customer_address(
        &self,
        token: &str,
        user_id: UserId,
        coordinates: Coordinates,
    ) -> Result<(), CommerceError> {
        let fields = CustomerAddressFields {
            entry_type: "entry",
            telegram_id: user_id.as_i64(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        };
        self.create_entry(token, ADDRESS_FLOW, &fields).await
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Create a customer record at checkout time.
    pub async fn create_customer(
        &self,
        token: &str,
        user_id: UserId,
        email: &str,
    ) -> Result<Customer, CommerceError> {
        let body = serde_json::json!({
            "data": {
                "type": "customer",
                "name": user_id.to_string(),
                "email": email,
            }
        });

        let response = self
            .inner
            .client
            .post(self.url("/v2/customers"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let doc: Document<RawCustomer> = Self::read_json(response).await?;
        Ok(doc.data.into())
    }

    /// Fetch an existing customer record by id.
    pub async fn get_customer(
        &self,
        token: &str,
        customer_id: &CustomerId,
    ) -> Result<Customer, CommerceError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/v2/customers/{customer_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        let doc: Document<RawCustomer> = Self::read_json(response).await?;
        Ok(doc.data.into())
    }
}

impl TokenSource for CommerceClient {
    /// Request a fresh access token via the client-credentials grant.
    async fn fetch_token(
        &self,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<Credential, CommerceError> {
        let response = self
            .inner
            .client
            .post(self.url("/oauth/access_token"))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CommerceError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawToken =
            serde_json::from_str(&body).map_err(|e| CommerceError::Parse(e.to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(raw.expires, 0)
            .ok_or_else(|| CommerceError::Parse(format!("bad expiry timestamp {}", raw.expires)))?;

        Ok(Credential {
            access_token: raw.access_token,
            expires_at,
        })
    }
}
