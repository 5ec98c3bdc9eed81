//! Telegram Bot API client.
//!
//! The chat transport boundary: long-polling inbound updates and the
//! outbound send operations a screen render needs. All calls go through
//! one JSON `call` helper that unwraps the Bot API envelope.

pub mod types;

use std::sync::Arc;

use pizzatime_core::{ChatId, Coordinates, MessageId};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use types::{
    ApiEnvelope, InlineKeyboardMarkup, LabeledPrice, Message, Update,
};

/// Errors that can occur when calling the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false`.
    #[error("Bot API error: {0}")]
    Api(String),

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    inner: Arc<TelegramClientInner>,
}

struct TelegramClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a new Bot API client for the given bot token.
    #[must_use]
    pub fn new(token: &SecretString) -> Self {
        Self {
            inner: Arc::new(TelegramClientInner {
                // No client-wide timeout: getUpdates long-polls with the
                // request held open for the poll timeout.
                client: reqwest::Client::new(),
                base_url: format!("https://api.telegram.org/bot{}", token.expose_secret()),
            }),
        }
    }

    /// Invoke one Bot API method with a JSON body.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> Result<T, TelegramError> {
        let response = self
            .inner
            .client
            .post(format!("{}/{method}", self.inner.base_url))
            .json(body)
            .send()
            .await?;

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| TelegramError::Parse(e.to_string()))?;

        if !envelope.ok {
            return Err(TelegramError::Api(
                envelope
                    .description
                    .unwrap_or_else(|| format!("{method} failed without description")),
            ));
        }

        envelope
            .result
            .ok_or_else(|| TelegramError::Parse(format!("{method}: ok response without result")))
    }

    /// Long-poll for inbound updates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query", "pre_checkout_query"],
        });
        self.call("getUpdates", &body).await
    }

    /// Send a text message, optionally with an inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": keyboard,
        });
        self.call("sendMessage", &body).await
    }

    /// Send a photo by URL with a caption.
    pub async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &Url,
        caption: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "photo": photo.as_str(),
            "caption": caption,
            "reply_markup": keyboard,
        });
        self.call("sendPhoto", &body).await
    }

    /// Send a map point (used for courier notifications).
    pub async fn send_location(
        &self,
        chat_id: ChatId,
        coordinates: Coordinates,
    ) -> Result<Message, TelegramError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "latitude": coordinates.latitude,
            "longitude": coordinates.longitude,
        });
        self.call("sendLocation", &body).await
    }

    /// Send a payment invoice. `need_email` asks Telegram to collect the
    /// customer's email, which the checkout flow stores on the customer
    /// record.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_invoice(
        &self,
        chat_id: ChatId,
        title: &str,
        description: &str,
        payload: &str,
        provider_token: &SecretString,
        currency: &str,
        prices: &[LabeledPrice],
    ) -> Result<Message, TelegramError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "title": title,
            "description": description,
            "payload": payload,
            "provider_token": provider_token.expose_secret(),
            "currency": currency,
            "prices": prices,
            "need_email": true,
        });
        self.call("sendInvoice", &body).await
    }

    /// Delete a previously sent message (stale prompt cleanup).
    pub async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TelegramError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        let _: bool = self.call("deleteMessage", &body).await?;
        Ok(())
    }

    /// Answer a callback query, optionally with a toast text.
    pub async fn answer_callback_query(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let body = serde_json::json!({
            "callback_query_id": query_id,
            "text": text,
        });
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Accept or reject a pre-checkout query. Telegram requires an answer
    /// within 10 seconds; a rejection must carry a reason.
    pub async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<(), TelegramError> {
        let body = serde_json::json!({
            "pre_checkout_query_id": query_id,
            "ok": ok,
            "error_message": error_message,
        });
        let _: bool = self.call("answerPreCheckoutQuery", &body).await?;
        Ok(())
    }
}
