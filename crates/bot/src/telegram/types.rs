//! Wire types for the Telegram Bot API.
//!
//! Only the fields this bot reads are modeled; Telegram objects carry
//! many more, which serde skips.

use serde::{Deserialize, Serialize};

/// Response envelope: `{"ok": bool, "result": ..., "description": ...}`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One long-polling update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub successful_payment: Option<SuccessfulPayment>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessfulPayment {
    #[serde(default)]
    pub order_info: Option<OrderInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInfo {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: User,
    pub invoice_payload: String,
}

/// Inline keyboard attached to an outgoing message.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

/// One invoice price line (amount in minor currency units).
#[derive(Debug, Clone, Serialize)]
pub struct LabeledPrice {
    pub label: String,
    pub amount: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn callback_update_deserializes() {
        let json = serde_json::json!({
            "update_id": 10,
            "callback_query": {
                "id": "cbq-1",
                "from": { "id": 42, "first_name": "Иван" },
                "message": { "message_id": 5, "chat": { "id": 42 } },
                "data": "cart"
            }
        });
        let update: Update = serde_json::from_value(json).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.from.id, 42);
        assert_eq!(query.data.as_deref(), Some("cart"));
        assert_eq!(query.message.unwrap().message_id, 5);
    }

    #[test]
    fn location_message_deserializes() {
        let json = serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 6,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Иван" },
                "location": { "longitude": 37.62, "latitude": 55.75 }
            }
        });
        let update: Update = serde_json::from_value(json).unwrap();
        let location = update.message.unwrap().location.unwrap();
        assert!((location.latitude - 55.75).abs() < 1e-9);
    }

    #[test]
    fn successful_payment_carries_order_email() {
        let json = serde_json::json!({
            "message_id": 7,
            "chat": { "id": 42 },
            "successful_payment": {
                "currency": "RUB",
                "total_amount": 90000,
                "invoice_payload": "user_id 42",
                "order_info": { "email": "user@example.com" }
            }
        });
        let message: Message = serde_json::from_value(json).unwrap();
        let payment = message.successful_payment.unwrap();
        assert_eq!(
            payment.order_info.unwrap().email.as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn keyboard_serializes_to_telegram_shape() {
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Корзина".to_string(),
                callback_data: "cart".to_string(),
            }]],
        };
        let json = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(
            json["inline_keyboard"][0][0]["callback_data"],
            serde_json::json!("cart")
        );
    }
}
