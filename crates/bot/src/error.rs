//! Unified error handling for the bot.
//!
//! Each remote-facing module defines its own `thiserror` enum; `BotError`
//! unifies them at the turn boundary. A failed turn must never be dropped
//! silently: `user_message` maps every failure to a message the current
//! screen can show so the user keeps their choice set and can retry.

use thiserror::Error;

use crate::commerce::CommerceError;
use crate::geocode::GeocodeError;

/// Application-level error type for a conversation turn. Telegram
/// transport failures never reach the machine; they are handled at the
/// transport layer directly.
#[derive(Debug, Error)]
pub enum BotError {
    /// Commerce backend operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Geocoding operation failed.
    #[error("Geocode error: {0}")]
    Geocode(#[from] GeocodeError),
}

impl BotError {
    /// User-facing failure text. Internals are never exposed to the chat.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Geocode(GeocodeError::AddressNotFound(_)) => {
                "Не удалось распознать адрес. Попробуйте написать его точнее \
                 или отправьте геолокацию."
            }
            _ => "Что-то пошло не так. Попробуйте ещё раз чуть позже.",
        }
    }

    /// Whether the failure is an expected, locally-recoverable condition
    /// rather than an operational error worth alerting on.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Geocode(GeocodeError::AddressNotFound(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_not_found_is_recoverable() {
        let err = BotError::from(GeocodeError::AddressNotFound("nowhere".to_string()));
        assert!(err.is_recoverable());
        assert!(err.user_message().contains("адрес"));
    }

    #[test]
    fn commerce_api_error_gets_generic_message() {
        let err = BotError::from(CommerceError::Api {
            status: 500,
            body: "boom".to_string(),
        });
        assert!(!err.is_recoverable());
        assert!(!err.user_message().contains("boom"));
    }
}
