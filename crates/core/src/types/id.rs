//! Newtype IDs for type-safe entity references.
//!
//! Two macros are provided: `define_id!` for chat-platform numeric IDs
//! (Telegram user/chat IDs are signed 64-bit integers) and `define_str_id!`
//! for opaque string IDs issued by the commerce backend (products, files,
//! cart items, customers). The wrappers prevent accidentally mixing IDs
//! from different entity types.

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use pizzatime_core::define_id;
/// define_id!(UserId);
///
/// let user_id = UserId::new(42);
/// assert_eq!(user_id.as_i64(), 42);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Macro to define a type-safe opaque string ID wrapper.
///
/// The commerce backend issues UUID-like string IDs; we never parse or
/// generate them locally, so the wrapper stores the raw string.
#[macro_export]
macro_rules! define_str_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ChatId);
define_id!(MessageId);

define_str_id!(ProductId);
define_str_id!(CartItemId);
define_str_id!(FileId);
define_str_id!(CustomerId);

impl CustomerId {
    /// Short order number shown to the user: the first segment of the
    /// UUID-like customer ID.
    #[must_use]
    pub fn short(&self) -> &str {
        self.as_str().split('-').next().unwrap_or(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_are_distinct_types() {
        let user = UserId::new(7);
        let chat = ChatId::new(7);
        assert_eq!(user.as_i64(), chat.as_i64());
        assert_eq!(user.to_string(), "7");
    }

    #[test]
    fn string_id_round_trips() {
        let id = ProductId::from("5ab4b3b4-8c0b-4e9e-8a3c-000000000001");
        assert_eq!(id.as_str(), "5ab4b3b4-8c0b-4e9e-8a3c-000000000001");
    }

    #[test]
    fn customer_id_short_is_first_uuid_segment() {
        let id = CustomerId::from("5ab4b3b4-8c0b-4e9e-8a3c-000000000001");
        assert_eq!(id.short(), "5ab4b3b4");
    }

    #[test]
    fn customer_id_short_without_dashes_is_whole_id() {
        let id = CustomerId::from("plainid");
        assert_eq!(id.short(), "plainid");
    }

    #[test]
    fn ids_serialize_transparently() {
        let user = UserId::new(42);
        assert_eq!(serde_json::to_string(&user).unwrap(), "42");
        let product = ProductId::from("abc");
        assert_eq!(serde_json::to_string(&product).unwrap(), "\"abc\"");
    }
}
