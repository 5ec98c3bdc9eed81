//! Per-user conversational sessions.
//!
//! One session per end user, created on the first inbound event and
//! evicted only by the cache's own capacity/TTL policy. The session map
//! is the only per-user state in the process; the `Mutex` around each
//! session serializes turns for one user while different users proceed
//! concurrently.

use std::sync::Arc;

use moka::future::Cache;
use pizzatime_core::{ChatId, Coordinates, CustomerId, MessageId, ProductId, UserId};
use tokio::sync::Mutex;

/// Logical conversation screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatState {
    /// Product list; the entry state.
    #[default]
    Menu,
    /// One product is displayed; quantity buttons are live.
    Description,
    /// Cart contents with per-line removal.
    Cart,
    /// Waiting for an address or a shared geolocation.
    AwaitingLocation,
    /// Delivery/pickup choice for the resolved location.
    Delivery,
    /// Invoice sent; awaiting payment.
    Payment,
}

/// Denormalized snapshot of the outlet nearest to the user's location.
#[derive(Debug, Clone)]
pub struct NearestOutlet {
    pub address: String,
    pub alias: String,
    /// Distance from the user, already rounded to one decimal place.
    pub distance_km: f64,
    /// Chat of the courier attached to this outlet.
    pub courier_chat_id: ChatId,
}

/// Conversational context carried across turns for one user.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    /// The chat the conversation runs in (same value as `user_id` for
    /// private chats, but typed separately).
    pub chat_id: ChatId,
    /// First name used in greetings; refreshed on every inbound event.
    pub first_name: String,
    pub state: ChatState,
    /// Product currently shown on the Description screen.
    pub active_product: Option<ProductId>,
    /// Current menu page (0-based).
    pub menu_page: usize,
    pub nearest_outlet: Option<NearestOutlet>,
    pub delivery_coordinates: Option<Coordinates>,
    /// Customer record created on the first successful payment; a
    /// redelivered payment update re-reads it instead of creating a
    /// duplicate.
    pub customer_id: Option<CustomerId>,
    /// Last prompt message we sent; deleted when the next screen renders.
    pub last_prompt: Option<MessageId>,
}

impl Session {
    /// Fresh session in the entry state.
    #[must_use]
    pub fn new(user_id: UserId, chat_id: ChatId) -> Self {
        Self {
            user_id,
            chat_id,
            first_name: String::new(),
            state: ChatState::default(),
            active_product: None,
            menu_page: 0,
            nearest_outlet: None,
            delivery_coordinates: None,
            customer_id: None,
            last_prompt: None,
        }
    }
}

/// Concurrent session map with capacity/TTL eviction.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<UserId, Arc<Mutex<Session>>>,
}

impl SessionStore {
    /// Create a store evicting idle sessions after `ttl`.
    #[must_use]
    pub fn new(capacity: u64, ttl: std::time::Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(ttl)
                .build(),
        }
    }

    /// Get the session for `user_id`, creating it on first contact.
    pub async fn get_or_create(&self, user_id: UserId, chat_id: ChatId) -> Arc<Mutex<Session>> {
        self.cache
            .get_with(user_id, async move {
                Arc::new(Mutex::new(Session::new(user_id, chat_id)))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn first_contact_creates_menu_session() {
        let store = SessionStore::new(16, Duration::from_secs(60));
        let session = store
            .get_or_create(UserId::new(42), ChatId::new(42))
            .await;
        let session = session.lock().await;
        assert_eq!(session.state, ChatState::Menu);
        assert!(session.active_product.is_none());
        assert!(session.nearest_outlet.is_none());
    }

    #[tokio::test]
    async fn same_user_gets_same_session() {
        let store = SessionStore::new(16, Duration::from_secs(60));
        let a = store.get_or_create(UserId::new(1), ChatId::new(1)).await;
        a.lock().await.menu_page = 2;

        let b = store.get_or_create(UserId::new(1), ChatId::new(1)).await;
        assert_eq!(b.lock().await.menu_page, 2);
    }

    #[tokio::test]
    async fn different_users_are_isolated() {
        let store = SessionStore::new(16, Duration::from_secs(60));
        let a = store.get_or_create(UserId::new(1), ChatId::new(1)).await;
        a.lock().await.state = ChatState::Cart;

        let b = store.get_or_create(UserId::new(2), ChatId::new(2)).await;
        assert_eq!(b.lock().await.state, ChatState::Menu);
    }
}
