//! Shared application state.

use std::sync::Arc;

use crate::commerce::CommerceClient;
use crate::config::BotConfig;
use crate::credential::CredentialCache;
use crate::geocode::GeocodeClient;
use crate::machine::Machine;
use crate::reminders::ReminderQueue;
use crate::session::SessionStore;
use crate::telegram::TelegramClient;

/// Everything the update handlers need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BotConfig,
    telegram: TelegramClient,
    machine: Machine<CommerceClient, CommerceClient, GeocodeClient>,
    sessions: SessionStore,
    reminders: ReminderQueue,
}

impl AppState {
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        let telegram = TelegramClient::new(&config.telegram_token);
        let commerce = CommerceClient::new(&config.commerce);
        let geocode = GeocodeClient::new(&config.geocoder);

        // The commerce client doubles as the token source; the cache
        // holds the shared oauth credential for both roles.
        let credentials = CredentialCache::new(
            commerce.clone(),
            config.commerce.client_id.clone(),
            config.commerce.client_secret.clone(),
        );
        let machine = Machine::new(credentials, commerce, geocode, config.menu_page_size);
        let sessions = SessionStore::new(config.session_capacity, config.session_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                telegram,
                machine,
                sessions,
                reminders: ReminderQueue::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn telegram(&self) -> &TelegramClient {
        &self.inner.telegram
    }

    #[must_use]
    pub fn machine(&self) -> &Machine<CommerceClient, CommerceClient, GeocodeClient> {
        &self.inner.machine
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    #[must_use]
    pub fn reminders(&self) -> &ReminderQueue {
        &self.inner.reminders
    }
}
