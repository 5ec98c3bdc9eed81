//! Delayed follow-up messages.
//!
//! One pending reminder per user: arming a new one replaces (aborts)
//! the previous task, so only the latest order produces a follow-up.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use pizzatime_core::UserId;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long after payment the delivery-status follow-up fires.
pub const REMINDER_DELAY: Duration = Duration::from_secs(60 * 60);

#[derive(Default)]
pub struct ReminderQueue {
    pending: Mutex<HashMap<UserId, JoinHandle<()>>>,
}

impl ReminderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a reminder for `user_id`, replacing any pending one.
    ///
    /// `send` runs after `delay` unless the reminder is re-armed or
    /// cancelled first.
    pub fn schedule<F>(&self, user_id: UserId, delay: Duration, send: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            send.await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        // Reap handles of reminders that already fired; the map holds
        // only live timers plus whatever completed since the last arm.
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = pending.insert(user_id, handle) {
            debug!(user_id = %user_id, "replacing pending reminder");
            previous.abort();
        }
    }

}
