//! Long-polling transport.
//!
//! Pulls updates from Telegram, maps each to a machine [`Event`], and
//! renders the resulting [`Turn`]. Updates are handled on their own
//! tasks; the per-user session mutex serializes turns for one user
//! while different users proceed in parallel.

use pizzatime_core::{ChatId, Coordinates, MessageId, UserId};
use tracing::{debug, error, warn};

use crate::machine::{Effect, Event, Turn};
use crate::reminders::REMINDER_DELAY;
use crate::screens::{self, Screen};
use crate::session::Session;
use crate::state::AppState;
use crate::telegram::types::{InlineKeyboardButton, InlineKeyboardMarkup, LabeledPrice, Update};

/// How long getUpdates holds the poll open.
const POLL_TIMEOUT_SECS: u64 = 60;
/// Backoff after a failed poll.
const POLL_RETRY: std::time::Duration = std::time::Duration::from_secs(3);

const INVOICE_CURRENCY: &str = "RUB";

/// One classified inbound update.
#[derive(Debug)]
struct Inbound {
    user_id: UserId,
    chat_id: ChatId,
    /// Sender's first name, empty when Telegram omits it.
    first_name: String,
    event: Event,
    /// Callback query to acknowledge, for button presses.
    callback_id: Option<String>,
}

/// Map a raw update to a machine event. Returns `None` for updates the
/// bot has no rule for (edited messages, stickers without text, ...).
fn classify(update: Update) -> Option<Inbound> {
    if let Some(query) = update.callback_query {
        let user_id = UserId::new(query.from.id);
        let chat_id = query
            .message
            .as_ref()
            .map_or(ChatId::new(query.from.id), |m| ChatId::new(m.chat.id));
        return Some(Inbound {
            user_id,
            chat_id,
            first_name: query.from.first_name,
            event: Event::Callback(query.data.unwrap_or_default()),
            callback_id: Some(query.id),
        });
    }

    if let Some(query) = update.pre_checkout_query {
        return Some(Inbound {
            user_id: UserId::new(query.from.id),
            chat_id: ChatId::new(query.from.id),
            first_name: query.from.first_name,
            event: Event::PreCheckout {
                query_id: query.id,
                payload: query.invoice_payload,
            },
            callback_id: None,
        });
    }

    let message = update.message?;
    let chat_id = ChatId::new(message.chat.id);
    let (user_id, first_name) = message
        .from
        .map_or((UserId::new(message.chat.id), String::new()), |from| {
            (UserId::new(from.id), from.first_name)
        });

    let event = if let Some(payment) = message.successful_payment {
        Event::PaymentDone {
            email: payment.order_info.and_then(|info| info.email),
        }
    } else if let Some(location) = message.location {
        Event::Location(Coordinates::new(location.latitude, location.longitude))
    } else if let Some(text) = message.text {
        if text.starts_with("/start") {
            Event::Start
        } else {
            Event::Text(text)
        }
    } else {
        return None;
    };

    Some(Inbound {
        user_id,
        chat_id,
        first_name,
        event,
        callback_id: None,
    })
}

fn keyboard_from(screen: &Screen) -> Option<InlineKeyboardMarkup> {
    if screen.choices.is_empty() {
        return None;
    }
    Some(InlineKeyboardMarkup {
        inline_keyboard: screen
            .choices
            .iter()
            .map(|row| {
                row.iter()
                    .map(|choice| InlineKeyboardButton {
                        text: choice.label.clone(),
                        callback_data: choice.payload.clone(),
                    })
                    .collect()
            })
            .collect(),
    })
}

/// Poll forever, spawning a task per update.
pub async fn run(state: AppState) {
    let mut offset: Option<i64> = None;

    loop {
        let updates = match state.telegram().get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(%error, "getUpdates failed, retrying");
                tokio::time::sleep(POLL_RETRY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(inbound) = classify(update) else {
                continue;
            };

            let state = state.clone();
            tokio::spawn(async move {
                handle_update(state, inbound).await;
            });
        }
    }
}

async fn handle_update(state: AppState, inbound: Inbound) {
    let session = state
        .sessions()
        .get_or_create(inbound.user_id, inbound.chat_id)
        .await;
    // One turn at a time per user.
    let mut session = session.lock().await;

    if !inbound.first_name.is_empty() && session.first_name != inbound.first_name {
        session.first_name.clone_from(&inbound.first_name);
    }

    debug!(user_id = %inbound.user_id, event = ?inbound.event, "update");

    // A failed turn renders a failure notice below the current prompt
    // instead of replacing it, keeping the prompt's keyboard live for a
    // retry from the unchanged state.
    let (turn, replace_prompt) = match state.machine().handle(&mut session, inbound.event).await {
        Ok(turn) => (turn, true),
        Err(error) => {
            if error.is_recoverable() {
                warn!(user_id = %inbound.user_id, %error, "turn failed (recoverable)");
            } else {
                error!(user_id = %inbound.user_id, %error, "turn failed");
            }
            let turn = Turn {
                screen: Some(screens::failure(error.user_message())),
                ..Turn::default()
            };
            (turn, false)
        }
    };

    if let Some(query_id) = inbound.callback_id.as_deref() {
        if let Err(error) = state
            .telegram()
            .answer_callback_query(query_id, turn.toast.as_deref())
            .await
        {
            warn!(%error, "answerCallbackQuery failed");
        }
    }

    for effect in turn.effects {
        execute_effect(&state, &session, effect).await;
    }

    if let Some(screen) = turn.screen {
        render(&state, &mut session, &screen, replace_prompt).await;
    }
}

/// Prompt bookkeeping after a successful send: which message to delete
/// and which to remember. A regular screen replaces the previous prompt;
/// a failure notice leaves it (and its keyboard) in place.
fn prompt_rotation(
    previous: Option<MessageId>,
    sent: MessageId,
    replace_prompt: bool,
) -> (Option<MessageId>, Option<MessageId>) {
    if replace_prompt {
        (previous, Some(sent))
    } else {
        (None, previous)
    }
}

async fn execute_effect(state: &AppState, session: &Session, effect: Effect) {
    match effect {
        Effect::NotifyCourier {
            chat_id,
            summary,
            coordinates,
        } => {
            let result = async {
                state.telegram().send_message(chat_id, &summary, None).await?;
                state.telegram().send_location(chat_id, coordinates).await
            }
            .await;
            if let Err(error) = result {
                error!(courier = %chat_id, %error, "courier notification failed");
            }
        }

        Effect::SendInvoice {
            title,
            description,
            payload,
            total_minor_units,
        } => {
            let prices = [LabeledPrice {
                label: "Заказ с доставкой".to_string(),
                amount: total_minor_units,
            }];
            if let Err(error) = state
                .telegram()
                .send_invoice(
                    session.chat_id,
                    &title,
                    &description,
                    &payload,
                    &state.config().payment_provider_token,
                    INVOICE_CURRENCY,
                    &prices,
                )
                .await
            {
                error!(user_id = %session.user_id, %error, "sendInvoice failed");
            }
        }

        Effect::ScheduleReminder => {
            let telegram = state.telegram().clone();
            let chat_id = session.chat_id;
            state
                .reminders()
                .schedule(session.user_id, REMINDER_DELAY, async move {
                    if let Err(error) = telegram
                        .send_message(chat_id, screens::reminder_text(), None)
                        .await
                    {
                        warn!(%error, "reminder send failed");
                    }
                });
        }

        Effect::AnswerPreCheckout {
            query_id,
            ok,
            error_message,
        } => {
            if let Err(error) = state
                .telegram()
                .answer_pre_checkout_query(&query_id, ok, error_message.as_deref())
                .await
            {
                error!(%error, "answerPreCheckoutQuery failed");
            }
        }
    }
}

/// Send the screen and swap it in as the user's current prompt.
async fn render(state: &AppState, session: &mut Session, screen: &Screen, replace_prompt: bool) {
    let keyboard = keyboard_from(screen);
    let sent = match &screen.image {
        Some(url) => {
            state
                .telegram()
                .send_photo(session.chat_id, url, &screen.text, keyboard.as_ref())
                .await
        }
        None => {
            state
                .telegram()
                .send_message(session.chat_id, &screen.text, keyboard.as_ref())
                .await
        }
    };

    match sent {
        Ok(message) => {
            // Drop the stale prompt so its buttons cannot fire against
            // the new state.
            let (stale, next) = prompt_rotation(
                session.last_prompt.take(),
                MessageId::new(message.message_id),
                replace_prompt,
            );
            if let Some(previous) = stale {
                if let Err(error) = state.telegram().delete_message(session.chat_id, previous).await
                {
                    debug!(%error, "stale prompt cleanup failed");
                }
            }
            session.last_prompt = next;
        }
        Err(error) => {
            error!(user_id = %session.user_id, %error, "screen send failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn update(json: serde_json::Value) -> Update {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn start_command_classifies_as_start() {
        let inbound = classify(update(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Иван" },
                "text": "/start"
            }
        })))
        .unwrap();

        assert_eq!(inbound.user_id.as_i64(), 42);
        assert_eq!(inbound.first_name, "Иван");
        assert!(matches!(inbound.event, Event::Start));
        assert!(inbound.callback_id.is_none());
    }

    #[test]
    fn free_text_classifies_as_text() {
        let inbound = classify(update(serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 2,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Иван" },
                "text": "Тверская, 1"
            }
        })))
        .unwrap();

        assert!(matches!(inbound.event, Event::Text(text) if text == "Тверская, 1"));
    }

    #[test]
    fn button_press_carries_payload_and_callback_id() {
        let inbound = classify(update(serde_json::json!({
            "update_id": 3,
            "callback_query": {
                "id": "cbq-7",
                "from": { "id": 42, "first_name": "Иван" },
                "message": { "message_id": 9, "chat": { "id": 42 } },
                "data": "cart"
            }
        })))
        .unwrap();

        assert!(matches!(inbound.event, Event::Callback(data) if data == "cart"));
        assert_eq!(inbound.callback_id.as_deref(), Some("cbq-7"));
    }

    #[test]
    fn shared_location_classifies_as_location() {
        let inbound = classify(update(serde_json::json!({
            "update_id": 4,
            "message": {
                "message_id": 3,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Иван" },
                "location": { "longitude": 37.62, "latitude": 55.75 }
            }
        })))
        .unwrap();

        match inbound.event {
            Event::Location(point) => {
                assert!((point.latitude - 55.75).abs() < 1e-9);
                assert!((point.longitude - 37.62).abs() < 1e-9);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn pre_checkout_query_classifies_with_payload() {
        let inbound = classify(update(serde_json::json!({
            "update_id": 5,
            "pre_checkout_query": {
                "id": "pcq-1",
                "from": { "id": 42, "first_name": "Иван" },
                "currency": "RUB",
                "total_amount": 60000,
                "invoice_payload": "user_id 42"
            }
        })))
        .unwrap();

        assert!(matches!(
            inbound.event,
            Event::PreCheckout { query_id, payload }
                if query_id == "pcq-1" && payload == "user_id 42"
        ));
    }

    #[test]
    fn successful_payment_classifies_with_email() {
        let inbound = classify(update(serde_json::json!({
            "update_id": 6,
            "message": {
                "message_id": 4,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Иван" },
                "successful_payment": {
                    "currency": "RUB",
                    "total_amount": 60000,
                    "invoice_payload": "user_id 42",
                    "order_info": { "email": "user@example.com" }
                }
            }
        })))
        .unwrap();

        assert!(matches!(
            inbound.event,
            Event::PaymentDone { email: Some(email) } if email == "user@example.com"
        ));
    }

    #[test]
    fn sticker_only_message_is_ignored() {
        assert!(classify(update(serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 5,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Иван" }
            }
        })))
        .is_none());
    }

    #[test]
    fn rendered_screen_replaces_the_previous_prompt() {
        let (stale, next) = prompt_rotation(Some(MessageId::new(5)), MessageId::new(6), true);
        assert_eq!(stale, Some(MessageId::new(5)));
        assert_eq!(next, Some(MessageId::new(6)));
    }

    #[test]
    fn failure_notice_keeps_the_previous_prompt() {
        let (stale, next) = prompt_rotation(Some(MessageId::new(5)), MessageId::new(6), false);
        assert!(stale.is_none());
        assert_eq!(next, Some(MessageId::new(5)));
    }

    #[test]
    fn keyboard_mirrors_screen_rows() {
        let screen = screens::fallback();
        let keyboard = keyboard_from(&screen).unwrap();
        assert_eq!(keyboard.inline_keyboard.len(), screen.choices.len());
        let first = keyboard
            .inline_keyboard
            .first()
            .and_then(|row| row.first())
            .unwrap();
        assert_eq!(first.callback_data, "back");
    }
}
