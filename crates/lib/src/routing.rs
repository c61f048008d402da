//! Activity routing: decide which handler answers an inbound activity, and the handlers that
//! need no state (free-form replies and system events).

use crate::activity::{Activity, ActivityKind, Reply};
use crate::card::{Attachment, CardAction, HeroCard};

/// Reply that proves the bot is alive.
pub const TESTING_PHRASE: &str = "Yes, I'm.";
/// Enters the pizza-order form.
pub const ORDER_PHRASE: &str = "No, Order a pizza";

pub const WORKING_TEXT: &str = "Well, I work !";
pub const FALLBACK_TEXT: &str = "Are you here to test the bot ?";
const WELCOME_SUFFIX: &str = ", I'm a automated bot planning to takeover the world !";

const BENDER_URL: &str = "https://upload.wikimedia.org/wikipedia/en/a/a6/Bender_Rodriguez.png";
const BENDER_NAME: &str = "Bender_Rodriguez.png";

/// Where an activity goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Start or continue the guided form.
    GuidedForm,
    /// Fixed question-and-answer replies.
    FreeForm,
    /// Non-message activity.
    SystemEvent(ActivityKind),
}

/// Classify an activity. `form_active` is whether this conversation has a form in progress.
pub fn classify(activity: &Activity, form_active: bool) -> Route {
    match activity.kind {
        ActivityKind::Message if form_active || activity.text() == ORDER_PHRASE => Route::GuidedForm,
        ActivityKind::Message => Route::FreeForm,
        kind => Route::SystemEvent(kind),
    }
}

/// The single reply to a message outside the guided form.
pub fn free_form_reply(activity: &Activity) -> Reply {
    if activity.text() == TESTING_PHRASE {
        activity
            .create_reply(WORKING_TEXT)
            .with_attachment(Attachment::media(BENDER_URL, "image/png", BENDER_NAME))
    } else {
        let card = HeroCard::with_buttons(vec![
            CardAction::im_back(TESTING_PHRASE),
            CardAction::im_back(ORDER_PHRASE),
        ]);
        activity
            .create_reply(FALLBACK_TEXT)
            .with_attachment(card.to_attachment())
    }
}

/// Welcome line for a member joining the conversation.
pub fn welcome_text(name: Option<&str>) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => format!("Welcome {}{}", name, WELCOME_SUFFIX),
        None => format!("Welcome{}", WELCOME_SUFFIX),
    }
}

/// Replies for a non-message activity.
///
/// Only `conversationUpdate` produces replies: one welcome per added member other than the
/// bot itself. `deleteUserData`, `contactRelationUpdate`, `typing` and `ping` are accepted and
/// intentionally produce nothing; they are the places to add behavior for those events.
pub fn system_event_replies(activity: &Activity) -> Vec<Reply> {
    match activity.kind {
        ActivityKind::ConversationUpdate => activity
            .members_added
            .iter()
            .filter(|m| m.id != activity.recipient.id)
            .map(|m| activity.create_reply(welcome_text(m.name.as_deref())))
            .collect(),
        ActivityKind::DeleteUserData => {
            log::debug!("deleteUserData from {}: no stored user data beyond form sessions", activity.from.id);
            Vec::new()
        }
        ActivityKind::ContactRelationUpdate => {
            log::debug!("contactRelationUpdate from {}: ignored", activity.from.id);
            Vec::new()
        }
        ActivityKind::Typing => Vec::new(),
        ActivityKind::Ping => Vec::new(),
        ActivityKind::Unknown => {
            log::debug!("ignoring activity of unknown type in {}", activity.conversation.id);
            Vec::new()
        }
        ActivityKind::Message => Vec::new(),
    }
}
