//! Conversational activities in the connector wire shape.
//!
//! Inbound: one `Activity` per HTTP POST, delivered by the channel connector.
//! Outbound: a `Reply` built from the inbound activity and handed to a `ReplySender`.

use crate::card::Attachment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity type (`type` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Message,
    ConversationUpdate,
    ContactRelationUpdate,
    Typing,
    DeleteUserData,
    Ping,
    /// Any type this bot does not know about; handled as a no-op.
    #[serde(other)]
    Unknown,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Message => "message",
            ActivityKind::ConversationUpdate => "conversationUpdate",
            ActivityKind::ContactRelationUpdate => "contactRelationUpdate",
            ActivityKind::Typing => "typing",
            ActivityKind::DeleteUserData => "deleteUserData",
            ActivityKind::Ping => "ping",
            ActivityKind::Unknown => "unknown",
        }
    }
}

/// A participant (user or bot) on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActivityError {
    #[error("activity is missing a conversation id")]
    MissingConversation,
    #[error("activity is missing the sender (from.id)")]
    MissingSender,
    #[error("activity is missing the recipient (recipient.id)")]
    MissingRecipient,
    #[error("activity is missing a channel id")]
    MissingChannel,
}

/// Inbound activity. Immutable once handed to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Activity {
    /// A message activity from `from_id` to `bot_id` in a conversation. Used by the CLI and tests.
    pub fn message(
        channel_id: &str,
        conversation_id: &str,
        from_id: &str,
        bot_id: &str,
        text: &str,
    ) -> Self {
        Self {
            kind: ActivityKind::Message,
            id: Some(uuid::Uuid::new_v4().to_string()),
            timestamp: Some(Utc::now()),
            service_url: None,
            channel_id: channel_id.to_string(),
            from: ChannelAccount::new(from_id, None),
            recipient: ChannelAccount::new(bot_id, None),
            conversation: ConversationAccount {
                id: conversation_id.to_string(),
                name: None,
            },
            text: Some(text.to_string()),
            members_added: Vec::new(),
            members_removed: Vec::new(),
            reply_to_id: None,
        }
    }

    /// A conversationUpdate announcing `members` joining the conversation.
    pub fn conversation_update(
        channel_id: &str,
        conversation_id: &str,
        bot_id: &str,
        members: Vec<ChannelAccount>,
    ) -> Self {
        let mut activity = Self::message(channel_id, conversation_id, bot_id, bot_id, "");
        activity.kind = ActivityKind::ConversationUpdate;
        activity.text = None;
        activity.members_added = members;
        activity
    }

    /// Reject activities that cannot be routed or answered. Runs at the boundary, before the router.
    pub fn validate(&self) -> Result<(), ActivityError> {
        if self.channel_id.trim().is_empty() {
            return Err(ActivityError::MissingChannel);
        }
        if self.conversation.id.trim().is_empty() {
            return Err(ActivityError::MissingConversation);
        }
        if self.from.id.trim().is_empty() {
            return Err(ActivityError::MissingSender);
        }
        if self.recipient.id.trim().is_empty() {
            return Err(ActivityError::MissingRecipient);
        }
        Ok(())
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Build an empty reply addressed back to the sender of this activity.
    pub fn create_reply(&self, text: impl Into<String>) -> Reply {
        Reply {
            kind: ActivityKind::Message,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            service_url: self.service_url.clone(),
            channel_id: self.channel_id.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            reply_to_id: self.id.clone(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Outbound message activity under construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    pub channel_id: String,
    pub from: ChannelAccount,
    pub recipient: ChannelAccount,
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Reply {
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connector_message_json() {
        let json = r#"{
            "type": "message",
            "id": "a1",
            "serviceUrl": "https://smba.example.com",
            "channelId": "emulator",
            "from": { "id": "u1", "name": "Ann" },
            "recipient": { "id": "bot" },
            "conversation": { "id": "c1" },
            "text": "hello"
        }"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.kind, ActivityKind::Message);
        assert_eq!(activity.from.name.as_deref(), Some("Ann"));
        assert_eq!(activity.text(), "hello");
        assert!(activity.validate().is_ok());
    }

    #[test]
    fn unknown_type_is_not_a_parse_error() {
        let json = r#"{ "type": "invoke", "channelId": "x", "conversation": { "id": "c" } }"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.kind, ActivityKind::Unknown);
    }

    #[test]
    fn validate_rejects_missing_conversation() {
        let mut activity = Activity::message("emulator", "c1", "u1", "bot", "hi");
        activity.conversation.id.clear();
        assert_eq!(activity.validate(), Err(ActivityError::MissingConversation));
    }

    #[test]
    fn reply_swaps_sender_and_recipient() {
        let activity = Activity::message("emulator", "c1", "u1", "bot", "hi");
        let reply = activity.create_reply("hey");
        assert_eq!(reply.from.id, "bot");
        assert_eq!(reply.recipient.id, "u1");
        assert_eq!(reply.conversation.id, "c1");
        assert_eq!(reply.reply_to_id, activity.id);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["replyToId"], serde_json::json!(activity.id));
    }
}
