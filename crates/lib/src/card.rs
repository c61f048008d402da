//! Reply attachments: media references and hero cards with action buttons.

use serde::{Deserialize, Serialize};

pub const HERO_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.hero";

/// How the channel treats a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    /// Posts `value` back into the conversation as if the user typed it (quick reply).
    ImBack,
    PostBack,
    OpenUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub title: String,
    pub value: String,
}

impl CardAction {
    /// Quick-reply button whose label and value are the same text.
    pub fn im_back(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            action_type: ActionType::ImBack,
            title: label.clone(),
            value: label,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub buttons: Vec<CardAction>,
}

impl HeroCard {
    pub fn with_buttons(buttons: Vec<CardAction>) -> Self {
        Self {
            title: None,
            subtitle: None,
            buttons,
        }
    }

    pub fn to_attachment(self) -> Attachment {
        Attachment {
            content_type: HERO_CARD_CONTENT_TYPE.to_string(),
            content_url: None,
            name: None,
            content: Some(self),
        }
    }
}

/// One reply attachment. Media uses `content_url`; cards carry `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<HeroCard>,
}

impl Attachment {
    pub fn media(
        content_url: impl Into<String>,
        content_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            content_url: Some(content_url.into()),
            name: Some(name.into()),
            content: None,
        }
    }

    /// The hero card carried by this attachment, if it is one.
    pub fn hero_card(&self) -> Option<&HeroCard> {
        if self.content_type == HERO_CARD_CONTENT_TYPE {
            self.content.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hero_card_serializes_with_im_back_buttons() {
        let card = HeroCard::with_buttons(vec![CardAction::im_back("Yes, I'm.")]).to_attachment();
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["contentType"], HERO_CARD_CONTENT_TYPE);
        assert_eq!(json["content"]["buttons"][0]["type"], "imBack");
        assert_eq!(json["content"]["buttons"][0]["value"], "Yes, I'm.");
        assert!(json["content"].get("title").is_none());
    }

    #[test]
    fn media_attachment_is_not_a_card() {
        let a = Attachment::media("https://x/y.png", "image/png", "y.png");
        assert!(a.hero_card().is_none());
    }
}
