//! Bot API object types and their field catalogues.
//!
//! Only the parts of the Bot API objects the framework reads or generates are
//! typed here. Field names follow the Bot API, so the serialized form is what
//! gets persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes a Bot API type: its name, identifying field and known fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiType {
    /// Type name as in the Bot API docs.
    pub name: &'static str,
    /// Field identifying an object of this type.
    pub id_field: &'static str,
    /// All fields of this type.
    pub fields: &'static [&'static str],
}

pub const UPDATE: ApiType = ApiType {
    name: "Update",
    id_field: "update_id",
    fields: &[
        "update_id",
        "message",
        "edited_message",
        "channel_post",
        "edited_channel_post",
        "inline_query",
        "chosen_inline_result",
        "callback_query",
        "shipping_query",
        "pre_checkout_query",
        "poll",
        "poll_answer",
    ],
};

pub const MESSAGE: ApiType = ApiType {
    name: "Message",
    id_field: "message_id",
    fields: &[
        "message_id",
        "date",
        "chat",
        "from",
        "sender_chat",
        "forward_from",
        "forward_from_chat",
        "forward_from_message_id",
        "forward_signature",
        "forward_sender_name",
        "forward_date",
        "reply_to_message",
        "via_bot",
        "edit_date",
        "media_group_id",
        "author_signature",
        "text",
        "entities",
        "animation",
        "audio",
        "document",
        "photo",
        "sticker",
        "video",
        "video_note",
        "voice",
        "caption",
        "caption_entities",
        "contact",
        "dice",
        "game",
        "poll",
        "venue",
        "location",
        "new_chat_members",
        "left_chat_member",
        "new_chat_title",
        "new_chat_photo",
        "delete_chat_photo",
        "group_chat_created",
        "supergroup_chat_created",
        "channel_chat_created",
        "migrate_to_chat_id",
        "migrate_from_chat_id",
        "pinned_message",
        "invoice",
        "successful_payment",
        "connected_website",
        "passport_data",
        "proximity_alert_triggered",
        "reply_markup",
    ],
};

pub const USER: ApiType = ApiType {
    name: "User",
    id_field: "id",
    fields: &[
        "id",
        "is_bot",
        "first_name",
        "last_name",
        "username",
        "language_code",
        "can_join_groups",
        "can_read_all_group_messages",
        "supports_inline_queries",
    ],
};

pub const CHAT: ApiType = ApiType {
    name: "Chat",
    id_field: "id",
    fields: &[
        "id",
        "type",
        "title",
        "username",
        "first_name",
        "last_name",
        "photo",
        "bio",
        "description",
        "invite_link",
        "pinned_message",
        "permissions",
        "slow_mode_delay",
        "sticker_set_name",
        "can_set_sticker_set",
        "linked_chat_id",
        "location",
        "all_members_are_administrators",
    ],
};

/// A Telegram user or bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatType {
    /// Group-like chats have negative identifiers.
    pub fn is_group(&self) -> bool {
        !matches!(self, ChatType::Private)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    Hashtag,
    Cashtag,
    BotCommand,
    Url,
    Email,
    PhoneNumber,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Pre,
    TextLink,
    TextMention,
    #[serde(other)]
    Other,
}

/// A special entity in a text message. Offsets are in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix time the message was sent.
    pub date: i64,
    pub chat: Chat,
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub from_user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_chat_members: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
}

/// An incoming update.
///
/// Message-like payloads are typed; the others are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_inline_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<Value>,
}

impl Update {
    /// Name of the payload field this update carries, e.g. `message`.
    pub fn update_type(&self) -> Option<&'static str> {
        if self.message.is_some() {
            Some("message")
        } else if self.edited_message.is_some() {
            Some("edited_message")
        } else if self.channel_post.is_some() {
            Some("channel_post")
        } else if self.edited_channel_post.is_some() {
            Some("edited_channel_post")
        } else if self.inline_query.is_some() {
            Some("inline_query")
        } else if self.chosen_inline_result.is_some() {
            Some("chosen_inline_result")
        } else if self.callback_query.is_some() {
            Some("callback_query")
        } else {
            None
        }
    }

    /// The message this update is about, whichever field carries it.
    pub fn effective_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or(self.channel_post.as_ref())
            .or(self.edited_channel_post.as_ref())
    }

    pub fn effective_chat(&self) -> Option<&Chat> {
        self.effective_message().map(|message| &message.chat)
    }

    pub fn effective_user(&self) -> Option<&User> {
        self.effective_message()
            .and_then(|message| message.from_user.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_roundtrip_uses_api_names() {
        let raw = json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "date": 1_600_000_000,
                "chat": {"id": -7, "type": "group", "title": "Spam lovers"},
                "from": {"id": 3, "is_bot": false, "first_name": "Palin"},
                "text": "/start",
                "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
            }
        });
        let update: Update = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(update.update_type(), Some("message"));
        assert_eq!(update.effective_chat().unwrap().kind, ChatType::Group);
        assert_eq!(update.effective_user().unwrap().first_name, "Palin");
        assert_eq!(serde_json::to_value(&update).unwrap(), raw);
    }

    #[test]
    fn test_unknown_entity_kind() {
        let entity: MessageEntity =
            serde_json::from_value(json!({"type": "spoiler", "offset": 0, "length": 1})).unwrap();
        assert_eq!(entity.kind, EntityKind::Other);
    }
}
