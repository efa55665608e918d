//! Factories for simulated Bot API objects.
//!
//! Tests build incoming updates with these instead of spelling out every
//! field. Identifiers come from a process-wide counter, so objects created in
//! one test never collide.

use crate::entities::parse_entities;
use crate::types::{Chat, ChatType, Message, Update, User};
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Returns a new identifier, larger than every one returned before.
pub fn next_id() -> i64 {
    LAST_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// Overrides for a generated chat.
#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    pub id: Option<i64>,
    pub kind: Option<ChatType>,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// Overrides for a generated user.
#[derive(Debug, Clone, Default)]
pub struct UserParams {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: Option<bool>,
}

/// Overrides for a generated message.
#[derive(Debug, Clone, Default)]
pub struct MessageParams {
    pub message_id: Option<i64>,
    pub text: Option<String>,
    pub date: Option<i64>,
    pub chat: ChatParams,
    pub from: UserParams,
    pub new_chat_members: Vec<User>,
}

impl MessageParams {
    /// Params for a message in a chat of the given type.
    pub fn in_chat(kind: ChatType) -> Self {
        Self {
            chat: ChatParams {
                kind: Some(kind),
                ..ChatParams::default()
            },
            ..Self::default()
        }
    }
}

/// Which update field carries a generated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
}

pub struct ChatFactory;

impl ChatFactory {
    /// Creates a private chat unless told otherwise. Group-like chats get negative ids.
    pub fn create(params: ChatParams) -> Chat {
        let kind = params.kind.unwrap_or(ChatType::Private);
        let id = params.id.unwrap_or_else(|| {
            let id = next_id();
            if kind.is_group() {
                -id
            } else {
                id
            }
        });
        let title = match kind {
            ChatType::Private => params.title,
            _ => params.title.or_else(|| Some(format!("Chat {}", id.abs()))),
        };
        Chat {
            id,
            kind,
            title,
            username: params.username,
            first_name: None,
            last_name: None,
        }
    }
}

pub struct UserFactory;

impl UserFactory {
    pub fn create(params: UserParams) -> User {
        User {
            id: params.id.unwrap_or_else(next_id),
            is_bot: params.is_bot.unwrap_or(false),
            first_name: params.first_name.unwrap_or_else(|| "Palin".to_string()),
            last_name: params.last_name,
            username: params.username,
            language_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFactory {
    kind: MessageKind,
}

impl MessageFactory {
    pub fn new(kind: MessageKind) -> Self {
        Self { kind }
    }

    /// Creates a message, defaulting to the text "Spam" from a fresh user.
    ///
    /// A message announcing new chat members is placed in a group chat.
    pub fn create(&self, params: MessageParams) -> Message {
        let mut chat_params = params.chat;
        if !params.new_chat_members.is_empty() && chat_params.kind.is_none() {
            chat_params.kind = Some(ChatType::Group);
        }
        let chat = ChatFactory::create(chat_params);
        let from_user = UserFactory::create(params.from);

        let text = params.text.unwrap_or_else(|| "Spam".to_string());
        let now = Utc::now().timestamp();
        let edit_date = matches!(
            self.kind,
            MessageKind::EditedMessage | MessageKind::EditedChannelPost
        )
        .then_some(now);

        Message {
            message_id: params.message_id.unwrap_or_else(next_id),
            date: params.date.unwrap_or(now),
            chat,
            from_user: Some(from_user),
            edit_date,
            entities: parse_entities(&text),
            text: Some(text),
            new_chat_members: params.new_chat_members,
            migrate_to_chat_id: None,
            reply_to_message: None,
        }
    }
}

/// Creates updates carrying a generated message.
///
/// # Examples
///
/// ```
/// use meetg::factories::{MessageKind, MessageParams, MessageUpdateFactory};
///
/// let update = MessageUpdateFactory::new(MessageKind::Message).create(MessageParams {
///     text: Some("/start".to_string()),
///     ..MessageParams::default()
/// });
/// assert_eq!(update.update_type(), Some("message"));
/// assert_eq!(update.effective_message().unwrap().entities.len(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageUpdateFactory {
    kind: MessageKind,
}

impl MessageUpdateFactory {
    pub fn new(kind: MessageKind) -> Self {
        Self { kind }
    }

    pub fn create(&self, params: MessageParams) -> Update {
        let message = MessageFactory::new(self.kind).create(params);
        let mut update = Update {
            update_id: next_id(),
            message: None,
            edited_message: None,
            channel_post: None,
            edited_channel_post: None,
            inline_query: None,
            chosen_inline_result: None,
            callback_query: None,
        };
        match self.kind {
            MessageKind::Message => update.message = Some(message),
            MessageKind::EditedMessage => update.edited_message = Some(message),
            MessageKind::ChannelPost => update.channel_post = Some(message),
            MessageKind::EditedChannelPost => update.edited_channel_post = Some(message),
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let first = next_id();
        let second = next_id();
        assert!(second > first);
    }

    #[test]
    fn test_type_is_group_if_new_chat_members() {
        let member = UserFactory::create(UserParams {
            is_bot: Some(true),
            username: Some("mock_username".to_string()),
            ..UserParams::default()
        });
        let message = MessageFactory::default().create(MessageParams {
            new_chat_members: vec![member],
            ..MessageParams::default()
        });
        assert!(message.chat.id < 0);
        assert_eq!(message.chat.kind, ChatType::Group);
    }

    #[test]
    fn test_message_defaults() {
        let message = MessageFactory::default().create(MessageParams::default());
        assert_eq!(message.text.as_deref(), Some("Spam"));
        assert_eq!(message.chat.kind, ChatType::Private);
        assert!(message.chat.id > 0);
        assert_eq!(message.from_user.unwrap().first_name, "Palin");
        assert!(message.edit_date.is_none());
    }

    #[test]
    fn test_edited_message_has_edit_date() {
        let update = MessageUpdateFactory::new(MessageKind::EditedMessage)
            .create(MessageParams::default());
        assert_eq!(update.update_type(), Some("edited_message"));
        assert!(update.edited_message.unwrap().edit_date.is_some());
    }

    #[test]
    fn test_explicit_chat_id_is_kept() {
        let chat = ChatFactory::create(ChatParams {
            id: Some(1),
            ..ChatParams::default()
        });
        assert_eq!(chat.id, 1);
    }
}
