//! Typed calls to the Bot API.
//!
//! [`Api`] builds the raw arguments of the common operations from a few
//! ergonomic inputs and runs them through the retrying [`Caller`]. Every call
//! returns the [`CallOutcome`]; a successful call also logs one line about
//! what was done.

use crate::{
    method::{self, Arguments, Method},
    models::Database,
    CallOutcome, Caller,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Text formatting understood by the Bot API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// HTML tags such as `<b>`.
    Html,
    /// Legacy Markdown.
    Markdown,
    /// Markdown with escaping rules.
    MarkdownV2,
}

impl ParseMode {
    /// Returns the value the Bot API expects in `parse_mode`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
            ParseMode::Markdown => "Markdown",
            ParseMode::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// Options shared by the sending calls.
///
/// # Examples
///
/// ```
/// use meetg::api::{ParseMode, SendOptions};
///
/// let options = SendOptions {
///     reply_to: Some(10),
///     parse_mode: Some(ParseMode::Html),
///     ..SendOptions::default()
/// };
/// assert!(options.notify);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SendOptions {
    /// Message to reply to.
    pub reply_to: Option<i64>,
    /// Reply markup, e.g. an inline keyboard.
    pub markup: Option<Value>,
    /// Show link previews.
    pub preview: bool,
    /// Notify the recipients.
    pub notify: bool,
    /// Send even if the replied message is gone.
    pub force: bool,
    /// Text formatting, plain text when `None`.
    pub parse_mode: Option<ParseMode>,
    /// Further raw arguments, validated like the rest.
    pub extra: Arguments,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            reply_to: None,
            markup: None,
            preview: false,
            notify: true,
            force: true,
            parse_mode: None,
            extra: Arguments::new(),
        }
    }
}

impl SendOptions {
    fn apply(&self, args: &mut Arguments) {
        if let Some(reply_to) = self.reply_to {
            args.insert("reply_to_message_id".into(), json!(reply_to));
        }
        if let Some(markup) = &self.markup {
            args.insert("reply_markup".into(), markup.clone());
        }
        if let Some(parse_mode) = self.parse_mode {
            args.insert("parse_mode".into(), json!(parse_mode.as_str()));
        }
        args.insert("disable_notification".into(), json!(!self.notify));
        args.insert("allow_sending_without_reply".into(), json!(self.force));
        for (key, value) in &self.extra {
            args.insert(key.clone(), value.clone());
        }
    }
}

/// Typed Bot API calls on top of a [`Caller`].
#[derive(Clone)]
pub struct Api {
    caller: Caller,
    db: Option<Arc<Database>>,
}

impl Api {
    /// Creates an API without a database, so kicked chats are not recorded.
    pub fn new(caller: Caller) -> Self {
        Self { caller, db: None }
    }

    /// Lets failed sends update the chat records in `db`.
    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    /// Returns the underlying caller.
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Calls `method` with raw arguments and logs the call when it succeeds.
    pub async fn call(&self, method: &Method, args: &Arguments) -> CallOutcome {
        let args = method.validate(args);
        let outcome = self.caller.call_validated(method, args.clone()).await;
        if outcome.succeeded {
            log_call(method, &args);
        }
        outcome
    }

    /// Sends a text message.
    ///
    /// When the bot turns out to be removed from the chat, the chat record is
    /// marked with `_kicked_at`.
    pub async fn send_message(&self, chat_id: i64, text: &str, options: &SendOptions) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("text".into(), json!(text));
        args.insert("disable_web_page_preview".into(), json!(!options.preview));
        options.apply(&mut args);

        let outcome = self.call(&method::SEND_MESSAGE, &args).await;
        if outcome.bot_removed() {
            self.mark_kicked(chat_id).await;
        }
        outcome
    }

    /// Replaces the text of a sent message.
    ///
    /// Only `preview`, `parse_mode`, `markup` and `extra` are taken from `options`.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        options: &SendOptions,
    ) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("message_id".into(), json!(message_id));
        args.insert("text".into(), json!(text));
        args.insert("disable_web_page_preview".into(), json!(!options.preview));
        if let Some(parse_mode) = options.parse_mode {
            args.insert("parse_mode".into(), json!(parse_mode.as_str()));
        }
        if let Some(markup) = &options.markup {
            args.insert("reply_markup".into(), markup.clone());
        }
        args.extend(options.extra.clone());
        self.call(&method::EDIT_MESSAGE_TEXT, &args).await
    }

    /// Deletes a message.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("message_id".into(), json!(message_id));
        self.call(&method::DELETE_MESSAGE, &args).await
    }

    /// Forwards a message from `from_chat_id` to `chat_id`.
    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
        notify: bool,
    ) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("from_chat_id".into(), json!(from_chat_id));
        args.insert("message_id".into(), json!(message_id));
        args.insert("disable_notification".into(), json!(!notify));
        self.call(&method::FORWARD_MESSAGE, &args).await
    }

    /// Sends a photo by file id or URL.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo: &str,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> CallOutcome {
        self.send_media(&method::SEND_PHOTO, "photo", chat_id, photo, caption, options)
            .await
    }

    /// Sends a general file by file id or URL.
    pub async fn send_document(
        &self,
        chat_id: i64,
        document: &str,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> CallOutcome {
        self.send_media(&method::SEND_DOCUMENT, "document", chat_id, document, caption, options)
            .await
    }

    /// Sends a GIF or silent video.
    pub async fn send_animation(
        &self,
        chat_id: i64,
        animation: &str,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> CallOutcome {
        self.send_media(&method::SEND_ANIMATION, "animation", chat_id, animation, caption, options)
            .await
    }

    /// Sends an audio file.
    pub async fn send_audio(
        &self,
        chat_id: i64,
        audio: &str,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> CallOutcome {
        self.send_media(&method::SEND_AUDIO, "audio", chat_id, audio, caption, options)
            .await
    }

    /// Sends a video.
    pub async fn send_video(
        &self,
        chat_id: i64,
        video: &str,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> CallOutcome {
        self.send_media(&method::SEND_VIDEO, "video", chat_id, video, caption, options)
            .await
    }

    /// Sends a sticker by file id or URL.
    pub async fn send_sticker(&self, chat_id: i64, sticker: &str, options: &SendOptions) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("sticker".into(), json!(sticker));
        options.apply(&mut args);
        self.call(&method::SEND_STICKER, &args).await
    }

    /// Sends a phone contact.
    pub async fn send_contact(
        &self,
        chat_id: i64,
        phone_number: &str,
        first_name: &str,
        options: &SendOptions,
    ) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("phone_number".into(), json!(phone_number));
        args.insert("first_name".into(), json!(first_name));
        options.apply(&mut args);
        self.call(&method::SEND_CONTACT, &args).await
    }

    /// Sends a point on the map.
    pub async fn send_location(
        &self,
        chat_id: i64,
        latitude: f64,
        longitude: f64,
        options: &SendOptions,
    ) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert("latitude".into(), json!(latitude));
        args.insert("longitude".into(), json!(longitude));
        options.apply(&mut args);
        self.call(&method::SEND_LOCATION, &args).await
    }

    /// Fetches the bot's own user.
    pub async fn get_me(&self) -> CallOutcome {
        self.call(&method::GET_ME, &Arguments::new()).await
    }

    /// Long-polls for updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> CallOutcome {
        let mut args = Arguments::new();
        if let Some(offset) = offset {
            args.insert("offset".into(), json!(offset));
        }
        args.insert("timeout".into(), json!(timeout.as_secs()));
        self.call(&method::GET_UPDATES, &args).await
    }

    async fn send_media(
        &self,
        method: &Method,
        field: &str,
        chat_id: i64,
        media: &str,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> CallOutcome {
        let mut args = chat_args(chat_id);
        args.insert(field.to_string(), json!(media));
        if let Some(caption) = caption {
            args.insert("caption".into(), json!(caption));
        }
        options.apply(&mut args);
        self.call(method, &args).await
    }

    async fn mark_kicked(&self, chat_id: i64) {
        let Some(db) = &self.db else {
            return;
        };
        if let Err(e) = db.chat.mark_kicked(chat_id).await {
            tracing::warn!(chat_id, error = %e, "Could not mark chat as kicked");
        }
    }
}

fn chat_args(chat_id: i64) -> Arguments {
    let mut args = Arguments::new();
    args.insert("chat_id".into(), json!(chat_id));
    args
}

fn log_call(method: &Method, args: &Arguments) {
    let chat_id = args.get("chat_id").cloned().unwrap_or(Value::Null);
    let message_id = args.get("message_id").cloned().unwrap_or(Value::Null);
    match method.name {
        "send_message" => {
            let text_length = args
                .get("text")
                .and_then(Value::as_str)
                .map_or(0, |text| text.chars().count());
            tracing::info!(chat_id = %chat_id, text_length, "Sent message");
        }
        "edit_message_text" => {
            tracing::info!(chat_id = %chat_id, message_id = %message_id, "Edited message")
        }
        "delete_message" => {
            tracing::info!(chat_id = %chat_id, message_id = %message_id, "Deleted message")
        }
        "forward_message" => {
            let from_chat_id = args.get("from_chat_id").cloned().unwrap_or(Value::Null);
            tracing::info!(
                chat_id = %chat_id, from_chat_id = %from_chat_id, message_id = %message_id,
                "Forwarded message"
            );
        }
        "send_contact" => {
            let phone_number = args.get("phone_number").cloned().unwrap_or(Value::Null);
            tracing::info!(chat_id = %chat_id, phone_number = %phone_number, "Sent contact");
        }
        "send_location" => {
            let latitude = args.get("latitude").cloned().unwrap_or(Value::Null);
            let longitude = args.get("longitude").cloned().unwrap_or(Value::Null);
            tracing::info!(
                chat_id = %chat_id, latitude = %latitude, longitude = %longitude,
                "Sent location"
            );
        }
        "get_me" | "get_updates" => tracing::debug!(method = method.name, "Called"),
        name => tracing::info!(chat_id = %chat_id, method = name, "Sent"),
    }
}
