//! Bot API operation descriptors and argument validation.

use serde_json::Value;

/// Keyword arguments of one API call, keyed by Bot API parameter name.
pub type Arguments = serde_json::Map<String, Value>;

/// An outbound Bot API operation: its name and the parameters it accepts.
///
/// Descriptors are defined statically and looked up with [`Method::by_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    /// Snake-case operation name, e.g. `send_message`.
    pub name: &'static str,

    /// Accepted parameter names, required ones first.
    pub parameters: &'static [&'static str],
}

impl Method {
    /// Creates a descriptor.
    pub const fn new(name: &'static str, parameters: &'static [&'static str]) -> Self {
        Self { name, parameters }
    }

    /// Looks up a known operation by its snake-case name.
    ///
    /// # Examples
    ///
    /// ```
    /// use meetg::Method;
    ///
    /// let method = Method::by_name("send_message").unwrap();
    /// assert!(method.accepts("chat_id"));
    /// assert!(Method::by_name("launch_rocket").is_none());
    /// ```
    pub fn by_name(name: &str) -> Option<&'static Method> {
        METHODS.iter().find(|method| method.name == name)
    }

    /// Returns `true` if the operation accepts the parameter.
    pub fn accepts(&self, parameter: &str) -> bool {
        self.parameters.contains(&parameter)
    }

    /// Keeps only the arguments this operation accepts.
    ///
    /// Every rejected key is logged as a warning; the call goes ahead without it.
    ///
    /// # Examples
    ///
    /// ```
    /// use meetg::method::{Arguments, DELETE_MESSAGE};
    /// use serde_json::json;
    ///
    /// let mut args = Arguments::new();
    /// args.insert("chat_id".into(), json!(1));
    /// args.insert("message_id".into(), json!(2));
    /// args.insert("text".into(), json!("ignored"));
    ///
    /// let validated = DELETE_MESSAGE.validate(&args);
    /// assert_eq!(validated.len(), 2);
    /// assert!(!validated.contains_key("text"));
    /// ```
    pub fn validate(&self, args: &Arguments) -> Arguments {
        let mut validated = Arguments::new();
        for (key, value) in args {
            if self.accepts(key) {
                validated.insert(key.clone(), value.clone());
            } else {
                tracing::warn!(method = self.name, arg = %key, "Method doesn't accept arg");
            }
        }
        validated
    }

    /// Returns the Bot API endpoint name (`send_message` -> `sendMessage`).
    pub fn endpoint(&self) -> String {
        endpoint_name(self.name)
    }
}

/// Converts a snake-case operation name to the Bot API's camel case.
pub fn endpoint_name(name: &str) -> String {
    let mut endpoint = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            endpoint.extend(c.to_uppercase());
            upper = false;
        } else {
            endpoint.push(c);
        }
    }
    endpoint
}

pub const SEND_MESSAGE: Method = Method::new(
    "send_message",
    &[
        // required
        "chat_id",
        "text",
        // optional
        "parse_mode",
        "entities",
        "disable_web_page_preview",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const EDIT_MESSAGE_TEXT: Method = Method::new(
    "edit_message_text",
    &[
        "text",
        "chat_id",
        "message_id",
        "inline_message_id",
        "parse_mode",
        "entities",
        "disable_web_page_preview",
        "reply_markup",
    ],
);

pub const DELETE_MESSAGE: Method = Method::new("delete_message", &["chat_id", "message_id"]);

pub const FORWARD_MESSAGE: Method = Method::new(
    "forward_message",
    &[
        "chat_id",
        "from_chat_id",
        "message_id",
        "disable_notification",
    ],
);

pub const SEND_PHOTO: Method = Method::new(
    "send_photo",
    &[
        "chat_id",
        "photo",
        "caption",
        "parse_mode",
        "caption_entities",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_DOCUMENT: Method = Method::new(
    "send_document",
    &[
        "chat_id",
        "document",
        "thumb",
        "caption",
        "parse_mode",
        "caption_entities",
        "disable_content_type_detection",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_ANIMATION: Method = Method::new(
    "send_animation",
    &[
        "chat_id",
        "animation",
        "duration",
        "width",
        "height",
        "thumb",
        "caption",
        "parse_mode",
        "caption_entities",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_AUDIO: Method = Method::new(
    "send_audio",
    &[
        "chat_id",
        "audio",
        "caption",
        "parse_mode",
        "caption_entities",
        "duration",
        "performer",
        "title",
        "thumb",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_VIDEO: Method = Method::new(
    "send_video",
    &[
        "chat_id",
        "video",
        "duration",
        "width",
        "height",
        "thumb",
        "caption",
        "parse_mode",
        "caption_entities",
        "supports_streaming",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_STICKER: Method = Method::new(
    "send_sticker",
    &[
        "chat_id",
        "sticker",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_CONTACT: Method = Method::new(
    "send_contact",
    &[
        "chat_id",
        "phone_number",
        "first_name",
        "last_name",
        "vcard",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const SEND_LOCATION: Method = Method::new(
    "send_location",
    &[
        "chat_id",
        "latitude",
        "longitude",
        "horizontal_accuracy",
        "live_period",
        "heading",
        "proximity_alert_radius",
        "disable_notification",
        "reply_to_message_id",
        "allow_sending_without_reply",
        "reply_markup",
    ],
);

pub const GET_ME: Method = Method::new("get_me", &[]);

pub const GET_UPDATES: Method = Method::new(
    "get_updates",
    &["offset", "limit", "timeout", "allowed_updates"],
);

/// Every operation the framework knows about.
pub static METHODS: [Method; 14] = [
    SEND_MESSAGE,
    SEND_PHOTO,
    SEND_DOCUMENT,
    SEND_ANIMATION,
    EDIT_MESSAGE_TEXT,
    DELETE_MESSAGE,
    FORWARD_MESSAGE,
    SEND_STICKER,
    SEND_AUDIO,
    SEND_VIDEO,
    SEND_CONTACT,
    SEND_LOCATION,
    GET_ME,
    GET_UPDATES,
];
