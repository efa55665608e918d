//! Local detection of message entities.
//!
//! The Telegram server fills in `entities` for real messages. Simulated
//! messages get them from [`parse_entities`], so handlers that look at commands
//! or mentions behave the same in tests.

use crate::types::{EntityKind, MessageEntity};
use regex::Regex;
use std::sync::LazyLock;

static PATTERNS: LazyLock<Vec<(EntityKind, Regex)>> = LazyLock::new(|| {
    [
        (EntityKind::Email, r"()(?P<entity>[\w.-]+@[\w.-]+\.\w+)"),
        (EntityKind::BotCommand, r"(^|\s)(?P<entity>/\w+)"),
        // TODO: accept hashtags made of non-latin letters only
        (EntityKind::Hashtag, r"()(?P<entity>#\w*[a-zA-Z]\w*)"),
        (EntityKind::Mention, r"(^|\s)(?P<entity>@\w+)"),
        (EntityKind::PhoneNumber, r"()(?P<entity>\+\d{11,12})(\D|$)"),
        (
            EntityKind::Url,
            r"(^|\s)(?P<entity>([a-zA-Z]{2,10}://)??[a-zA-Z0-9./?:_=#-]+\.([a-zA-Z]){2,10}([a-zA-Z0-9.&/?:_=#-]*))($|\s)",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| {
        let regex = Regex::new(pattern).unwrap_or_else(|e| panic!("invalid {kind:?} pattern: {e}"));
        (kind, regex)
    })
    .collect()
});

/// Finds emails, commands, hashtags, mentions, phone numbers and URLs in `text`.
///
/// Entities are grouped by kind in the order above; offsets and lengths are
/// UTF-16 code units as in the Bot API.
///
/// # Examples
///
/// ```
/// use meetg::entities::parse_entities;
/// use meetg::types::EntityKind;
///
/// let entities = parse_entities("/start @someone");
/// assert_eq!(entities[0].kind, EntityKind::BotCommand);
/// assert_eq!((entities[0].offset, entities[0].length), (0, 6));
/// assert_eq!(entities[1].kind, EntityKind::Mention);
/// ```
pub fn parse_entities(text: &str) -> Vec<MessageEntity> {
    let mut entities = Vec::new();
    for (kind, regex) in PATTERNS.iter() {
        for captures in regex.captures_iter(text) {
            let Some(entity) = captures.name("entity") else {
                continue;
            };
            if entity.as_str().trim().is_empty() {
                continue;
            }
            let offset = utf16_len(&text[..entity.start()]);
            entities.push(MessageEntity {
                kind: *kind,
                offset,
                length: utf16_len(entity.as_str()),
            });
        }
    }
    entities
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn of_kind(entities: &[MessageEntity], kind: EntityKind) -> Vec<MessageEntity> {
        entities.iter().copied().filter(|e| e.kind == kind).collect()
    }

    #[test]
    fn test_email() {
        let entities = parse_entities("de e@ma.il a4li_1- meeq@uz");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityKind::Email);
        assert_eq!(entities[0].offset, 3);
        assert_eq!(entities[0].length, 7);
    }

    #[test]
    fn test_command() {
        let entities = parse_entities("/de e@ma.il /a4li_1- meeq@uz");
        assert_eq!(entities.len(), 3);

        let commands = of_kind(&entities, EntityKind::BotCommand);
        assert_eq!(commands.len(), 2);
        assert_eq!((commands[0].offset, commands[0].length), (0, 3));
        assert_eq!((commands[1].offset, commands[1].length), (12, 7));
    }

    #[test]
    fn test_hashtag() {
        let entities = parse_entities("#789 #789a");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityKind::Hashtag);
        assert_eq!(entities[0].offset, 5);
        assert_eq!(entities[0].length, 5);
    }

    #[test]
    fn test_mention() {
        let entities = parse_entities("e@ma.il @kakby1");
        let mentions = of_kind(&entities, EntityKind::Mention);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].offset, 8);
        assert_eq!(mentions[0].length, 7);
    }

    #[test]
    fn test_phone_number() {
        let entities = parse_entities("asd +12345678901 +1234567890");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityKind::PhoneNumber);
        assert_eq!(entities[0].offset, 4);
        assert_eq!(entities[0].length, 12);
    }

    #[test]
    fn test_url() {
        let entities = parse_entities("monty https://www.debuggex.com/");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityKind::Url);
        assert_eq!(entities[0].offset, 6);
        assert_eq!(entities[0].length, 25);
    }

    #[test]
    fn test_offsets_are_utf16() {
        let entities = parse_entities("привет /start");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].offset, 7);
        assert_eq!(entities[0].length, 6);
    }
}
