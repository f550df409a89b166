/*
 *  telegram/format.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Header tokens and message body text
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::TimeZone;

use super::{ChatType, Message};

pub const NEW_MESSAGE_NOTICE: &str = "You have a new message";

/// Sender, then the chat title for private chats, then `User <id>`.
pub fn sender_label(msg: &Message) -> String {
    if let Some(name) = msg.sender_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    if msg.chat_type == ChatType::Private && !msg.chat_title.trim().is_empty() {
        return msg.chat_title.clone();
    }
    format!("User {}", msg.sender_id)
}

/// Expand `{sender}` `{chat}` `{type}` `{time}` `{date}` `{forwarded}` in `tz`.
pub fn format_header<Tz: TimeZone>(format: &str, msg: &Message, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = msg.timestamp.with_timezone(tz);
    let forwarded = match (&msg.forwarded_from, msg.is_forwarded) {
        (Some(from), _) => format!("Fwd: {from}"),
        (None, true) => "Fwd".to_string(),
        (None, false) => String::new(),
    };
    format
        .replace("{sender}", &sender_label(msg))
        .replace("{chat}", &msg.chat_title)
        .replace("{type}", msg.chat_type.as_str())
        .replace("{time}", &local.format("%H:%M").to_string())
        .replace("{date}", &local.format("%b %-d").to_string())
        .replace("{forwarded}", &forwarded)
        .trim()
        .to_string()
}

/// Body text: `[media]` plus caption for media, the fixed notice when the
/// message area is disabled.
pub fn message_body(msg: &Message, show_message: bool) -> String {
    if !show_message {
        return NEW_MESSAGE_NOTICE.to_string();
    }
    match &msg.media_type {
        Some(media) if msg.text.is_empty() => format!("[{media}]"),
        Some(media) => format!("[{media}]\n{}", msg.text),
        None => msg.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg() -> Message {
        Message {
            id: 1,
            chat_id: -5,
            chat_type: ChatType::Group,
            chat_title: "Team".into(),
            sender_id: 77,
            sender_name: Some("Alice".into()),
            text: "hello".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 9, 13, 7, 0).unwrap(),
            ..Message::default()
        }
    }

    #[test]
    fn test_tokens() {
        assert_eq!(format_header("{sender} ({chat}) {time}", &msg(), &Utc), "Alice (Team) 13:07");
        assert_eq!(format_header("{date} {type}", &msg(), &Utc), "Mar 9 group");
    }

    #[test]
    fn test_sender_fallbacks() {
        let mut m = msg();
        m.sender_name = None;
        assert_eq!(sender_label(&m), "User 77");
        m.chat_type = ChatType::Private;
        m.chat_title = "Bob".into();
        assert_eq!(sender_label(&m), "Bob");
    }

    #[test]
    fn test_forwarded_token() {
        let mut m = msg();
        m.is_forwarded = true;
        m.forwarded_from = Some("Carol".into());
        assert_eq!(format_header("{forwarded}", &m, &Utc), "Fwd: Carol");
        assert_eq!(format_header("{sender} {forwarded}", &msg(), &Utc), "Alice");
    }

    #[test]
    fn test_body() {
        let mut m = msg();
        assert_eq!(message_body(&m, false), NEW_MESSAGE_NOTICE);
        m.media_type = Some("photo".into());
        assert_eq!(message_body(&m, true), "[photo]\nhello");
        m.text.clear();
        assert_eq!(message_body(&m, true), "[photo]");
    }
}
