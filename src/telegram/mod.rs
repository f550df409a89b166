/*
 *  telegram/mod.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Telegram notification streaming
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

//! Shared Bot-API client with reference-counted ownership, a reconnecting
//! connection manager, and the small animation helpers the notification tile
//! composes (blink, transitions, header formatting).

pub mod blink;
pub mod client;
pub mod connection;
pub mod format;
pub mod shared;
pub mod transition;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WidgetError;

pub use blink::BlinkAnimator;
pub use client::{BotApi, TelegramClient, Transport, Update};
pub use connection::ConnectionManager;
pub use format::format_header;
pub use shared::{shared_clients, SharedClients};
pub use transition::Transition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Private,
    #[serde(alias = "supergroup")]
    Group,
    Channel,
}

impl ChatType {
    pub fn parse(s: &str) -> Self {
        match s {
            "group" | "supergroup" => ChatType::Group,
            "channel" => ChatType::Channel,
            _ => ChatType::Private,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChatType::Private => "private",
            ChatType::Group => "group",
            ChatType::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlinkMode {
    #[default]
    Never,
    Always,
    OnNew,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    None,
    Fade,
    SlideLeft,
    SlideUp,
    Wipe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub chat_type: ChatType,
    pub chat_title: String,
    pub sender_id: i64,
    pub sender_name: Option<String>,
    pub text: String,
    pub media_type: Option<String>,
    pub forwarded_from: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_forwarded: bool,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: 0,
            chat_id: 0,
            chat_type: ChatType::Private,
            chat_title: String::new(),
            sender_id: 0,
            sender_name: None,
            text: String::new(),
            media_type: None,
            forwarded_from: None,
            timestamp: DateTime::<Utc>::default(),
            is_forwarded: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

/// Callbacks from the shared client. Invoked on the connection task, so
/// implementations only publish into their own state.
pub trait TelegramListener: Send + Sync {
    fn on_message(&self, msg: &Message);
    fn on_error(&self, err: &WidgetError);
    fn on_unread_count(&self, count: usize);
}
