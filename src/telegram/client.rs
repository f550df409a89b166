/*
 *  telegram/client.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bot API transport and the shared client core
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

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::watch;

use super::connection::ConnectionManager;
use super::{ChatType, ConnectionStatus, Message, TelegramListener};
use crate::config::TelegramAuthConfig;
use crate::constants::{TELEGRAM_API_BASE, TELEGRAM_LONG_POLL, TELEGRAM_RECONNECT_MAX};
use crate::error::{WidgetError, WidgetResult};
use crate::BoxFuture;

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// Wire access to the bot service; mocked in tests.
pub trait Transport: Send + Sync {
    /// Validate credentials, returning the bot's display name.
    fn get_me<'a>(&'a self) -> BoxFuture<'a, WidgetResult<String>>;
    fn get_updates<'a>(&'a self, offset: Option<i64>, timeout: Duration) -> BoxFuture<'a, WidgetResult<Vec<Update>>>;
}

const MEDIA_KINDS: [&str; 11] = [
    "photo", "video", "audio", "voice", "document", "sticker", "animation", "video_note", "location", "contact", "poll",
];

fn full_name(user: &Value) -> Option<String> {
    let first = user.get("first_name").and_then(Value::as_str).unwrap_or_default();
    let last = user.get("last_name").and_then(Value::as_str).unwrap_or_default();
    let name = format!("{first} {last}").trim().to_string();
    if !name.is_empty() {
        return Some(name);
    }
    user.get("username").and_then(Value::as_str).map(str::to_string)
}

/// Map one Bot API message object.
pub fn parse_message(m: &Value) -> WidgetResult<Message> {
    let chat = m.get("chat").ok_or_else(|| WidgetError::Decode("message without chat".into()))?;
    let chat_type = ChatType::parse(chat.get("type").and_then(Value::as_str).unwrap_or("private"));
    let chat_title = chat
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| full_name(chat))
        .unwrap_or_default();
    let from = m.get("from");
    let media_type = MEDIA_KINDS.iter().find(|k| m.get(**k).is_some()).map(|k| k.to_string());
    let text = m
        .get("text")
        .or_else(|| m.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let forwarded_from = m
        .get("forward_origin")
        .and_then(|o| {
            o.get("sender_user")
                .and_then(full_name)
                .or_else(|| o.get("sender_user_name").and_then(Value::as_str).map(str::to_string))
                .or_else(|| o.get("chat").and_then(|c| c.get("title")).and_then(Value::as_str).map(str::to_string))
        })
        .or_else(|| m.get("forward_from").and_then(full_name))
        .or_else(|| m.get("forward_sender_name").and_then(Value::as_str).map(str::to_string));
    let is_forwarded = forwarded_from.is_some() || m.get("forward_origin").is_some() || m.get("forward_date").is_some();
    let date = m.get("date").and_then(Value::as_i64).unwrap_or_default();

    Ok(Message {
        id: m.get("message_id").and_then(Value::as_i64).unwrap_or_default(),
        chat_id: chat.get("id").and_then(Value::as_i64).unwrap_or_default(),
        chat_type,
        chat_title,
        sender_id: from.and_then(|f| f.get("id")).and_then(Value::as_i64).unwrap_or_default(),
        sender_name: from.and_then(full_name),
        text,
        media_type,
        forwarded_from,
        timestamp: DateTime::<Utc>::from_timestamp(date, 0).unwrap_or_default(),
        is_forwarded,
    })
}

/// Decode a `getUpdates` response body.
pub fn parse_updates(body: &str) -> WidgetResult<Vec<Update>> {
    let json: Value = serde_json::from_str(body)?;
    if json.get("ok").and_then(Value::as_bool) != Some(true) {
        let why = json.get("description").and_then(Value::as_str).unwrap_or("request rejected");
        return Err(WidgetError::Connection(why.to_string()));
    }
    let result = json
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| WidgetError::Decode("getUpdates without result".into()))?;
    result
        .iter()
        .map(|u| {
            let update_id = u
                .get("update_id")
                .and_then(Value::as_i64)
                .ok_or_else(|| WidgetError::Decode("update without id".into()))?;
            let message = match u.get("message").or_else(|| u.get("channel_post")) {
                Some(m) => Some(parse_message(m)?),
                None => None,
            };
            Ok(Update { update_id, message })
        })
        .collect()
}

/// reqwest-backed Bot API transport.
pub struct BotApi {
    client: Client,
    base: String,
}

impl BotApi {
    pub fn new(auth: &TelegramAuthConfig) -> WidgetResult<Self> {
        if auth.token.trim().is_empty() {
            return Err(WidgetError::Config("telegram token is empty".into()));
        }
        let api = auth.api_base.as_deref().unwrap_or(TELEGRAM_API_BASE).trim_end_matches('/');
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(TELEGRAM_LONG_POLL + Duration::from_secs(10))
            .build()
            .map_err(|e| WidgetError::NotInitialized(e.to_string()))?;
        Ok(Self { client, base: format!("{api}/bot{}", auth.token) })
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> WidgetResult<String> {
        let resp = self.client.get(format!("{}/{method}", self.base)).query(params).send().await?;
        Ok(resp.text().await?)
    }
}

impl Transport for BotApi {
    fn get_me<'a>(&'a self) -> BoxFuture<'a, WidgetResult<String>> {
        Box::pin(async move {
            let body = self.call("getMe", &[]).await?;
            let json: Value = serde_json::from_str(&body)?;
            if json.get("ok").and_then(Value::as_bool) != Some(true) {
                let why = json.get("description").and_then(Value::as_str).unwrap_or("unauthorized");
                return Err(WidgetError::Connection(why.to_string()));
            }
            Ok(json
                .get("result")
                .and_then(|r| r.get("username"))
                .and_then(Value::as_str)
                .unwrap_or("bot")
                .to_string())
        })
    }

    fn get_updates<'a>(&'a self, offset: Option<i64>, timeout: Duration) -> BoxFuture<'a, WidgetResult<Vec<Update>>> {
        Box::pin(async move {
            let mut params = vec![("timeout", timeout.as_secs().to_string())];
            if let Some(o) = offset {
                params.push(("offset", o.to_string()));
            }
            parse_updates(&self.call("getUpdates", &params).await?)
        })
    }
}

/// Listener fan-out, unread counter and status channel, shared with the
/// connection task.
pub struct ClientCore {
    listeners: Mutex<Vec<(u64, Arc<dyn TelegramListener>)>>,
    next_id: AtomicU64,
    unread: AtomicUsize,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ClientCore {
    fn new() -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            unread: AtomicUsize::new(0),
            status_tx,
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn TelegramListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    pub fn dispatch_message(&self, msg: &Message) {
        let count = self.unread.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("telegram message {} in chat {}", msg.id, msg.chat_id);
        for l in self.snapshot() {
            l.on_message(msg);
            l.on_unread_count(count);
        }
    }

    pub fn dispatch_error(&self, err: &WidgetError) {
        for l in self.snapshot() {
            l.on_error(err);
        }
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|cur| {
            if *cur != status {
                *cur = status;
                true
            } else {
                false
            }
        });
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }
}

/// One bot session shared by every widget using the same credentials.
pub struct TelegramClient {
    core: Arc<ClientCore>,
    transport: Arc<dyn Transport>,
    reconnect: Duration,
    manager: Mutex<Option<ConnectionManager>>,
}

impl TelegramClient {
    pub fn new(transport: Arc<dyn Transport>, reconnect: Duration) -> Self {
        Self {
            core: Arc::new(ClientCore::new()),
            transport,
            reconnect,
            manager: Mutex::new(None),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TelegramListener>) -> u64 {
        let id = self.core.next_id.fetch_add(1, Ordering::Relaxed);
        self.core.listeners.lock().unwrap_or_else(PoisonError::into_inner).push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.core.listeners.lock().unwrap_or_else(PoisonError::into_inner).retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn unread_count(&self) -> usize {
        self.core.unread.load(Ordering::SeqCst)
    }

    /// One message was shown; tell counter widgets.
    pub fn mark_read(&self) {
        let prev = self
            .core
            .unread
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        let count = prev.saturating_sub(1);
        for l in self.core.snapshot() {
            l.on_unread_count(count);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.core.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.core.status_tx.subscribe()
    }

    pub fn core(&self) -> &Arc<ClientCore> {
        &self.core
    }

    pub fn is_connected(&self) -> bool {
        self.manager.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Start the connection task if it is not running. Needs a tokio runtime.
    pub fn connect(&self) -> WidgetResult<()> {
        let mut guard = self.manager.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(());
        }
        let mgr = ConnectionManager::start(
            Arc::clone(&self.transport),
            Arc::clone(&self.core),
            self.reconnect,
            TELEGRAM_RECONNECT_MAX,
        )?;
        info!("telegram client connecting");
        *guard = Some(mgr);
        Ok(())
    }

    pub fn disconnect(&self) {
        let mgr = self.manager.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(m) = mgr {
            m.stop();
            self.core.set_status(ConnectionStatus::Disconnected);
            info!("telegram client disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATES: &str = r#"{"ok":true,"result":[
        {"update_id":10,"message":{"message_id":5,"from":{"id":9,"first_name":"Alice"},"chat":{"id":-100,"type":"supergroup","title":"Team"},"date":1700000000,"text":"hi"}},
        {"update_id":11,"message":{"message_id":6,"from":{"id":8,"first_name":"Bob","last_name":"Ray"},"chat":{"id":8,"type":"private","first_name":"Bob","last_name":"Ray"},"date":1700000060,"photo":[{"file_id":"x"}],"caption":"look","forward_origin":{"type":"user","sender_user":{"id":3,"first_name":"Carol"}}}},
        {"update_id":12,"edited_message":{}}
    ]}"#;

    #[test]
    fn test_parse_updates() {
        let u = parse_updates(UPDATES).unwrap();
        assert_eq!(u.len(), 3);
        let a = u[0].message.as_ref().unwrap();
        assert_eq!(a.chat_type, ChatType::Group);
        assert_eq!(a.chat_title, "Team");
        assert_eq!(a.sender_name.as_deref(), Some("Alice"));
        let b = u[1].message.as_ref().unwrap();
        assert_eq!(b.chat_title, "Bob Ray");
        assert_eq!(b.media_type.as_deref(), Some("photo"));
        assert_eq!(b.text, "look");
        assert!(b.is_forwarded);
        assert_eq!(b.forwarded_from.as_deref(), Some("Carol"));
        assert!(u[2].message.is_none());
    }

    #[test]
    fn test_rejected_response() {
        let r = parse_updates(r#"{"ok":false,"description":"Unauthorized"}"#);
        assert_eq!(r, Err(WidgetError::Connection("Unauthorized".into())));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(BotApi::new(&TelegramAuthConfig::default()), Err(WidgetError::Config(_))));
    }

    struct Counting(Mutex<Vec<usize>>);

    impl TelegramListener for Counting {
        fn on_message(&self, _msg: &Message) {}
        fn on_error(&self, _err: &WidgetError) {}
        fn on_unread_count(&self, count: usize) {
            self.0.lock().unwrap().push(count);
        }
    }

    struct Idle;

    impl Transport for Idle {
        fn get_me<'a>(&'a self) -> BoxFuture<'a, WidgetResult<String>> {
            Box::pin(async { Ok("idle".to_string()) })
        }
        fn get_updates<'a>(&'a self, _o: Option<i64>, _t: Duration) -> BoxFuture<'a, WidgetResult<Vec<Update>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[test]
    fn test_unread_counting() {
        let client = TelegramClient::new(Arc::new(Idle), Duration::from_secs(1));
        let l = Arc::new(Counting(Mutex::new(Vec::new())));
        let id = client.add_listener(l.clone());
        client.core().dispatch_message(&Message::default());
        client.core().dispatch_message(&Message::default());
        client.mark_read();
        client.mark_read();
        client.mark_read();
        assert_eq!(*l.0.lock().unwrap(), vec![1, 2, 1, 0, 0]);
        client.remove_listener(id);
        assert_eq!(client.listener_count(), 0);
    }
}
