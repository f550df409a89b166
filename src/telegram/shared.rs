/*
 *  telegram/shared.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Reference-counted client sharing keyed by credentials
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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use log::info;

use super::client::{BotApi, TelegramClient};
use crate::config::TelegramAuthConfig;
use crate::error::WidgetResult;

struct Entry {
    client: Arc<TelegramClient>,
    refs: usize,
}

/// One connected client per credential set. Tiles that share a token share
/// the connection; the last release disconnects it.
#[derive(Default)]
pub struct SharedClients {
    entries: Mutex<HashMap<TelegramAuthConfig, Entry>>,
}

impl SharedClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, auth: &TelegramAuthConfig, reconnect: Duration) -> WidgetResult<Arc<TelegramClient>> {
        self.get_or_create_with(auth, || {
            let api = BotApi::new(auth)?;
            Ok(Arc::new(TelegramClient::new(Arc::new(api), reconnect)))
        })
    }

    /// Like [`get_or_create`](Self::get_or_create) with a caller-supplied
    /// constructor, invoked only when no client exists for `auth`.
    pub fn get_or_create_with<F>(&self, auth: &TelegramAuthConfig, make: F) -> WidgetResult<Arc<TelegramClient>>
    where
        F: FnOnce() -> WidgetResult<Arc<TelegramClient>>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = entries.get_mut(auth) {
            e.refs += 1;
            return Ok(Arc::clone(&e.client));
        }
        let client = make()?;
        client.connect()?;
        info!("telegram client created ({} active)", entries.len() + 1);
        entries.insert(auth.clone(), Entry { client: Arc::clone(&client), refs: 1 });
        Ok(client)
    }

    pub fn release(&self, auth: &TelegramAuthConfig) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let drop_it = match entries.get_mut(auth) {
            Some(e) => {
                e.refs = e.refs.saturating_sub(1);
                e.refs == 0
            }
            None => false,
        };
        if drop_it {
            if let Some(e) = entries.remove(auth) {
                e.client.disconnect();
                info!("telegram client released ({} active)", entries.len());
            }
        }
    }

    pub fn refcount(&self, auth: &TelegramAuthConfig) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(auth).map_or(0, |e| e.refs)
    }
}

static SHARED: OnceLock<SharedClients> = OnceLock::new();

pub fn shared_clients() -> &'static SharedClients {
    SHARED.get_or_init(SharedClients::new)
}
