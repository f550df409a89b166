/*
 *  widgets/telegram_counter.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unread Telegram message counter
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


use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::warn;

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{TelegramAuthConfig, TextConfig, WidgetConfig};
use crate::constants::TELEGRAM_ERROR_WRAP;
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::{draw_status_lines, draw_text_aligned, load_font_or_default, FontFace};
use crate::metric_renderer::format_value;
use crate::telegram::{shared_clients, Message, SharedClients, TelegramClient, TelegramListener};
use crate::widget::{read_state, write_state, BaseWidget, Stoppable, Widget};
use crate::wordwrap::wrap_chars_count;

#[derive(Default)]
struct UnreadTally(AtomicUsize);

impl TelegramListener for UnreadTally {
    fn on_message(&self, _msg: &Message) {}

    fn on_error(&self, _err: &WidgetError) {}

    fn on_unread_count(&self, count: usize) {
        self.0.store(count, Ordering::SeqCst);
    }
}

struct Attachment {
    clients: &'static SharedClients,
    client: Arc<TelegramClient>,
    listener: u64,
}

pub struct TelegramCounterWidget {
    base: BaseWidget,
    text: TextConfig,
    face: FontFace,
    color: u8,
    auth: TelegramAuthConfig,
    tally: Arc<UnreadTally>,
    attachment: Result<Attachment, WidgetError>,
    released: AtomicBool,
    shown: RwLock<Option<usize>>,
}

impl TelegramCounterWidget {
    pub fn with_client(
        cfg: &WidgetConfig,
        clients: &'static SharedClients,
        client: WidgetResult<Arc<TelegramClient>>,
    ) -> Self {
        let tally = Arc::new(UnreadTally::default());
        let attachment = client.map(|client| {
            tally.0.store(client.unread_count(), Ordering::SeqCst);
            let listener = client.add_listener(tally.clone());
            Attachment { clients, client, listener }
        });
        if let Err(e) = &attachment {
            warn!("telegram counter {}: {}", cfg.id, e);
        }
        Self {
            base: BaseWidget::from_config(cfg),
            face: load_font_or_default(&cfg.text.font, cfg.text.size),
            text: cfg.text.clone(),
            color: luma_or(cfg.colors.text, 255),
            auth: cfg.telegram.auth.clone(),
            tally,
            attachment,
            released: AtomicBool::new(false),
            shown: RwLock::new(None),
        }
    }

    pub fn update_at(&self, now: Instant) -> WidgetResult<()> {
        if let Err(e) = &self.attachment {
            return Err(e.clone());
        }
        let count = self.tally.0.load(Ordering::SeqCst);
        let mut shown = write_state(&self.shown);
        if shown.is_some_and(|prev| count > prev) {
            self.base.trigger_at(now);
        }
        *shown = Some(count);
        Ok(())
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    let reconnect = Duration::from_secs_f64(cfg.telegram.reconnect_interval.max(0.1));
    let client = shared_clients().get_or_create(&cfg.telegram.auth, reconnect);
    Ok(Arc::new(TelegramCounterWidget::with_client(cfg, shared_clients(), client)))
}

impl Widget for TelegramCounterWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        self.update_at(Instant::now())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        match &self.attachment {
            Err(e) => {
                draw_status_lines(&mut img, &wrap_chars_count(&e.to_string(), TELEGRAM_ERROR_WRAP), self.color)
            }
            Ok(_) => {
                let count = read_state(&self.shown).unwrap_or(0);
                let label = format_value(&self.text.format, count as f64);
                let align = self.text.align;
                let area = self.base.content_area();
                draw_text_aligned(&mut img, &self.face, &label, area, align.h, align.v, 0, self.color);
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }
}

impl Stoppable for TelegramCounterWidget {
    fn stop(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(a) = &self.attachment {
            a.client.remove_listener(a.listener);
            a.clients.release(&self.auth);
        }
    }
}
