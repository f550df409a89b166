/*
 *  widgets/telegram.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Telegram notification tile
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

//! Shows the latest accepted message from the shared bot client: header,
//! separator and a body that is truncated or scrolled. Message changes run
//! through the configured transition; connection trouble replaces the
//! message area with a status line.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, warn};

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{ScrollAxis, TelegramConfig, TelegramFilters, WidgetConfig};
use crate::constants::{ELLIPSIS, TELEGRAM_ERROR_WRAP};
use crate::draw::{draw_horizontal_line, Rect};
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::{draw_status, draw_status_lines, load_font_or_default, FontFace};
use crate::telegram::format::message_body;
use crate::telegram::{
    format_header, shared_clients, BlinkAnimator, ConnectionStatus, Message, SharedClients, TelegramClient,
    TelegramListener, Transition,
};
use crate::textable::TextScroller;
use crate::widget::{read_state, write_state, BaseWidget, Stoppable, Widget};
use crate::wordwrap::{truncate_with_ellipsis, wrap_chars_count, wrap_text};

/// Chat type, chat id and forwarding filters; empty lists accept all.
pub fn passes_filters(f: &TelegramFilters, msg: &Message) -> bool {
    if !f.chat_types.is_empty() && !f.chat_types.contains(&msg.chat_type) {
        return false;
    }
    if !f.chat_ids.is_empty() && !f.chat_ids.contains(&msg.chat_id) {
        return false;
    }
    !(f.ignore_forwarded && msg.is_forwarded)
}

/// Latest filtered message, handed from the connection task to `update`.
/// Messages replaced before `update` ran are counted so they can be marked
/// read.
struct Inbox {
    filters: TelegramFilters,
    pending: Mutex<Option<Message>>,
    superseded: AtomicUsize,
}

impl Inbox {
    fn new(filters: TelegramFilters) -> Self {
        Self { filters, pending: Mutex::new(None), superseded: AtomicUsize::new(0) }
    }

    /// Newest pending message and how many older ones it replaced.
    fn take(&self) -> (Option<Message>, usize) {
        let msg = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        (msg, self.superseded.swap(0, Ordering::SeqCst))
    }
}

impl TelegramListener for Inbox {
    fn on_message(&self, msg: &Message) {
        if passes_filters(&self.filters, msg) {
            let old = self.pending.lock().unwrap_or_else(PoisonError::into_inner).replace(msg.clone());
            if let Some(old) = old {
                debug!("telegram message {} superseded by {}", old.id, msg.id);
                self.superseded.fetch_add(1, Ordering::SeqCst);
            }
        } else {
            debug!("telegram message {} filtered", msg.id);
        }
    }

    fn on_error(&self, _err: &WidgetError) {}

    fn on_unread_count(&self, _count: usize) {}
}

struct TelegramState {
    status: ConnectionStatus,
    was_connected: bool,
    current: Option<Message>,
    started: Option<Instant>,
    dismissed: Option<i64>,
    h_scroll: TextScroller,
    v_scroll: TextScroller,
    blink: BlinkAnimator,
    transition: Transition,
}

/// Body text after wrapping, plus the extent the scroller runs over.
struct BodyLayout {
    lines: Vec<String>,
    content: u32,
    container: u32,
}

struct Attachment {
    clients: &'static SharedClients,
    client: Arc<TelegramClient>,
    listener: u64,
}

pub struct TelegramWidget {
    base: BaseWidget,
    tg: TelegramConfig,
    face: FontFace,
    color: u8,
    inbox: Arc<Inbox>,
    attachment: Result<Attachment, WidgetError>,
    released: AtomicBool,
    state: RwLock<TelegramState>,
}

impl TelegramWidget {
    /// Attach to (or create) the client for `cfg.telegram.auth` in `clients`.
    pub fn attach(cfg: &WidgetConfig, clients: &'static SharedClients) -> Self {
        let tg = cfg.telegram.clone();
        let reconnect = Duration::from_secs_f64(tg.reconnect_interval.max(0.1));
        let client = clients.get_or_create(&tg.auth, reconnect);
        Self::with_client(cfg, clients, client)
    }

    /// Like [`attach`](Self::attach) with an already acquired client.
    pub fn with_client(
        cfg: &WidgetConfig,
        clients: &'static SharedClients,
        client: WidgetResult<Arc<TelegramClient>>,
    ) -> Self {
        let tg = cfg.telegram.clone();
        let inbox = Arc::new(Inbox::new(tg.filters.clone()));
        let attachment = client.map(|client| {
            let listener = client.add_listener(inbox.clone());
            Attachment { clients, client, listener }
        });
        if let Err(e) = &attachment {
            warn!("telegram widget {}: {}", cfg.id, e);
        }
        let scroll = tg.scroll;
        let state = TelegramState {
            status: ConnectionStatus::Disconnected,
            was_connected: false,
            current: None,
            started: None,
            dismissed: None,
            h_scroll: TextScroller::new(scroll.mode, scroll.speed),
            v_scroll: TextScroller::new(scroll.mode, scroll.speed),
            blink: BlinkAnimator::new(tg.blink, Duration::from_secs_f64(tg.blink_interval.max(0.0))),
            transition: Transition::new(tg.transition.kind, Duration::from_secs_f64(tg.transition.in_speed.max(0.0))),
        };
        Self {
            base: BaseWidget::from_config(cfg),
            face: load_font_or_default(&cfg.text.font, cfg.text.size),
            color: luma_or(cfg.colors.text, 255),
            tg,
            inbox,
            attachment,
            released: AtomicBool::new(false),
            state: RwLock::new(state),
        }
    }

    fn line_height(&self) -> u32 {
        self.face.line_height()
    }

    fn header_height(&self) -> u32 {
        if !self.tg.show_header {
            return 0;
        }
        self.line_height() + if self.tg.separator { 3 } else { 1 }
    }

    fn body_rect(&self) -> Rect {
        let area = self.base.content_area();
        let hh = self.header_height().min(area.h);
        Rect::new(area.x, area.y + hh as i32, area.w, area.h - hh)
    }

    fn layout_body(&self, msg: &Message, body: Rect) -> BodyLayout {
        let text = message_body(msg, self.tg.show_message);
        let lh = self.line_height().max(1);
        let measure = |s: &str| self.face.text_width(s);
        match self.tg.scroll.axis {
            ScrollAxis::Horizontal => {
                let line = text.replace('\n', " ");
                let content = measure(&line);
                BodyLayout { lines: vec![line], content, container: body.w }
            }
            ScrollAxis::Vertical => {
                let lines = wrap_text(&text, body.w, self.tg.word_break, measure);
                let content = lines.len() as u32 * lh;
                BodyLayout { lines, content, container: body.h }
            }
            ScrollAxis::None => {
                let lines = wrap_text(&text, body.w, self.tg.word_break, measure);
                let max_lines = (body.h / lh).max(1) as usize;
                let lines = truncate_with_ellipsis(lines, max_lines, body.w, measure);
                BodyLayout { lines, content: 0, container: 0 }
            }
        }
    }

    /// Message frame without the transition applied.
    fn compose(&self, st: &TelegramState, msg: &Message) -> GrayImage {
        let mut img = self.base.create_canvas();
        if !st.blink.is_visible() {
            return img;
        }
        let area = self.base.content_area();
        let lh = self.line_height() as i32;
        if self.tg.show_header {
            let header = format_header(&self.tg.header_format, msg, &Local);
            self.face.draw(&mut img, &header, area.x, area.y, self.color);
            if self.tg.separator {
                draw_horizontal_line(&mut img, area.x, area.right() - 1, area.y + lh + 1, self.color);
            }
        }

        let body = self.body_rect();
        if body.is_empty() {
            return img;
        }
        let layout = self.layout_body(msg, body);
        let mut pane = GrayImage::with_background(body.w, body.h, self.base.style().background);
        match self.tg.scroll.axis {
            ScrollAxis::Horizontal => {
                for x in st.h_scroll.origins(layout.content, layout.container) {
                    self.face.draw(&mut pane, &layout.lines[0], x, 0, self.color);
                }
            }
            ScrollAxis::Vertical => {
                for y0 in st.v_scroll.origins(layout.content, layout.container) {
                    for (i, line) in layout.lines.iter().enumerate() {
                        self.face.draw(&mut pane, line, 0, y0 + i as i32 * lh, self.color);
                    }
                }
            }
            ScrollAxis::None => {
                for (i, line) in layout.lines.iter().enumerate() {
                    self.face.draw(&mut pane, line, 0, i as i32 * lh, self.color);
                }
            }
        }
        img.blit(&pane, body.x, body.y, self.base.is_transparent());
        img
    }

    fn activate(&self, st: &mut TelegramState, msg: Message, now: Instant) {
        let previous = match &st.current {
            Some(cur) => self.compose(st, cur),
            None => self.base.create_canvas(),
        };
        debug!("telegram showing message {}", msg.id);
        st.current = Some(msg);
        st.started = Some(now);
        st.h_scroll.reset();
        st.v_scroll.reset();
        st.blink.mark_new_at(now);
        st.transition.start_at(previous, now);
        self.base.trigger_at(now);
        if let Ok(a) = &self.attachment {
            a.client.mark_read();
        }
    }

    pub fn update_at(&self, now: Instant) -> WidgetResult<()> {
        let client = &self.attachment.as_ref().map_err(Clone::clone)?.client;
        let status = client.status();
        let (incoming, superseded) = self.inbox.take();
        // replaced messages will never be shown
        for _ in 0..superseded {
            client.mark_read();
        }

        let mut guard = write_state(&self.state);
        let st = &mut *guard;
        if status == ConnectionStatus::Connected {
            st.was_connected = true;
        }
        st.status = status;

        if let Some(msg) = incoming {
            if st.dismissed != Some(msg.id) {
                self.activate(st, msg, now);
            }
        }

        if self.tg.timeout > 0.0 {
            let timeout = Duration::from_secs_f64(self.tg.timeout);
            let expired = match (&st.current, st.started) {
                (Some(cur), Some(t0)) if now.saturating_duration_since(t0) > timeout => Some(cur.id),
                _ => None,
            };
            if let Some(id) = expired {
                st.dismissed = Some(id);
                st.current = None;
                st.started = None;
            }
        }

        if let Some(msg) = &st.current {
            let layout = self.layout_body(msg, self.body_rect());
            match self.tg.scroll.axis {
                ScrollAxis::Horizontal => st.h_scroll.tick_at(now, layout.content, layout.container),
                ScrollAxis::Vertical => st.v_scroll.tick_at(now, layout.content, layout.container),
                ScrollAxis::None => {}
            }
        }
        st.blink.tick_at(now);
        Ok(())
    }

    pub fn render_at(&self, now: Instant) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide_at(now) {
            return Ok(None);
        }
        let mut img = match &self.attachment {
            Err(e) => self.status_lines(&e.to_string()),
            Ok(_) => {
                let st = read_state(&self.state);
                match (&st.status, &st.current) {
                    (ConnectionStatus::Error(e), _) => self.status_lines(e),
                    (ConnectionStatus::Connecting, _) => self.status_text(&format!("Connecting{ELLIPSIS}")),
                    (ConnectionStatus::Disconnected, _) if st.was_connected => self.status_text("Disconnected"),
                    (ConnectionStatus::Disconnected, _) => self.status_text(&format!("Connecting{ELLIPSIS}")),
                    (ConnectionStatus::Connected, None) if self.base.auto_hide().is_some() => return Ok(None),
                    (ConnectionStatus::Connected, None) => self.base.create_canvas(),
                    (ConnectionStatus::Connected, Some(msg)) => {
                        let frame = self.compose(&st, msg);
                        st.transition.apply_at(frame, now)
                    }
                }
            }
        };
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }

    fn status_text(&self, text: &str) -> GrayImage {
        let mut img = self.base.create_canvas();
        draw_status(&mut img, text, self.color);
        img
    }

    fn status_lines(&self, text: &str) -> GrayImage {
        let mut img = self.base.create_canvas();
        draw_status_lines(&mut img, &wrap_chars_count(text, TELEGRAM_ERROR_WRAP), self.color);
        img
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(TelegramWidget::attach(cfg, shared_clients())))
}

impl Widget for TelegramWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        self.update_at(Instant::now())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        self.render_at(Instant::now())
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }
}

impl Stoppable for TelegramWidget {
    fn stop(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(a) = &self.attachment {
            a.client.remove_listener(a.listener);
            a.clients.release(&self.tg.auth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramAuthConfig;
    use crate::telegram::{ChatType, TransitionKind, Transport, Update};
    use crate::BoxFuture;

    struct Silent;

    impl Transport for Silent {
        fn get_me<'a>(&'a self) -> BoxFuture<'a, WidgetResult<String>> {
            Box::pin(async { Ok("bot".to_string()) })
        }
        fn get_updates<'a>(&'a self, _o: Option<i64>, _t: Duration) -> BoxFuture<'a, WidgetResult<Vec<Update>>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            })
        }
    }

    fn registry() -> &'static SharedClients {
        Box::leak(Box::new(SharedClients::new()))
    }

    fn widget(cfg: &WidgetConfig) -> (TelegramWidget, Arc<TelegramClient>) {
        let clients = registry();
        let client = clients
            .get_or_create_with(&cfg.telegram.auth, || {
                Ok(Arc::new(TelegramClient::new(Arc::new(Silent), Duration::from_secs(1))))
            })
            .unwrap();
        (TelegramWidget::with_client(cfg, clients, Ok(client.clone())), client)
    }

    fn cfg() -> WidgetConfig {
        let mut c = WidgetConfig::new("telegram", "tg", 96, 32);
        c.telegram.auth = TelegramAuthConfig { token: "t".into(), api_base: None };
        c
    }

    fn msg(id: i64, text: &str) -> Message {
        Message { id, chat_id: 9, sender_name: Some("Alice".into()), text: text.into(), ..Message::default() }
    }

    #[test]
    fn test_filters() {
        let f = TelegramFilters { chat_types: vec![ChatType::Group], chat_ids: vec![], ignore_forwarded: true };
        let mut m = msg(1, "x");
        assert!(!passes_filters(&f, &m));
        m.chat_type = ChatType::Group;
        assert!(passes_filters(&f, &m));
        m.is_forwarded = true;
        assert!(!passes_filters(&f, &m));
        assert!(passes_filters(&TelegramFilters::default(), &m));
    }

    #[tokio::test]
    async fn test_message_then_timeout_dismisses() {
        let mut c = cfg();
        c.telegram.timeout = 2.0;
        let (w, client) = widget(&c);
        client.core().set_status(ConnectionStatus::Connected);

        let t0 = Instant::now();
        client.core().dispatch_message(&msg(5, "hello there"));
        w.update_at(t0).unwrap();
        assert_eq!(read_state(&w.state).current.as_ref().map(|m| m.id), Some(5));
        assert_eq!(client.unread_count(), 0);
        assert!(w.render_at(t0).unwrap().unwrap().count_not(0) > 0);

        w.update_at(t0 + Duration::from_secs(3)).unwrap();
        assert!(read_state(&w.state).current.is_none());
        assert_eq!(read_state(&w.state).dismissed, Some(5));

        // the dismissed message is not shown again
        client.core().dispatch_message(&msg(5, "hello there"));
        w.update_at(t0 + Duration::from_secs(4)).unwrap();
        assert!(read_state(&w.state).current.is_none());
        w.stop();
    }

    #[tokio::test]
    async fn test_status_views() {
        let (w, client) = widget(&cfg());
        w.update_at(Instant::now()).unwrap();
        let connecting = w.render().unwrap().unwrap();
        assert!(connecting.count_not(0) > 0);

        client.core().set_status(ConnectionStatus::Connected);
        w.update_at(Instant::now()).unwrap();
        // connected, nothing to show
        assert_eq!(w.render().unwrap().unwrap().count_not(0), 0);

        client.core().set_status(ConnectionStatus::Disconnected);
        w.update_at(Instant::now()).unwrap();
        assert!(read_state(&w.state).was_connected);
        assert_ne!(w.render().unwrap().unwrap(), connecting);
        w.stop();
    }

    #[tokio::test]
    async fn test_long_body_gets_ellipsis() {
        let (w, client) = widget(&cfg());
        client.core().set_status(ConnectionStatus::Connected);
        let long = "word ".repeat(80);
        let m = msg(1, &long);
        let layout = w.layout_body(&m, w.body_rect());
        let last = layout.lines.last().unwrap();
        assert!(last.ends_with(ELLIPSIS));
        assert!(w.face.text_width(last) <= w.body_rect().w);
        w.stop();
    }

    #[tokio::test]
    async fn test_transition_runs_on_change() {
        let mut c = cfg();
        c.telegram.transition.kind = TransitionKind::Fade;
        c.telegram.transition.in_speed = 1.0;
        let (w, client) = widget(&c);
        client.core().set_status(ConnectionStatus::Connected);
        let t0 = Instant::now();
        client.core().dispatch_message(&msg(1, "first"));
        w.update_at(t0).unwrap();
        let mid = w.render_at(t0 + Duration::from_millis(500)).unwrap().unwrap();
        let done = w.render_at(t0 + Duration::from_secs(2)).unwrap().unwrap();
        assert_ne!(mid, done);
        w.stop();
    }

    #[tokio::test]
    async fn test_dismissed_message_hides_with_auto_hide() {
        let mut c = cfg();
        c.telegram.timeout = 2.0;
        c.auto_hide.enabled = true;
        c.auto_hide.timeout = 60.0;
        let (w, client) = widget(&c);
        client.core().set_status(ConnectionStatus::Connected);

        let t0 = Instant::now();
        client.core().dispatch_message(&msg(3, "ping"));
        w.update_at(t0).unwrap();
        assert!(w.render_at(t0).unwrap().is_some());

        w.update_at(t0 + Duration::from_secs(3)).unwrap();
        assert!(w.render_at(t0 + Duration::from_secs(3)).unwrap().is_none());
        w.stop();
    }

    #[tokio::test]
    async fn test_burst_leaves_no_unread() {
        let (w, client) = widget(&cfg());
        client.core().set_status(ConnectionStatus::Connected);
        client.core().dispatch_message(&msg(1, "one"));
        client.core().dispatch_message(&msg(2, "two"));
        client.core().dispatch_message(&msg(3, "three"));
        assert_eq!(client.unread_count(), 3);
        w.update_at(Instant::now()).unwrap();
        assert_eq!(read_state(&w.state).current.as_ref().map(|m| m.id), Some(3));
        assert_eq!(client.unread_count(), 0);
        w.stop();
    }

    #[tokio::test]
    async fn test_second_stop_keeps_sibling_reference() {
        let c = cfg();
        let clients = registry();
        let make = || -> WidgetResult<Arc<TelegramClient>> {
            Ok(Arc::new(TelegramClient::new(Arc::new(Silent), Duration::from_secs(1))))
        };
        let a = TelegramWidget::with_client(&c, clients, clients.get_or_create_with(&c.telegram.auth, make));
        let b = TelegramWidget::with_client(&c, clients, clients.get_or_create_with(&c.telegram.auth, make));
        assert_eq!(clients.refcount(&c.telegram.auth), 2);
        a.stop();
        a.stop();
        assert_eq!(clients.refcount(&c.telegram.auth), 1);
        b.stop();
        assert_eq!(clients.refcount(&c.telegram.auth), 0);
    }
}
