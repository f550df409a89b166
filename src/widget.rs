/*
 *  widget.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget contract, shared base state and auto-hide
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

//! Every tile on the deck implements [`Widget`]. Widgets own their state
//! behind a single `RwLock`: `update` takes the write side just long enough to
//! publish a new reading, `render` takes the read side and hands back a fresh
//! bitmap the caller owns outright.

use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{AutoHideConfig, Position, StyleConfig, WidgetConfig};
use crate::draw::{draw_border, Rect};
use crate::error::WidgetResult;

/// Optional teardown capability, probed by the runtime at shutdown.
pub trait Stoppable: Send + Sync {
    /// Signal background workers to exit and wait for the ones we own.
    fn stop(&self);
}

pub trait Widget: Send + Sync {
    fn name(&self) -> &str;
    fn position(&self) -> Position;
    fn style(&self) -> StyleConfig;
    fn update_interval(&self) -> Duration;

    /// Sample the data source. Errors are recorded and polling continues.
    fn update(&self) -> WidgetResult<()>;

    /// `Ok(None)` means hidden for this frame.
    fn render(&self) -> WidgetResult<Option<GrayImage>>;

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        None
    }
}

/// Read guard that survives a panicked writer.
pub fn read_state<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write_state<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Visibility timer. Starts hidden; `trigger` marks fresh data.
#[derive(Debug)]
pub struct AutoHide {
    last: Mutex<Option<Instant>>,
    timeout: Duration,
}

impl AutoHide {
    pub fn new(timeout: Duration) -> Self {
        Self { last: Mutex::new(None), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn trigger(&self) {
        self.trigger_at(Instant::now());
    }

    pub fn trigger_at(&self, now: Instant) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    pub fn should_hide(&self) -> bool {
        self.should_hide_at(Instant::now())
    }

    pub fn should_hide_at(&self, now: Instant) -> bool {
        match *self.last.lock().unwrap_or_else(PoisonError::into_inner) {
            None => true,
            Some(t) => now.saturating_duration_since(t) > self.timeout,
        }
    }

    /// Forget the last trigger, hiding immediately.
    pub fn reset(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Configuration every widget shares: geometry, style, cadence, auto-hide.
#[derive(Debug)]
pub struct BaseWidget {
    name: String,
    position: Position,
    style: StyleConfig,
    interval: Duration,
    auto_hide: Option<AutoHide>,
}

impl BaseWidget {
    pub fn new(name: &str, position: Position, style: StyleConfig, interval: Duration) -> Self {
        Self { name: name.to_string(), position, style, interval, auto_hide: None }
    }

    pub fn from_config(cfg: &WidgetConfig) -> Self {
        let name = if cfg.id.is_empty() { cfg.kind.as_str() } else { cfg.id.as_str() };
        let mut base = Self::new(name, cfg.position, cfg.style, cfg.interval());
        base.set_auto_hide(&cfg.auto_hide);
        base
    }

    pub fn set_auto_hide(&mut self, cfg: &AutoHideConfig) {
        self.auto_hide = cfg
            .enabled
            .then(|| AutoHide::new(Duration::from_secs_f64(cfg.timeout.max(0.0))));
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn position(&self) -> Position { self.position }
    pub fn style(&self) -> StyleConfig { self.style }
    pub fn update_interval(&self) -> Duration { self.interval }

    pub fn width(&self) -> u32 { self.position.w }
    pub fn height(&self) -> u32 { self.position.h }

    pub fn is_transparent(&self) -> bool {
        self.style.background < 0
    }

    pub fn has_border(&self) -> bool {
        self.style.border >= 0
    }

    /// Drawable area after the border and padding are taken off.
    pub fn content_area(&self) -> Rect {
        let inset = self.style.padding + u32::from(self.has_border());
        Rect::new(0, 0, self.position.w, self.position.h).inset(inset)
    }

    /// Blank W×H canvas in the background colour.
    pub fn create_canvas(&self) -> GrayImage {
        GrayImage::with_background(self.position.w, self.position.h, self.style.background)
    }

    pub fn apply_border(&self, img: &mut GrayImage) {
        if self.has_border() {
            draw_border(img, luma_or(self.style.border, 255));
        }
    }

    pub fn auto_hide(&self) -> Option<&AutoHide> {
        self.auto_hide.as_ref()
    }

    /// Called on external data arrival only.
    pub fn trigger(&self) {
        if let Some(ah) = &self.auto_hide {
            ah.trigger();
        }
    }

    pub fn trigger_at(&self, now: Instant) {
        if let Some(ah) = &self.auto_hide {
            ah.trigger_at(now);
        }
    }

    /// False when auto-hide is disabled.
    pub fn should_hide(&self) -> bool {
        self.auto_hide.as_ref().is_some_and(AutoHide::should_hide)
    }

    pub fn should_hide_at(&self, now: Instant) -> bool {
        self.auto_hide.as_ref().is_some_and(|ah| ah.should_hide_at(now))
    }
}
