/*
 *  registry.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget factories keyed by type tag
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
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::WidgetConfig;
use crate::error::{WidgetError, WidgetResult};
use crate::widget::Widget;
use crate::widgets;

pub type WidgetFactory = fn(&WidgetConfig) -> WidgetResult<Arc<dyn Widget>>;

/// Type tags understood out of the box.
pub const BUILTIN_TAGS: [&str; 13] = [
    "clock",
    "cpu",
    "memory",
    "network",
    "battery",
    "volume",
    "weather",
    "keyboard_layout",
    "game_of_life",
    "doom",
    "telegram",
    "telegram_counter",
    "audio_visualizer",
];

#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, WidgetFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut r = Self::new();
        r.register("clock", widgets::clock::create);
        r.register("cpu", widgets::cpu::create);
        r.register("memory", widgets::memory::create);
        r.register("network", widgets::network::create);
        r.register("battery", widgets::battery::create);
        r.register("volume", widgets::volume::create);
        r.register("weather", widgets::weather::create);
        r.register("keyboard_layout", widgets::keyboard_layout::create);
        r.register("game_of_life", widgets::game_of_life::create);
        r.register("doom", widgets::doom::create);
        r.register("telegram", widgets::telegram::create);
        r.register("telegram_counter", widgets::telegram_counter::create);
        r.register("audio_visualizer", widgets::audio_visualizer::create);
        r
    }

    /// Add or replace the factory for `tag`.
    pub fn register(&mut self, tag: &str, factory: WidgetFactory) {
        if self.factories.insert(tag.to_string(), factory).is_some() {
            debug!("widget factory '{}' replaced", tag);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    pub fn create(&self, cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
        let factory = self
            .factories
            .get(cfg.kind.as_str())
            .ok_or_else(|| WidgetError::Config(format!("unknown widget type '{}'", cfg.kind)))?;
        factory(cfg)
    }

    /// Build every enabled widget. Failures are logged and skipped so one bad
    /// record does not take the deck down.
    pub fn create_all(&self, cfgs: &[WidgetConfig]) -> Vec<Arc<dyn Widget>> {
        let mut out = Vec::with_capacity(cfgs.len());
        for cfg in cfgs {
            if !cfg.enabled {
                debug!("widget '{}' disabled", cfg.id);
                continue;
            }
            match self.create(cfg) {
                Ok(w) => {
                    info!("widget '{}' ({}) created", w.name(), cfg.kind);
                    out.push(w);
                }
                Err(e) => warn!("widget '{}' ({}) not created: {}", cfg.id, cfg.kind, e),
            }
        }
        out
    }
}
