/*
 *  textable.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Time-driven text scroller for horizontal and vertical overflow
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

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::constants::{SCROLL_LOOP_GAP, SCROLL_PAUSE_PIXELS};

/// Enum for scroll modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollMode {
    #[default]
    Static,
    /// Wraps modulo content + gap, two copies drawn for a seamless loop.
    Continuous,
    /// Travels between both ends.
    Bounce,
    /// Travels to the end, pauses, snaps back to the start.
    PauseEnds,
}

pub fn transform_scroll_mode(scroll_mode: &str) -> ScrollMode {
    match scroll_mode {
        "continuous" | "loop" | "loopleft" => ScrollMode::Continuous,
        "bounce" | "cylon" => ScrollMode::Bounce,
        "pause_ends" | "pause" => ScrollMode::PauseEnds,
        _ => ScrollMode::Static,
    }
}

/// Scroll offset state for one axis. Owns no text and never draws;
/// callers tick it from `update` and read origins from `render`.
#[derive(Debug, Clone)]
pub struct TextScroller {
    mode: ScrollMode,
    speed: f32, // px per second
    gap: u32,
    offset: f32,
    direction: f32,
    pause_left: f32, // pixels of travel still to wait out
    last_tick: Option<Instant>,
}

impl TextScroller {
    pub fn new(mode: ScrollMode, speed: f32) -> Self {
        Self {
            mode,
            speed: speed.max(0.0),
            gap: SCROLL_LOOP_GAP,
            offset: 0.0,
            direction: 1.0,
            pause_left: 0.0,
            last_tick: None,
        }
    }

    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    pub fn mode(&self) -> ScrollMode { self.mode }

    /// Back to the start, as on new content.
    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.direction = 1.0;
        self.pause_left = 0.0;
        self.last_tick = None;
    }

    pub fn tick(&mut self, content: u32, container: u32) {
        self.tick_at(Instant::now(), content, container);
    }

    /// Advance by the time elapsed since the previous tick.
    pub fn tick_at(&mut self, now: Instant, content: u32, container: u32) {
        let dt = self
            .last_tick
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.advance(self.speed * dt, content, container);
    }

    /// Advance by `dpx` pixels of travel.
    pub fn advance(&mut self, dpx: f32, content: u32, container: u32) {
        if self.mode == ScrollMode::Static || content <= container {
            self.offset = 0.0;
            return;
        }
        let max = (content - container) as f32;
        match self.mode {
            ScrollMode::Static => {}
            ScrollMode::Continuous => {
                let period = (content + self.gap) as f32;
                self.offset = (self.offset + dpx) % period;
            }
            ScrollMode::Bounce => {
                self.offset += self.direction * dpx;
                if self.offset >= max {
                    self.offset = max;
                    self.direction = -1.0;
                } else if self.offset <= 0.0 {
                    self.offset = 0.0;
                    self.direction = 1.0;
                }
            }
            ScrollMode::PauseEnds => {
                if self.pause_left > 0.0 {
                    self.pause_left -= dpx;
                    if self.pause_left <= 0.0 {
                        self.pause_left = 0.0;
                        self.offset = 0.0;
                    }
                    return;
                }
                self.offset += dpx;
                if self.offset >= max {
                    self.offset = max;
                    self.pause_left = SCROLL_PAUSE_PIXELS;
                }
            }
        }
    }

    pub fn offset(&self) -> i32 {
        self.offset.round() as i32
    }

    /// Draw origins relative to the container start.
    pub fn origins(&self, content: u32, container: u32) -> Vec<i32> {
        if self.mode == ScrollMode::Static || content <= container {
            return vec![0];
        }
        let off = self.offset();
        if self.mode == ScrollMode::Continuous {
            vec![-off, -off + (content + self.gap) as i32]
        } else {
            vec![-off]
        }
    }
}
