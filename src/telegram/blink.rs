/*
 *  telegram/blink.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Blink animator for new message highlights
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

use std::time::{Duration, Instant};

use super::BlinkMode;

/// How long a fresh message blinks in `on_new` mode.
pub const NEW_BLINK_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct BlinkAnimator {
    mode: BlinkMode,
    interval: Duration,
    visible: bool,
    last_toggle: Option<Instant>,
    new_until: Option<Instant>,
}

impl BlinkAnimator {
    pub fn new(mode: BlinkMode, interval: Duration) -> Self {
        Self {
            mode,
            interval: interval.max(Duration::from_millis(50)),
            visible: true,
            last_toggle: None,
            new_until: None,
        }
    }

    /// A message just arrived.
    pub fn mark_new_at(&mut self, now: Instant) {
        self.new_until = Some(now + NEW_BLINK_WINDOW);
        self.visible = true;
        self.last_toggle = Some(now);
    }

    fn active_at(&self, now: Instant) -> bool {
        match self.mode {
            BlinkMode::Never => false,
            BlinkMode::Always => true,
            BlinkMode::OnNew => self.new_until.is_some_and(|t| now < t),
        }
    }

    pub fn tick_at(&mut self, now: Instant) {
        if !self.active_at(now) {
            self.visible = true;
            return;
        }
        match self.last_toggle {
            None => self.last_toggle = Some(now),
            Some(t) if now.saturating_duration_since(t) >= self.interval => {
                self.visible = !self.visible;
                self.last_toggle = Some(now);
            }
            Some(_) => {}
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_is_steady() {
        let mut b = BlinkAnimator::new(BlinkMode::Never, Duration::from_millis(100));
        let t = Instant::now();
        for k in 0..10 {
            b.tick_at(t + Duration::from_millis(100 * k));
            assert!(b.is_visible());
        }
    }

    #[test]
    fn test_always_toggles_each_interval() {
        let mut b = BlinkAnimator::new(BlinkMode::Always, Duration::from_millis(500));
        let t = Instant::now();
        b.tick_at(t);
        assert!(b.is_visible());
        b.tick_at(t + Duration::from_millis(499));
        assert!(b.is_visible());
        b.tick_at(t + Duration::from_millis(500));
        assert!(!b.is_visible());
        b.tick_at(t + Duration::from_millis(1000));
        assert!(b.is_visible());
    }

    #[test]
    fn test_on_new_settles() {
        let mut b = BlinkAnimator::new(BlinkMode::OnNew, Duration::from_millis(500));
        let t = Instant::now();
        b.tick_at(t);
        assert!(b.is_visible());
        b.mark_new_at(t);
        b.tick_at(t + Duration::from_millis(600));
        assert!(!b.is_visible());
        b.tick_at(t + NEW_BLINK_WINDOW + Duration::from_millis(1));
        assert!(b.is_visible());
    }
}
