/*
 *  pacer.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame pacing for the compositor loop
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

fn frame_for(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(fps.max(1)))
}

/// Fixed-rate deadline tracker. A late frame reschedules from now rather
/// than bursting to catch up.
pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        Self::starting_at(target_fps, Instant::now())
    }

    pub fn starting_at(target_fps: u32, now: Instant) -> Self {
        Self { next_deadline: now, frame: frame_for(target_fps) }
    }

    #[inline]
    pub fn set_fps(&mut self, fps: u32) {
        self.frame = frame_for(fps);
    }

    pub fn frame(&self) -> Duration {
        self.frame
    }

    #[inline]
    pub fn should_flush(&mut self) -> bool {
        self.should_flush_at(Instant::now())
    }

    /// True when the deadline has passed; schedules the next one.
    pub fn should_flush_at(&mut self, now: Instant) -> bool {
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// Time left before the next frame is due.
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }
}

/// Pacer that lowers its rate when composing a frame gets slow.
pub struct AutoPacer {
    pacer: Pacer,
    ema_ms: f32,
    alpha: f32,
    headroom: f32,
    max_fps: u32,
    min_fps: u32,
}

impl AutoPacer {
    pub fn new(initial_fps: u32, max_fps: u32, min_fps: u32) -> Self {
        Self {
            pacer: Pacer::new(initial_fps),
            ema_ms: 0.0,
            alpha: 0.2,
            headroom: 1.25,
            max_fps: max_fps.max(1),
            min_fps: min_fps.clamp(1, max_fps.max(1)),
        }
    }

    pub fn should_flush(&mut self) -> bool {
        self.pacer.should_flush()
    }

    pub fn until_next(&self, now: Instant) -> Duration {
        self.pacer.until_next(now)
    }

    pub fn frame(&self) -> Duration {
        self.pacer.frame()
    }

    /// Feed the time one compose + output pass took.
    pub fn record_frame_ms(&mut self, ms: f32) {
        self.ema_ms = if self.ema_ms == 0.0 {
            ms
        } else {
            self.alpha * ms + (1.0 - self.alpha) * self.ema_ms
        };
        if self.ema_ms > 0.0 {
            let safe = (1000.0 / (self.ema_ms * self.headroom)).clamp(self.min_fps as f32, self.max_fps as f32);
            self.pacer.set_fps(safe as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_deadline() {
        let t0 = Instant::now();
        let mut p = Pacer::starting_at(20, t0);
        assert!(p.should_flush_at(t0));
        assert!(!p.should_flush_at(t0 + Duration::from_millis(10)));
        assert_eq!(p.until_next(t0 + Duration::from_millis(10)), Duration::from_millis(40));
        assert!(p.should_flush_at(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn test_auto_pacer_backs_off() {
        let mut p = AutoPacer::new(60, 60, 10);
        // 40 ms per frame with 1.25 headroom allows 20 fps
        p.record_frame_ms(40.0);
        assert_eq!(p.frame(), Duration::from_micros(50_000));
        // a very slow frame is floored at min_fps
        let mut slow = AutoPacer::new(60, 60, 10);
        slow.record_frame_ms(1000.0);
        assert_eq!(slow.frame(), Duration::from_micros(100_000));
    }
}
