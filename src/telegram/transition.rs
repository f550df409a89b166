/*
 *  telegram/transition.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame transitions between consecutive messages
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

use super::TransitionKind;
use crate::bitmap::GrayImage;

/// Blend `from` toward `to` at `t` in [0, 1]. Images must share a size;
/// a mismatch returns `to`.
pub fn blend(from: &GrayImage, to: &GrayImage, t: f32, kind: TransitionKind) -> GrayImage {
    let t = t.clamp(0.0, 1.0);
    if from.width() != to.width() || from.height() != to.height() || t >= 1.0 {
        return to.clone();
    }
    let (w, h) = (to.width(), to.height());
    match kind {
        TransitionKind::None => to.clone(),
        TransitionKind::Fade => {
            let mut out = to.clone();
            for (o, (&a, &b)) in out.as_mut_slice().iter_mut().zip(from.as_slice().iter().zip(to.as_slice())) {
                *o = (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            }
            out
        }
        TransitionKind::SlideLeft => {
            let shift = (w as f32 * t).round() as i32;
            let mut out = GrayImage::new(w, h, 0);
            out.blit(from, -shift, 0, false);
            out.blit(to, w as i32 - shift, 0, false);
            out
        }
        TransitionKind::SlideUp => {
            let shift = (h as f32 * t).round() as i32;
            let mut out = GrayImage::new(w, h, 0);
            out.blit(from, 0, -shift, false);
            out.blit(to, 0, h as i32 - shift, false);
            out
        }
        TransitionKind::Wipe => {
            let edge = (w as f32 * t).round() as u32;
            let mut out = from.clone();
            out.copy_region(to, 0, 0, edge, h, 0, 0);
            out
        }
    }
}

/// Captured previous frame plus the timing of the running blend.
#[derive(Debug, Clone)]
pub struct Transition {
    kind: TransitionKind,
    duration: Duration,
    from: Option<GrayImage>,
    started: Option<Instant>,
}

impl Transition {
    pub fn new(kind: TransitionKind, duration: Duration) -> Self {
        Self { kind, duration, from: None, started: None }
    }

    pub fn start_at(&mut self, from: GrayImage, now: Instant) {
        if self.kind == TransitionKind::None || self.duration.is_zero() {
            self.from = None;
            self.started = None;
            return;
        }
        self.from = Some(from);
        self.started = Some(now);
    }

    pub fn progress_at(&self, now: Instant) -> Option<f32> {
        let started = self.started?;
        let t = now.saturating_duration_since(started).as_secs_f32() / self.duration.as_secs_f32();
        (t < 1.0).then_some(t)
    }

    pub fn is_active_at(&self, now: Instant) -> bool {
        self.progress_at(now).is_some()
    }

    /// `to` blended with the captured frame, or `to` itself when idle.
    pub fn apply_at(&self, to: GrayImage, now: Instant) -> GrayImage {
        match (self.progress_at(now), &self.from) {
            (Some(t), Some(from)) => blend(from, &to, t, self.kind),
            _ => to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_midpoint() {
        let a = GrayImage::new(4, 2, 0);
        let b = GrayImage::new(4, 2, 200);
        let m = blend(&a, &b, 0.5, TransitionKind::Fade);
        assert!(m.as_slice().iter().all(|&v| v == 100));
    }

    #[test]
    fn test_slide_left_quarter() {
        let a = GrayImage::new(8, 1, 10);
        let b = GrayImage::new(8, 1, 20);
        let m = blend(&a, &b, 0.25, TransitionKind::SlideLeft);
        assert_eq!(m.get(5, 0), Some(10));
        assert_eq!(m.get(6, 0), Some(20));
    }

    #[test]
    fn test_wipe() {
        let a = GrayImage::new(10, 2, 1);
        let b = GrayImage::new(10, 2, 9);
        let m = blend(&a, &b, 0.3, TransitionKind::Wipe);
        assert_eq!(m.get(2, 1), Some(9));
        assert_eq!(m.get(3, 1), Some(1));
    }

    #[test]
    fn test_transition_finishes() {
        let mut tr = Transition::new(TransitionKind::Fade, Duration::from_millis(300));
        let t0 = Instant::now();
        tr.start_at(GrayImage::new(2, 2, 0), t0);
        assert!(tr.is_active_at(t0 + Duration::from_millis(100)));
        let done = tr.apply_at(GrayImage::new(2, 2, 50), t0 + Duration::from_millis(300));
        assert_eq!(done.get(0, 0), Some(50));
    }

    #[test]
    fn test_none_kind_never_active() {
        let mut tr = Transition::new(TransitionKind::None, Duration::from_secs(1));
        let t0 = Instant::now();
        tr.start_at(GrayImage::new(2, 2, 0), t0);
        assert!(!tr.is_active_at(t0));
    }
}
