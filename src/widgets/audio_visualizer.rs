/*
 *  widgets/audio_visualizer.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Spectrum bars and oscilloscope from loopback audio
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


use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use log::warn;

use crate::audio::capture::CaptureError;
use crate::audio::spectrum::compensate_volume;
use crate::audio::{shared_capture, shared_volume, LoopbackCapture, SpectrumAnalyzer, SpectrumEngine};
use crate::bitmap::{luma_or, GrayImage};
use crate::config::{AudioVisualizerConfig, BarStyle, ChannelMode, VisualizerMode, WaveStyle, WidgetConfig};
use crate::constants::{CAPTURE_DEFAULT_RATE, SILENT_BLOCK_SAMPLES, TELEGRAM_ERROR_WRAP};
use crate::draw::{draw_filled_rectangle, draw_horizontal_line, draw_line, draw_vertical_line, Rect};
use crate::error::WidgetResult;
use crate::fonts::draw_status_lines;
use crate::widget::{read_state, write_state, BaseWidget, Widget};
use crate::wordwrap::wrap_chars_count;

/// Where samples come from. The process capture in production.
pub trait SampleSource: Send + Sync {
    fn sample_rate(&self) -> u32;
    fn read_mono(&self) -> Result<Vec<f32>, CaptureError>;
    fn read_stereo(&self) -> Result<(Vec<f32>, Vec<f32>), CaptureError>;
}

struct SharedLoopback(&'static LoopbackCapture);

impl SampleSource for SharedLoopback {
    fn sample_rate(&self) -> u32 {
        self.0.sample_rate()
    }

    fn read_mono(&self) -> Result<Vec<f32>, CaptureError> {
        self.0.read_samples()
    }

    fn read_stereo(&self) -> Result<(Vec<f32>, Vec<f32>), CaptureError> {
        self.0.read_stereo()
    }
}

/// Current output volume in percent, `None` when unknown.
pub type VolumeProbe = Box<dyn Fn() -> Option<f64> + Send + Sync>;

struct VisualizerState {
    analyzer: Option<SpectrumAnalyzer>,
    left: VecDeque<f32>,
    right: VecDeque<f32>,
    read_failing: bool,
}

pub struct AudioVisualizerWidget {
    base: BaseWidget,
    av: AudioVisualizerConfig,
    fill: u8,
    peak: u8,
    source: Result<Box<dyn SampleSource>, CaptureError>,
    volume: VolumeProbe,
    state: RwLock<VisualizerState>,
}

fn push_trimmed(buf: &mut VecDeque<f32>, block: &[f32], cap: usize) {
    buf.extend(block);
    if buf.len() > cap {
        let excess = buf.len() - cap;
        buf.drain(..excess);
    }
}

impl AudioVisualizerWidget {
    pub fn with_source(
        cfg: &WidgetConfig,
        source: Result<Box<dyn SampleSource>, CaptureError>,
        volume: VolumeProbe,
    ) -> Self {
        let av = cfg.audio_visualizer;
        let analyzer = (av.mode == VisualizerMode::Spectrum).then(|| {
            let rate = source.as_ref().map(|s| s.sample_rate()).unwrap_or(0);
            let rate = if rate == 0 { CAPTURE_DEFAULT_RATE } else { rate };
            let engine = SpectrumEngine::new(rate, av.bar_count.max(1), av.scale, av.frequency_compensation);
            SpectrumAnalyzer::new(engine, av.smoothing, av.peak_hold, av.peak_hold_time)
        });
        Self {
            base: BaseWidget::from_config(cfg),
            av,
            fill: luma_or(cfg.colors.fill, 255),
            peak: luma_or(cfg.colors.peak, 255),
            source,
            volume,
            state: RwLock::new(VisualizerState {
                analyzer,
                left: VecDeque::with_capacity(av.sample_count),
                right: VecDeque::with_capacity(av.sample_count),
                read_failing: false,
            }),
        }
    }

    fn stereo(&self) -> bool {
        self.av.mode == VisualizerMode::Oscilloscope && self.av.channel_mode == ChannelMode::StereoSeparated
    }

    /// Pull what the capture has; an empty or failed read becomes silence.
    fn read_block(&self, source: &dyn SampleSource, st: &mut VisualizerState) -> (Vec<f32>, Vec<f32>) {
        let read = if self.stereo() {
            source.read_stereo()
        } else {
            source.read_mono().map(|l| (l, Vec::new()))
        };
        match read {
            Ok((l, r)) if !l.is_empty() => {
                st.read_failing = false;
                (l, r)
            }
            Ok(_) => (vec![0.0; SILENT_BLOCK_SAMPLES], vec![0.0; SILENT_BLOCK_SAMPLES]),
            Err(e) => {
                if !st.read_failing {
                    warn!("{}: audio read failed: {}", self.base.name(), e);
                    st.read_failing = true;
                }
                (vec![0.0; SILENT_BLOCK_SAMPLES], vec![0.0; SILENT_BLOCK_SAMPLES])
            }
        }
    }

    pub fn update_at(&self, now: Instant) -> WidgetResult<()> {
        let source = self.source.as_ref().map_err(|e| e.clone())?;
        let mut guard = write_state(&self.state);
        let st = &mut *guard;
        let (mut left, mut right) = self.read_block(&**source, st);

        if self.av.volume_compensation {
            let v = (self.volume)();
            compensate_volume(&mut left, v);
            compensate_volume(&mut right, v);
        }

        let cap = self.av.sample_count.max(1);
        push_trimmed(&mut st.left, &left, cap);
        if self.stereo() {
            push_trimmed(&mut st.right, &right, cap);
        }
        if let Some(a) = st.analyzer.as_mut() {
            a.ensure_rate(source.sample_rate());
            a.push_samples(&left);
            a.update_at(now);
        }
        Ok(())
    }

    fn draw_spectrum(&self, img: &mut GrayImage, area: Rect, a: &SpectrumAnalyzer) {
        let bars = a.bars().max(1) as u32;
        let bar_w = (area.w / bars).max(1);
        let gap = if bar_w > 2 { 1 } else { 0 };
        let h = area.h as f32;
        let bottom = area.bottom();
        for (i, (&level, &peak)) in a.smoothed().iter().zip(a.peaks()).enumerate() {
            let x0 = area.x + (i as u32 * bar_w) as i32;
            if x0 >= area.right() {
                break;
            }
            let x1 = (x0 + (bar_w - gap) as i32 - 1).max(x0);
            let level_px = (level.clamp(0.0, 1.0) * h).round() as i32;
            if level_px > 0 {
                match self.av.style {
                    BarStyle::Bars => draw_filled_rectangle(
                        img,
                        Rect::new(x0, bottom - level_px, (x1 - x0 + 1) as u32, level_px as u32),
                        self.fill,
                    ),
                    BarStyle::Line => draw_horizontal_line(img, x0, x1, bottom - level_px, self.fill),
                }
            }
            if self.av.peak_hold && peak > 0.0 {
                let y = (area.y + (h - peak.clamp(0.0, 1.0) * h) as i32).clamp(area.y, bottom - 1);
                draw_horizontal_line(img, x0, x1, y, self.peak);
            }
        }
    }

    fn draw_wave(&self, img: &mut GrayImage, area: Rect, samples: &VecDeque<f32>) {
        if area.is_empty() || samples.is_empty() {
            return;
        }
        let half = area.h as f32 / 2.0;
        let mid = area.y + (area.h / 2) as i32;
        let last_row = area.bottom() - 1;
        let n = samples.len();
        let span = area.w.saturating_sub(1) as f32;
        let point = |i: usize, s: f32| {
            let x = area.x + if n > 1 { (i as f32 * span / (n - 1) as f32).round() as i32 } else { 0 };
            let y = (mid - (s.clamp(-1.0, 1.0) * half).round() as i32).clamp(area.y, last_row);
            (x, y)
        };
        match self.av.wave_style {
            WaveStyle::Line => {
                let mut prev = None;
                for (i, &s) in samples.iter().enumerate() {
                    let (x, y) = point(i, s);
                    match prev {
                        Some((px, py)) => draw_line(img, px, py, x, y, self.fill),
                        None => img.set_pixel(x, y, self.fill),
                    }
                    prev = Some((x, y));
                }
            }
            WaveStyle::Filled => {
                for (i, &s) in samples.iter().enumerate() {
                    let (x, y) = point(i, s);
                    draw_vertical_line(img, x, mid.min(last_row), y, self.fill);
                }
            }
        }
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    let source = shared_capture().map(|c| Box::new(SharedLoopback(c)) as Box<dyn SampleSource>);
    let volume: VolumeProbe = Box::new(|| shared_volume().ok().and_then(|m| m.percent()));
    Ok(Arc::new(AudioVisualizerWidget::with_source(cfg, source, volume)))
}

impl Widget for AudioVisualizerWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        self.update_at(Instant::now())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        let area = self.base.content_area();
        match &self.source {
            Err(e) => draw_status_lines(&mut img, &wrap_chars_count(&e.to_string(), TELEGRAM_ERROR_WRAP), self.fill),
            Ok(_) => {
                let st = read_state(&self.state);
                match (&st.analyzer, self.stereo()) {
                    (Some(a), _) => self.draw_spectrum(&mut img, area, a),
                    (None, false) => self.draw_wave(&mut img, area, &st.left),
                    (None, true) => {
                        let top_h = area.h / 2;
                        let top = Rect::new(area.x, area.y, area.w, top_h);
                        let bottom = Rect::new(area.x, area.y + top_h as i32, area.w, area.h - top_h);
                        self.draw_wave(&mut img, top, &st.left);
                        self.draw_wave(&mut img, bottom, &st.right);
                    }
                }
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}
