/*
 *  audio/spectrum.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Windowed FFT, bar bucketing, smoothing and peak hold
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

use std::sync::Arc;
use std::time::Instant;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::FrequencyScale;
use crate::constants::{
    FFT_SIZE, FREQUENCY_COMPENSATION, MAX_AUDIO_SAMPLES, PEAK_DECAY_PER_SEC, PEAK_FLOOR,
    SMOOTHING_REFERENCE_FPS, SPECTRUM_MAX_HZ, SPECTRUM_MIN_HZ, SPECTRUM_SENSITIVITY,
};

/// Gain for a bar centred on `centre_hz`: first entry whose limit exceeds it.
pub fn compensation_gain(centre_hz: f32) -> f32 {
    FREQUENCY_COMPENSATION
        .iter()
        .find(|(max_hz, _)| *max_hz > centre_hz)
        .map(|(_, g)| *g)
        .unwrap_or(1.0)
}

/// Undo the output volume so the display tracks the signal, not the knob.
/// `None` or a volume ≤ 1% leaves the samples alone.
pub fn compensate_volume(samples: &mut [f32], volume_percent: Option<f64>) {
    let Some(v) = volume_percent else { return };
    if v <= 1.0 {
        return;
    }
    let gain = (100.0 / v) as f32;
    for s in samples.iter_mut() {
        *s = (*s * gain).clamp(-1.0, 1.0);
    }
}

/// Exponential smoothing normalised to 30 fps. `s == 0` or `dt == 0` copies.
pub fn smooth(spectrum: &[f32], smoothed: &mut [f32], s: f32, dt: f32) {
    if s <= 0.0 || dt <= 0.0 {
        smoothed.copy_from_slice(spectrum);
        return;
    }
    let alpha = 1.0 - s.powf(SMOOTHING_REFERENCE_FPS * dt);
    for (out, &v) in smoothed.iter_mut().zip(spectrum) {
        *out = (alpha * v + (1.0 - alpha) * *out).clamp(0.0, 1.0);
    }
}

/// Peak hold with linear fall-off once `hold` seconds have passed.
pub fn hold_peaks(
    smoothed: &[f32],
    peaks: &mut [f32],
    stamps: &mut [Option<Instant>],
    hold: f32,
    dt: f32,
    now: Instant,
) {
    for i in 0..peaks.len() {
        let s = smoothed[i];
        if s > peaks[i] {
            peaks[i] = s;
            stamps[i] = Some(now);
            continue;
        }
        let held_for = stamps[i].map(|t| now.saturating_duration_since(t).as_secs_f32());
        if held_for.is_none_or(|h| h > hold) {
            let mut p = peaks[i] * (1.0 - PEAK_DECAY_PER_SEC * dt).max(0.0);
            p = p.max(s);
            if p < PEAK_FLOOR {
                p = 0.0;
            }
            peaks[i] = p;
        }
    }
}

/// FFT front end: window, transform, normalise, bucket into bars.
pub struct SpectrumEngine {
    sample_rate: u32,
    nfft: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    mags: Vec<f32>,
    scale: FrequencyScale,
    band_edges: Vec<(usize, usize)>,
    centres: Vec<f32>,
    compensate: bool,
}

impl SpectrumEngine {
    pub fn new(sample_rate: u32, bars: usize, scale: FrequencyScale, compensate: bool) -> Self {
        let nfft = FFT_SIZE;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(nfft);

        // Hann
        let denom = (nfft - 1) as f32;
        let window = (0..nfft)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();

        let buf = vec![Complex::new(0.0, 0.0); nfft];
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let bars = bars.max(1);
        let (band_edges, centres) = match scale {
            FrequencyScale::Logarithmic => (
                Self::build_log_bands(sample_rate, nfft, bars),
                Self::log_centres(bars),
            ),
            FrequencyScale::Linear => (
                Self::build_linear_bands(nfft, bars),
                Self::linear_centres(sample_rate, nfft, bars),
            ),
        };

        Self {
            sample_rate,
            nfft,
            fft,
            window,
            buf,
            scratch,
            mags: vec![0.0; nfft / 2],
            scale,
            band_edges,
            centres,
            compensate,
        }
    }

    fn log_edge(t: f32) -> f32 {
        SPECTRUM_MIN_HZ * (SPECTRUM_MAX_HZ / SPECTRUM_MIN_HZ).powf(t)
    }

    /// Inclusive bin ranges per bar on a 40 Hz–20 kHz log scale.
    pub fn build_log_bands(sample_rate: u32, nfft: usize, bars: usize) -> Vec<(usize, usize)> {
        let bin_width = sample_rate as f32 / nfft as f32;
        let last = nfft / 2 - 1;
        (0..bars)
            .map(|i| {
                let f0 = Self::log_edge(i as f32 / bars as f32);
                let f1 = Self::log_edge((i + 1) as f32 / bars as f32);
                let a = ((f0 / bin_width).round() as usize).min(last);
                let b = ((f1 / bin_width).round() as usize).clamp(a, last);
                (a, b)
            })
            .collect()
    }

    pub fn build_linear_bands(nfft: usize, bars: usize) -> Vec<(usize, usize)> {
        let half = nfft / 2;
        let per = (half / bars).max(1);
        (0..bars)
            .map(|i| {
                let a = (i * per).min(half - 1);
                let b = ((i + 1) * per - 1).clamp(a, half - 1);
                (a, b)
            })
            .collect()
    }

    fn log_centres(bars: usize) -> Vec<f32> {
        (0..bars)
            .map(|i| {
                let f0 = Self::log_edge(i as f32 / bars as f32);
                let f1 = Self::log_edge((i + 1) as f32 / bars as f32);
                (f0 * f1).sqrt()
            })
            .collect()
    }

    fn linear_centres(sample_rate: u32, nfft: usize, bars: usize) -> Vec<f32> {
        let bin_width = sample_rate as f32 / nfft as f32;
        let per = ((nfft / 2) / bars).max(1) as f32;
        (0..bars).map(|i| (i as f32 + 0.5) * per * bin_width).collect()
    }

    pub fn sample_rate(&self) -> u32 { self.sample_rate }
    pub fn bars(&self) -> usize { self.band_edges.len() }
    pub fn scale(&self) -> FrequencyScale { self.scale }
    pub fn band_edges(&self) -> &[(usize, usize)] { &self.band_edges }

    /// Bar magnitudes in [0, 1] from the last `N` samples, zero-padded when short.
    pub fn compute(&mut self, samples: &[f32]) -> Vec<f32> {
        let need = self.nfft.min(samples.len());
        let start = samples.len() - need;

        for i in 0..need {
            self.buf[i] = Complex::new(samples[start + i] * self.window[i], 0.0);
        }
        for c in &mut self.buf[need..] {
            *c = Complex::new(0.0, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        let n = self.nfft as f32;
        for (m, c) in self.mags.iter_mut().zip(&self.buf) {
            *m = (c.norm() / n * SPECTRUM_SENSITIVITY).min(1.0);
        }

        self.band_edges
            .iter()
            .zip(&self.centres)
            .map(|(&(a, b), &centre)| {
                // loudest bin wins, averaging flattens narrow tones
                let mut v = self.mags[a..=b].iter().copied().fold(0.0f32, f32::max);
                if self.compensate {
                    v *= compensation_gain(centre);
                }
                v.clamp(0.0, 1.0)
            })
            .collect()
    }
}

/// Sliding sample window plus the per-bar smoothing and peak state.
pub struct SpectrumAnalyzer {
    engine: SpectrumEngine,
    samples: Vec<f32>,
    spectrum: Vec<f32>,
    smoothed: Vec<f32>,
    peaks: Vec<f32>,
    stamps: Vec<Option<Instant>>,
    last_update: Option<Instant>,
    smoothing: f32,
    peak_hold: bool,
    hold_time: f32,
}

impl SpectrumAnalyzer {
    pub fn new(engine: SpectrumEngine, smoothing: f32, peak_hold: bool, hold_time: f32) -> Self {
        let bars = engine.bars();
        Self {
            engine,
            samples: Vec::with_capacity(MAX_AUDIO_SAMPLES),
            spectrum: vec![0.0; bars],
            smoothed: vec![0.0; bars],
            peaks: vec![0.0; bars],
            stamps: vec![None; bars],
            last_update: None,
            smoothing: smoothing.clamp(0.0, 0.999),
            peak_hold,
            hold_time: hold_time.max(0.0),
        }
    }

    /// Append and keep at most `MAX_AUDIO_SAMPLES`, dropping the oldest.
    pub fn push_samples(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
        if self.samples.len() > MAX_AUDIO_SAMPLES {
            let excess = self.samples.len() - MAX_AUDIO_SAMPLES;
            self.samples.drain(..excess);
        }
    }

    /// Rebuild the FFT front end if the capture rate moved.
    pub fn ensure_rate(&mut self, sample_rate: u32) {
        if sample_rate != 0 && sample_rate != self.engine.sample_rate() {
            let bars = self.engine.bars();
            self.engine = SpectrumEngine::new(sample_rate, bars, self.engine.scale(), self.engine.compensate);
        }
    }

    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// Full pipeline; runs on silence too so peaks keep falling.
    pub fn update_at(&mut self, now: Instant) {
        let dt = self
            .last_update
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_update = Some(now);

        self.spectrum = self.engine.compute(&self.samples);
        smooth(&self.spectrum, &mut self.smoothed, self.smoothing, dt);
        if self.peak_hold {
            hold_peaks(&self.smoothed, &mut self.peaks, &mut self.stamps, self.hold_time, dt, now);
        } else {
            self.peaks.copy_from_slice(&self.smoothed);
        }
    }

    pub fn samples(&self) -> &[f32] { &self.samples }
    pub fn spectrum(&self) -> &[f32] { &self.spectrum }
    pub fn smoothed(&self) -> &[f32] { &self.smoothed }
    pub fn peaks(&self) -> &[f32] { &self.peaks }
    pub fn bars(&self) -> usize { self.smoothed.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine(freq: f32, rate: u32, n: usize, amp: f32) -> Vec<f32> {
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_log_bands_edges() {
        let bands = SpectrumEngine::build_log_bands(48_000, 8192, 32);
        assert_eq!(bands.len(), 32);
        // 40 Hz / 5.86 Hz per bin ≈ 6.8
        assert_eq!(bands[0].0, 7);
        assert!(bands[0].1 >= 8 && bands[0].1 <= 9);
        // 20 kHz / 5.86 ≈ 3413
        assert_eq!(bands[31].1, 3413);
        for w in bands.windows(2) {
            assert!(w[1].0 >= w[0].0);
        }
    }

    #[test]
    fn test_linear_bands_cover_half() {
        let bands = SpectrumEngine::build_linear_bands(8192, 32);
        assert_eq!(bands[0], (0, 127));
        assert_eq!(bands[31], (3968, 4095));
    }

    #[test]
    fn test_compensation_table() {
        assert_eq!(compensation_gain(50.0), 0.5);
        assert_eq!(compensation_gain(100.0), 0.8);
        assert_eq!(compensation_gain(3000.0), 5.0);
        assert_eq!(compensation_gain(19_000.0), 10.0);
    }

    #[test]
    fn test_volume_compensation() {
        let mut s = [0.2f32, 0.5, -0.5];
        compensate_volume(&mut s, Some(25.0));
        assert!((s[0] - 0.8).abs() < 1e-6);
        assert_eq!(s[1], 1.0);
        assert_eq!(s[2], -1.0);

        let mut s = [0.2f32];
        compensate_volume(&mut s, Some(1.0));
        assert_eq!(s[0], 0.2);
        compensate_volume(&mut s, None);
        assert_eq!(s[0], 0.2);
    }

    #[test]
    fn test_peak_decay_after_hold() {
        let now = Instant::now();
        let smoothed = [0.5f32];
        let mut peaks = [0.9f32];
        let mut stamps = [Some(now - Duration::from_secs(1))];
        hold_peaks(&smoothed, &mut peaks, &mut stamps, 0.0, 1.0, now);
        assert!((peaks[0] - 0.63).abs() < 1e-5);
    }

    #[test]
    fn test_peak_snaps_to_zero() {
        let now = Instant::now();
        let mut peaks = [0.012f32];
        let mut stamps = [None];
        hold_peaks(&[0.0], &mut peaks, &mut stamps, 0.0, 1.0, now);
        assert_eq!(peaks[0], 0.0);
    }

    #[test]
    fn test_smoothing_zero_copies() {
        let mut out = [0.3f32, 0.3];
        smooth(&[1.0, 0.0], &mut out, 0.0, 0.1);
        assert_eq!(out, [1.0, 0.0]);
        let mut out = [0.3f32];
        smooth(&[1.0], &mut out, 0.5, 0.0);
        assert_eq!(out, [1.0]);
    }

    #[test]
    fn test_tone_lands_in_its_bar() {
        let mut engine = SpectrumEngine::new(48_000, 32, FrequencyScale::Logarithmic, false);
        let tone = sine(1000.0, 48_000, 8192, 0.5);
        let bars = engine.compute(&tone);
        let loudest = bars
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc })
            .0;
        let bin = (1000.0f32 / (48_000.0 / 8192.0)).round() as usize;
        let (a, b) = engine.band_edges()[loudest];
        assert!(a <= bin && bin <= b, "bin {bin} not in bar {loudest} ({a}..={b})");
    }

    #[test]
    fn test_silence_decays_and_keeps_invariants() {
        let engine = SpectrumEngine::new(48_000, 16, FrequencyScale::Logarithmic, true);
        let mut an = SpectrumAnalyzer::new(engine, 0.5, true, 0.0);
        let t0 = Instant::now();
        an.push_samples(&sine(440.0, 48_000, 8192, 0.8));
        an.update_at(t0);
        let first: f32 = an.peaks().iter().sum();
        assert!(first > 0.0);

        an.push_samples(&vec![0.0; 8192]);
        for k in 1..40 {
            an.update_at(t0 + Duration::from_millis(100 * k));
            assert_eq!(an.spectrum().len(), 16);
            for (p, s) in an.peaks().iter().zip(an.smoothed()) {
                assert!(p >= s);
                assert!((0.0..=1.0).contains(s));
            }
        }
        let last: f32 = an.peaks().iter().sum();
        assert!(last < first);
    }

    #[test]
    fn test_short_buffer_still_runs() {
        let engine = SpectrumEngine::new(48_000, 8, FrequencyScale::Linear, false);
        let mut an = SpectrumAnalyzer::new(engine, 0.0, true, 0.5);
        an.push_samples(&[0.0; 100]);
        an.update_at(Instant::now());
        assert_eq!(an.smoothed().len(), 8);
        assert_eq!(an.samples().len(), 100);
    }

    #[test]
    fn test_sliding_buffer_trims_head() {
        let engine = SpectrumEngine::new(48_000, 8, FrequencyScale::Linear, false);
        let mut an = SpectrumAnalyzer::new(engine, 0.0, false, 0.0);
        an.push_samples(&vec![0.1; 8000]);
        an.push_samples(&vec![0.2; 500]);
        assert_eq!(an.samples().len(), MAX_AUDIO_SAMPLES);
        assert_eq!(*an.samples().last().unwrap(), 0.2);
    }
}
