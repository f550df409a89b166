/*
 *  tests/scenarios.rs
 *
 *  End-to-end scenarios against the library
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use std::time::Instant;

use chrono::{TimeZone, Utc};

use lumadeck::audio::spectrum::{compensate_volume, hold_peaks, SpectrumEngine};
use lumadeck::bitmap::{luma_or, GrayImage};
use lumadeck::config::{BarDirection, DisplayMode, WidgetConfig};
use lumadeck::draw::Rect;
use lumadeck::metric_renderer::MetricRenderer;
use lumadeck::metrics::{MemoryProvider, VirtualMemory};
use lumadeck::ringbuf::RingBuffer;
use lumadeck::telegram::{format_header, Message};
use lumadeck::widgets::MemoryWidget;
use lumadeck::{Widget, WidgetResult};

struct FixedMemory(f64);

impl MemoryProvider for FixedMemory {
    fn virtual_memory(&self) -> WidgetResult<VirtualMemory> {
        Ok(VirtualMemory { used_percent: self.0, ..VirtualMemory::default() })
    }
}

#[test]
fn s1_ring_buffer_keeps_newest_three() {
    let mut rb = RingBuffer::new(3);
    for v in 1..=5 {
        rb.push(v);
    }
    assert_eq!(rb.snapshot(), vec![3, 4, 5]);
    assert_eq!(rb.len(), 3);
}

#[test]
fn s2_horizontal_bar_at_75_percent() {
    let mut cfg = WidgetConfig::new("memory", "mem", 128, 40);
    cfg.mode = DisplayMode::Bar;
    cfg.bar.direction = BarDirection::Horizontal;
    cfg.bar.border = false;
    cfg.colors.fill = 255;
    let w = MemoryWidget::with_provider(&cfg, Box::new(FixedMemory(75.0)));
    w.update().unwrap();
    let img = w.render().unwrap().unwrap();
    assert_eq!((img.width(), img.height()), (128, 40));
    for y in 0..40 {
        for x in 0..128 {
            let want = if x < 96 { 255 } else { 0 };
            assert_eq!(img.get(x, y), Some(want), "pixel ({x},{y})");
        }
    }
}

#[test]
fn s3_gauge_needle_is_vertical_at_half() {
    let cfg = WidgetConfig::new("cpu", "g", 64, 40);
    let renderer = MetricRenderer::from_config(&cfg);
    let mut img = GrayImage::new(64, 40, 0);
    renderer.render(&mut img, Rect::new(0, 0, 64, 40), DisplayMode::Gauge, 50.0, &[]);
    let needle = luma_or(cfg.gauge.needle_color, 255);
    // from the bottom centre upward
    for y in 12..40 {
        assert_eq!(img.get(32, y), Some(needle), "row {y}");
    }
    assert_eq!(img.get(31, 25), Some(0));
    assert_eq!(img.get(33, 25), Some(0));
}

#[test]
fn s4_log_bucketing_edges() {
    let bands = SpectrumEngine::build_log_bands(48_000, 8192, 32);
    assert_eq!(bands.len(), 32);
    let bin_width = 48_000.0 / 8192.0;
    // bar 0 starts at 40 Hz and spans a couple of bins
    let (a, b) = bands[0];
    assert_eq!(a, (40.0f32 / bin_width).round() as usize);
    assert!((8..=10).contains(&b));
    // last bar ends at 20 kHz
    let (_, b) = bands[31];
    assert_eq!(b, (20_000.0f32 / bin_width).round() as usize);
}

#[test]
fn s4_loudest_bin_wins_over_average() {
    let mut engine = SpectrumEngine::new(48_000, 32, lumadeck::config::FrequencyScale::Linear, false);
    // a tone sitting in bar 0 of a linear split
    let hz = 2.0 * 48_000.0 / 8192.0 * 10.0;
    let samples: Vec<f32> =
        (0..8192).map(|i| 0.02 * (2.0 * std::f32::consts::PI * hz * i as f32 / 48_000.0).sin()).collect();
    let bars = engine.compute(&samples);
    let (a, b) = engine.band_edges()[0];
    assert!(b > a);
    // one hot bin among ~128: an average would be far below the peak
    assert!(bars[0] > 0.3, "bar 0 = {}", bars[0]);
}

#[test]
fn s5_peak_decay_after_hold() {
    let now = Instant::now();
    let smoothed = [0.5f32];
    let mut peaks = [0.9f32];
    let mut stamps = [Some(now)];
    hold_peaks(&smoothed, &mut peaks, &mut stamps, 0.0, 1.0, now + std::time::Duration::from_secs(1));
    assert!((peaks[0] - 0.63).abs() < 1e-5, "peak = {}", peaks[0]);
}

#[test]
fn s6_header_tokens() {
    let msg = Message {
        sender_name: Some("Alice".into()),
        chat_title: "Team".into(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 13, 7, 0).unwrap(),
        ..Message::default()
    };
    assert_eq!(format_header("{sender} ({chat}) {time}", &msg, &Utc), "Alice (Team) 13:07");
}

#[test]
fn s7_volume_compensation() {
    let mut samples = [0.2f32, 0.5];
    compensate_volume(&mut samples, Some(25.0));
    assert!((samples[0] - 0.8).abs() < 1e-6);
    assert_eq!(samples[1], 1.0);

    let mut quiet = [0.2f32];
    compensate_volume(&mut quiet, Some(1.0));
    assert_eq!(quiet[0], 0.2);
}
