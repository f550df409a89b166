/*
 *  tests/properties.rs
 *
 *  Invariants that hold across widgets and primitives
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lumadeck::audio::capture::CaptureError;
use lumadeck::audio::notifier::DeviceNotifier;
use lumadeck::audio::{SpectrumAnalyzer, SpectrumEngine};
use lumadeck::config::{AutoHideConfig, DisplayMode, FrequencyScale, StyleConfig, WidgetConfig};
use lumadeck::fonts::FontFace;
use lumadeck::metrics::{BatteryProvider, BatteryStatus, CpuProvider, MemoryProvider, VirtualMemory};
use lumadeck::ringbuf::RingBuffer;
use lumadeck::widget::AutoHide;
use lumadeck::widgets::keyboard_layout::StaticLayout;
use lumadeck::widgets::{
    AudioVisualizerWidget, BatteryWidget, ClockWidget, CpuWidget, GameOfLifeWidget, KeyboardLayoutWidget,
    MemoryWidget,
};
use lumadeck::wordwrap::{truncate_with_ellipsis, wrap_text, WordBreak};
use lumadeck::{Widget, WidgetResult};

struct Cpu(Vec<f64>);

impl CpuProvider for Cpu {
    fn counts(&self, _logical: bool) -> WidgetResult<usize> {
        Ok(self.0.len())
    }
    fn percent(&self, _interval: Duration, _per_core: bool) -> WidgetResult<Vec<f64>> {
        Ok(self.0.clone())
    }
}

struct Memory(f64);

impl MemoryProvider for Memory {
    fn virtual_memory(&self) -> WidgetResult<VirtualMemory> {
        Ok(VirtualMemory { used_percent: self.0, ..VirtualMemory::default() })
    }
}

struct Battery;

impl BatteryProvider for Battery {
    fn battery_status(&self) -> WidgetResult<BatteryStatus> {
        Ok(BatteryStatus { percentage: 64.0, has_battery: true, ..BatteryStatus::default() })
    }
}

fn deck(w: u32, h: u32, mode: DisplayMode) -> Vec<Arc<dyn Widget>> {
    let cfg = |kind: &str| {
        let mut c = WidgetConfig::new(kind, kind, w, h);
        c.mode = mode;
        c.style = StyleConfig { background: 0, border: 255, padding: 1 };
        c
    };
    vec![
        Arc::new(ClockWidget::new(&cfg("clock"))),
        Arc::new(CpuWidget::with_provider(&cfg("cpu"), Box::new(Cpu(vec![12.0, 180.0, -5.0, 50.0])))),
        Arc::new(MemoryWidget::with_provider(&cfg("memory"), Box::new(Memory(42.0)))),
        Arc::new(BatteryWidget::with_provider(&cfg("battery"), Box::new(Battery))),
        Arc::new(KeyboardLayoutWidget::with_provider(
            &cfg("keyboard_layout"),
            Box::new(StaticLayout("de".into())),
        )),
        Arc::new(GameOfLifeWidget::new(&cfg("game_of_life"))),
        Arc::new(AudioVisualizerWidget::with_source(
            &cfg("audio_visualizer"),
            Err(CaptureError::PlatformUnsupported("test".into())),
            Box::new(|| None),
        )),
    ]
}

#[test]
fn rendered_tiles_match_their_geometry() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..12 {
        let (w, h) = (rng.random_range(1..160), rng.random_range(1..64));
        for mode in [DisplayMode::Text, DisplayMode::Bar, DisplayMode::Graph, DisplayMode::Gauge] {
            for widget in deck(w, h, mode) {
                let _ = widget.update();
                let _ = widget.update();
                if let Some(img) = widget.render().unwrap() {
                    assert_eq!((img.width(), img.height()), (w, h), "{} {w}x{h}", widget.name());
                }
            }
        }
    }
}

#[test]
fn out_of_range_metrics_render_as_endpoints() {
    for mode in [DisplayMode::Bar, DisplayMode::Gauge, DisplayMode::Text] {
        let mut cfg = WidgetConfig::new("memory", "m", 64, 24);
        cfg.mode = mode;
        cfg.text.format = "{value}%".into();
        let render = |v: f64| {
            let w = MemoryWidget::with_provider(&cfg, Box::new(Memory(v)));
            w.update().unwrap();
            w.render().unwrap().unwrap()
        };
        if mode != DisplayMode::Text {
            assert_eq!(render(250.0), render(100.0), "{mode:?}");
            assert_eq!(render(-30.0), render(0.0), "{mode:?}");
        }
        assert_eq!(render(f64::NAN), render(0.0), "{mode:?}");
    }
}

#[test]
fn ring_buffer_snapshot_is_sliding_window() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let cap = rng.random_range(1..20);
        let k = rng.random_range(0..60);
        let mut rb = RingBuffer::new(cap);
        let xs: Vec<u32> = (0..k).map(|_| rng.random()).collect();
        for &x in &xs {
            rb.push(x);
        }
        let start = xs.len().saturating_sub(cap);
        assert_eq!(rb.snapshot(), xs[start..].to_vec());
    }
}

#[test]
fn analyzer_keeps_bar_count_and_peak_bound() {
    let mut rng = StdRng::seed_from_u64(3);
    for scale in [FrequencyScale::Logarithmic, FrequencyScale::Linear] {
        let engine = SpectrumEngine::new(44_100, 24, scale, true);
        let mut a = SpectrumAnalyzer::new(engine, 0.6, true, 0.2);
        let t0 = Instant::now();
        for step in 0..40u64 {
            let n = rng.random_range(0..3000);
            let gain: f32 = if step % 7 < 3 { 0.0 } else { rng.random_range(0.0..1.0) };
            let block: Vec<f32> = (0..n).map(|_| gain * rng.random_range(-1.0f32..1.0)).collect();
            a.push_samples(&block);
            a.update_at(t0 + Duration::from_millis(33 * step));
            assert_eq!(a.spectrum().len(), 24);
            assert_eq!(a.smoothed().len(), 24);
            assert_eq!(a.peaks().len(), 24);
            for (p, s) in a.peaks().iter().zip(a.smoothed()) {
                assert!(*p >= *s || *p == 0.0 && *s < 0.01, "peak {p} < smoothed {s}");
            }
        }
    }
}

#[test]
fn auto_hide_tracks_the_last_trigger() {
    let ah = AutoHide::new(Duration::from_secs(2));
    let t0 = Instant::now();
    ah.trigger_at(t0);
    ah.trigger_at(t0 + Duration::from_secs(1));
    assert!(!ah.should_hide_at(t0 + Duration::from_millis(2500)));
    assert!(!ah.should_hide_at(t0 + Duration::from_secs(3)));
    assert!(ah.should_hide_at(t0 + Duration::from_millis(3001)));

    let mut cfg = WidgetConfig::new("memory", "m", 16, 8);
    cfg.auto_hide = AutoHideConfig { enabled: true, timeout: 2.0 };
    let w = MemoryWidget::with_provider(&cfg, Box::new(Memory(10.0)));
    w.update().unwrap();
    // readings alone do not wake an auto-hidden metric tile
    assert!(w.render().unwrap().is_none());
}

#[test]
fn notifier_holds_one_pending_signal() {
    let n = DeviceNotifier::new();
    let a = n.subscribe();
    let b = n.subscribe();
    for _ in 0..5 {
        n.notify_subscribers();
    }
    assert!(a.try_recv());
    assert!(!a.try_recv());
    drop(b);
    // a dropped receiver is harmless
    n.notify_subscribers();
    assert!(a.try_recv());

    let before = n.subscriber_count();
    n.unsubscribe(9_999);
    assert_eq!(n.subscriber_count(), before);
}

#[test]
fn wrap_round_trips() {
    let measure = |s: &str| s.chars().count() as u32 * 6;
    let text = "the  quick brown fox\tjumps over   the lazy dog and keeps on running";
    let lines = wrap_text(text, 60, WordBreak::Normal, measure);
    assert!(lines.iter().all(|l| measure(l) <= 60));
    let normalized: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(lines.join(" "), normalized.join(" "));

    let lines = wrap_text(text, 40, WordBreak::BreakAll, measure);
    assert!(lines.iter().all(|l| measure(l) <= 40));
    assert_eq!(lines.concat(), text);

    // forced breaks survive
    let lines = wrap_text("one\ntwo", 600, WordBreak::Normal, measure);
    assert_eq!(lines, vec!["one", "two"]);
}

#[test]
fn ellipsis_fits_container() {
    let face = FontFace::nearest(8);
    let measure = |s: &str| face.text_width(s);
    let text = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor";
    let ellipsis = measure("\u{2026}");
    for width in [1u32, 4, ellipsis.saturating_sub(1), ellipsis, 30, 48, 64, 100] {
        let lines = wrap_text(text, width, WordBreak::BreakAll, measure);
        let kept = truncate_with_ellipsis(lines.clone(), 2, width, measure);
        if lines.len() > 2 {
            assert_eq!(kept.len(), 2);
            let last = kept.last().unwrap();
            assert!(measure(last) <= width, "{last:?} at {width}");
            if width >= ellipsis {
                assert!(last.ends_with('\u{2026}'), "{last:?}");
            } else {
                assert!(last.is_empty(), "{last:?}");
            }
        } else {
            assert_eq!(kept, lines);
        }
    }
}
