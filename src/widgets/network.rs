/*
 *  widgets/network.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Network throughput tile
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

use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{DisplayMode, NetworkConfig, WidgetConfig};
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::draw_text_aligned;
use crate::metric_renderer::MetricRenderer;
use crate::metrics::{IoCounters, NetworkProvider, ProcNetwork};
use crate::ringbuf::RingBuffer;
use crate::widget::{read_state, write_state, BaseWidget, Widget};

/// Compact byte rate: `512B`, `12.3K`, `4.1M`, `1.0G`.
pub fn human_rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["B", "K", "M", "G"];
    let mut v = bytes_per_sec.max(0.0);
    let mut i = 0;
    while v >= 1024.0 && i + 1 < UNITS.len() {
        v /= 1024.0;
        i += 1;
    }
    if i == 0 { format!("{:.0}{}", v, UNITS[i]) } else { format!("{:.1}{}", v, UNITS[i]) }
}

#[derive(Default)]
struct NetState {
    last: Option<(IoCounters, Instant)>,
    down: f64,
    up: f64,
    observed_max: f64,
    percent: f64,
    history: RingBuffer<f64>,
}

pub struct NetworkWidget {
    base: BaseWidget,
    renderer: MetricRenderer,
    mode: DisplayMode,
    net: NetworkConfig,
    provider: Box<dyn NetworkProvider>,
    state: RwLock<NetState>,
}

impl NetworkWidget {
    pub fn with_provider(cfg: &WidgetConfig, provider: Box<dyn NetworkProvider>) -> Self {
        Self {
            base: BaseWidget::from_config(cfg),
            renderer: MetricRenderer::from_config(cfg),
            mode: cfg.mode,
            net: cfg.network.clone(),
            provider,
            state: RwLock::new(NetState {
                history: RingBuffer::new(cfg.graph.history.max(1)),
                ..NetState::default()
            }),
        }
    }

    fn read_counters(&self) -> WidgetResult<IoCounters> {
        match &self.net.interface {
            None => self
                .provider
                .io_counters(false)?
                .into_iter()
                .next()
                .ok_or_else(|| WidgetError::Provider("no network counters".into())),
            Some(name) => self
                .provider
                .io_counters(true)?
                .into_iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| WidgetError::Provider(format!("interface {name} not found"))),
        }
    }

    pub fn update_at(&self, now: Instant) -> WidgetResult<()> {
        let cur = self.read_counters()?;
        let mut st = write_state(&self.state);
        if let Some((prev, at)) = st.last.take() {
            let dt = now.saturating_duration_since(at).as_secs_f64();
            if dt > 0.0 {
                // counter resets (interface down/up) read as zero
                st.down = cur.bytes_recv.saturating_sub(prev.bytes_recv) as f64 / dt;
                st.up = cur.bytes_sent.saturating_sub(prev.bytes_sent) as f64 / dt;
                let peak = st.down.max(st.up);
                st.observed_max = st.observed_max.max(peak);
                let scale = self.net.max_speed.filter(|m| *m > 0.0).unwrap_or(st.observed_max);
                st.percent = if scale > 0.0 { 100.0 * peak / scale } else { 0.0 };
                let p = st.percent;
                st.history.push(p);
            }
        }
        st.last = Some((cur, now));
        Ok(())
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(NetworkWidget::with_provider(cfg, Box::new(ProcNetwork::new()))))
}

impl Widget for NetworkWidget {
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
        {
            let st = read_state(&self.state);
            if self.mode == DisplayMode::Text {
                let text = format!("D{} U{}", human_rate(st.down), human_rate(st.up));
                let align = self.renderer.text.align;
                let color = luma_or(self.renderer.colors.text, 255);
                draw_text_aligned(&mut img, self.renderer.face(), &text, area, align.h, align.v, 0, color);
            } else {
                self.renderer.render(&mut img, area, self.mode, st.percent, &st.history.snapshot());
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Counters(Mutex<u64>);

    impl NetworkProvider for Counters {
        fn io_counters(&self, _per: bool) -> WidgetResult<Vec<IoCounters>> {
            let mut n = self.0.lock().unwrap();
            *n += 2048;
            Ok(vec![IoCounters { name: "all".into(), bytes_recv: *n, bytes_sent: *n / 2 }])
        }
    }

    #[test]
    fn test_human_rate() {
        assert_eq!(human_rate(512.0), "512B");
        assert_eq!(human_rate(2048.0), "2.0K");
        assert_eq!(human_rate(3.5 * 1024.0 * 1024.0), "3.5M");
    }

    #[test]
    fn test_rate_against_observed_max() {
        let w = NetworkWidget::with_provider(&WidgetConfig::new("network", "net", 64, 10), Box::new(Counters(Mutex::new(0))));
        let t0 = Instant::now();
        w.update_at(t0).unwrap();
        w.update_at(t0 + Duration::from_secs(1)).unwrap();
        let st = read_state(&w.state);
        assert_eq!(st.down, 2048.0);
        assert_eq!(st.up, 1024.0);
        assert_eq!(st.percent, 100.0);
    }

    #[test]
    fn test_missing_interface_is_provider_error() {
        let mut cfg = WidgetConfig::new("network", "net", 64, 10);
        cfg.network.interface = Some("wlan9".into());
        let w = NetworkWidget::with_provider(&cfg, Box::new(Counters(Mutex::new(0))));
        assert!(matches!(w.update(), Err(WidgetError::Provider(_))));
    }
}
