/*
 *  widgets/volume.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Output volume tile
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
use std::time::{Duration, Instant};

use log::warn;

use crate::audio::notifier::shared_notifier;
use crate::audio::volume::{default_reader, VolumeMonitor, VolumeReading};
use crate::audio::shared_volume;
use crate::bitmap::{luma_or, GrayImage};
use crate::config::{DisplayMode, WidgetConfig};
use crate::constants::VOLUME_POLL_DEFAULT;
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::draw_status;
use crate::metric_renderer::MetricRenderer;
use crate::ringbuf::RingBuffer;
use crate::widget::{read_state, write_state, BaseWidget, Stoppable, Widget};

enum Source {
    Shared(&'static VolumeMonitor),
    Owned(VolumeMonitor),
    Failed(WidgetError),
}

struct VolumeState {
    reading: Option<VolumeReading>,
    history: RingBuffer<f64>,
}

pub struct VolumeWidget {
    base: BaseWidget,
    renderer: MetricRenderer,
    mode: DisplayMode,
    source: Source,
    state: RwLock<VolumeState>,
}

impl VolumeWidget {
    fn build(cfg: &WidgetConfig, source: Source) -> Self {
        Self {
            base: BaseWidget::from_config(cfg),
            renderer: MetricRenderer::from_config(cfg),
            mode: cfg.mode,
            source,
            state: RwLock::new(VolumeState { reading: None, history: RingBuffer::new(cfg.graph.history.max(1)) }),
        }
    }

    /// Poll through a monitor this widget owns and stops.
    pub fn with_monitor(cfg: &WidgetConfig, monitor: VolumeMonitor) -> Self {
        Self::build(cfg, Source::Owned(monitor))
    }

    fn monitor(&self) -> Result<&VolumeMonitor, &WidgetError> {
        match &self.source {
            Source::Shared(m) => Ok(m),
            Source::Owned(m) => Ok(m),
            Source::Failed(e) => Err(e),
        }
    }

    pub fn update_at(&self, now: Instant) -> WidgetResult<()> {
        let monitor = self.monitor().map_err(Clone::clone)?;
        let reading = match monitor.current() {
            None => return Ok(()),
            Some(Err(e)) => return Err(e),
            Some(Ok(r)) => r,
        };
        let mut st = write_state(&self.state);
        // first reading only establishes the baseline
        if st.reading.is_some_and(|prev| prev != reading) {
            self.base.trigger_at(now);
        }
        st.reading = Some(reading);
        st.history.push(if reading.muted { 0.0 } else { reading.percent });
        Ok(())
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    let interval = Duration::from_millis(cfg.volume.poll_interval_ms.max(1));
    let source = if interval == VOLUME_POLL_DEFAULT {
        match shared_volume() {
            Ok(m) => Source::Shared(m),
            Err(e) => Source::Failed(e),
        }
    } else {
        let devices = shared_notifier().ok().map(|n| n.subscribe());
        match VolumeMonitor::start(default_reader(), interval, devices) {
            Ok(m) => Source::Owned(m),
            Err(e) => Source::Failed(e),
        }
    };
    if let Source::Failed(e) = &source {
        warn!("volume widget without a reader: {}", e);
    }
    Ok(Arc::new(VolumeWidget::build(cfg, source)))
}

impl Widget for VolumeWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        self.update_at(Instant::now())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        let text_color = luma_or(self.renderer.colors.text, 255);
        {
            let st = read_state(&self.state);
            match (self.monitor(), st.reading) {
                (Err(_), _) => draw_status(&mut img, "ERR", text_color),
                (Ok(_), None) => draw_status(&mut img, "...", text_color),
                (Ok(_), Some(r)) if r.muted => draw_status(&mut img, "MUTE", text_color),
                (Ok(_), Some(r)) => {
                    self.renderer
                        .render(&mut img, self.base.content_area(), self.mode, r.percent, &st.history.snapshot());
                }
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }
}

impl Stoppable for VolumeWidget {
    fn stop(&self) {
        // the shared monitor outlives any single widget
        if let Source::Owned(m) = &self.source {
            m.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VolumeReader;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Stepping(Arc<AtomicU32>);

    impl VolumeReader for Stepping {
        fn get_volume(&mut self) -> WidgetResult<VolumeReading> {
            Ok(VolumeReading { percent: f64::from(self.0.load(Ordering::SeqCst)), muted: false })
        }
    }

    fn wait_for(w: &VolumeWidget, pct: f64) {
        for _ in 0..200 {
            w.update_at(Instant::now()).unwrap();
            if read_state(&w.state).reading.map(|r| r.percent) == Some(pct) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("volume never reached {pct}");
    }

    #[test]
    fn test_change_triggers_auto_hide() {
        let level = Arc::new(AtomicU32::new(30));
        let monitor = VolumeMonitor::start(Box::new(Stepping(level.clone())), Duration::from_millis(2), None).unwrap();
        let mut cfg = WidgetConfig::new("volume", "vol", 32, 8);
        cfg.auto_hide.enabled = true;
        cfg.auto_hide.timeout = 60.0;
        let w = VolumeWidget::with_monitor(&cfg, monitor);

        wait_for(&w, 30.0);
        // baseline only: still hidden
        assert!(w.render().unwrap().is_none());

        level.store(70, Ordering::SeqCst);
        wait_for(&w, 70.0);
        assert!(w.render().unwrap().is_some());
        w.stop();
    }
}
