/*
 *  widgets/cpu.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  CPU load tile, aggregate or per-core grid
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
use std::time::Duration;

use crate::bitmap::GrayImage;
use crate::config::{DisplayMode, PerCoreConfig, WidgetConfig};
use crate::error::{WidgetError, WidgetResult};
use crate::metric_renderer::{transpose, MetricRenderer};
use crate::metrics::{CpuProvider, ProcCpu};
use crate::ringbuf::RingBuffer;
use crate::widget::{read_state, write_state, BaseWidget, Widget};

struct CpuState {
    total: f64,
    cores: Vec<f64>,
    history: RingBuffer<f64>,
    core_history: RingBuffer<Vec<f64>>,
}

pub struct CpuWidget {
    base: BaseWidget,
    renderer: MetricRenderer,
    mode: DisplayMode,
    per_core: PerCoreConfig,
    provider: Box<dyn CpuProvider>,
    state: RwLock<CpuState>,
}

impl CpuWidget {
    pub fn with_provider(cfg: &WidgetConfig, provider: Box<dyn CpuProvider>) -> Self {
        let cap = cfg.graph.history.max(1);
        Self {
            base: BaseWidget::from_config(cfg),
            renderer: MetricRenderer::from_config(cfg),
            mode: cfg.mode,
            per_core: cfg.per_core,
            provider,
            state: RwLock::new(CpuState {
                total: 0.0,
                cores: Vec::new(),
                history: RingBuffer::new(cap),
                core_history: RingBuffer::new(cap),
            }),
        }
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(CpuWidget::with_provider(cfg, Box::new(ProcCpu::new()))))
}

impl Widget for CpuWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        // zero interval: delta against the previous tick, never blocks
        let cores = self.provider.percent(Duration::ZERO, true)?;
        if cores.is_empty() {
            return Err(WidgetError::Provider("cpu provider returned no cores".into()));
        }
        let total = cores.iter().sum::<f64>() / cores.len() as f64;

        let mut st = write_state(&self.state);
        st.total = total;
        st.history.push(total);
        if self.per_core.enabled {
            st.core_history.push(cores.clone());
            st.cores = cores;
        }
        Ok(())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        let area = self.base.content_area();
        {
            let st = read_state(&self.state);
            if self.per_core.enabled && !st.cores.is_empty() {
                let histories = transpose(&st.core_history.snapshot());
                self.renderer.render_grid(&mut img, area, self.mode, &st.cores, &histories, &self.per_core);
            } else {
                self.renderer.render(&mut img, area, self.mode, st.total, &st.history.snapshot());
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

    struct Scripted(Mutex<Vec<Vec<f64>>>);

    impl CpuProvider for Scripted {
        fn counts(&self, _logical: bool) -> WidgetResult<usize> {
            Ok(2)
        }
        fn percent(&self, _i: Duration, _per_core: bool) -> WidgetResult<Vec<f64>> {
            self.0.lock().unwrap().pop().ok_or_else(|| WidgetError::Provider("drained".into()))
        }
    }

    fn cfg(mode: DisplayMode, per_core: bool) -> WidgetConfig {
        let mut c = WidgetConfig::new("cpu", "cpu", 40, 20);
        c.mode = mode;
        c.per_core.enabled = per_core;
        c
    }

    #[test]
    fn test_aggregate_is_core_mean() {
        let w = CpuWidget::with_provider(&cfg(DisplayMode::Bar, false), Box::new(Scripted(Mutex::new(vec![vec![100.0, 0.0]]))));
        w.update().unwrap();
        assert_eq!(read_state(&w.state).total, 50.0);
        // half-width horizontal bar
        let img = w.render().unwrap().unwrap();
        assert_eq!(img.get(19, 10), Some(255));
        assert_eq!(img.get(20, 10), Some(0));
        // provider failure surfaces as an error, state is kept
        assert!(w.update().is_err());
        assert_eq!(read_state(&w.state).history.len(), 1);
    }

    #[test]
    fn test_per_core_history_is_transposed() {
        let script = vec![vec![30.0, 40.0], vec![10.0, 20.0]];
        let w = CpuWidget::with_provider(&cfg(DisplayMode::Graph, true), Box::new(Scripted(Mutex::new(script))));
        w.update().unwrap();
        w.update().unwrap();
        let st = read_state(&w.state);
        assert_eq!(transpose(&st.core_history.snapshot()), vec![vec![10.0, 30.0], vec![20.0, 40.0]]);
        drop(st);
        let img = w.render().unwrap().unwrap();
        assert_eq!((img.width(), img.height()), (40, 20));
    }
}
