/*
 *  widgets/memory.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Memory usage tile
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

use crate::bitmap::GrayImage;
use crate::config::{DisplayMode, WidgetConfig};
use crate::error::WidgetResult;
use crate::metric_renderer::MetricRenderer;
use crate::metrics::{MemoryProvider, ProcMemory};
use crate::ringbuf::RingBuffer;
use crate::widget::{read_state, write_state, BaseWidget, Widget};

struct MemoryState {
    used: f64,
    history: RingBuffer<f64>,
}

pub struct MemoryWidget {
    base: BaseWidget,
    renderer: MetricRenderer,
    mode: DisplayMode,
    provider: Box<dyn MemoryProvider>,
    state: RwLock<MemoryState>,
}

impl MemoryWidget {
    pub fn with_provider(cfg: &WidgetConfig, provider: Box<dyn MemoryProvider>) -> Self {
        Self {
            base: BaseWidget::from_config(cfg),
            renderer: MetricRenderer::from_config(cfg),
            mode: cfg.mode,
            provider,
            state: RwLock::new(MemoryState { used: 0.0, history: RingBuffer::new(cfg.graph.history.max(1)) }),
        }
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(MemoryWidget::with_provider(cfg, Box::new(ProcMemory::new()))))
}

impl Widget for MemoryWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        let vm = self.provider.virtual_memory()?;
        let mut st = write_state(&self.state);
        st.used = vm.used_percent;
        st.history.push(vm.used_percent);
        Ok(())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        {
            let st = read_state(&self.state);
            self.renderer
                .render(&mut img, self.base.content_area(), self.mode, st.used, &st.history.snapshot());
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::VirtualMemory;

    struct Fixed(f64);

    impl MemoryProvider for Fixed {
        fn virtual_memory(&self) -> WidgetResult<VirtualMemory> {
            Ok(VirtualMemory { total: 100, available: 100 - self.0 as u64, used_percent: self.0 })
        }
    }

    #[test]
    fn test_out_of_range_renders_as_endpoint() {
        let mut cfg = WidgetConfig::new("memory", "mem", 30, 6);
        cfg.mode = DisplayMode::Bar;
        let over = MemoryWidget::with_provider(&cfg, Box::new(Fixed(180.0)));
        let full = MemoryWidget::with_provider(&cfg, Box::new(Fixed(100.0)));
        over.update().unwrap();
        full.update().unwrap();
        assert_eq!(over.render().unwrap(), full.render().unwrap());
    }
}
