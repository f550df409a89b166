/*
 *  widgets/battery.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Battery charge tile
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

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{BatteryConfig, DisplayMode, WidgetConfig};
use crate::error::WidgetResult;
use crate::fonts::{draw_status, draw_text_aligned};
use crate::metric_renderer::{format_value, MetricRenderer};
use crate::metrics::{BatteryProvider, BatteryStatus, SysBattery};
use crate::ringbuf::RingBuffer;
use crate::widget::{read_state, write_state, BaseWidget, Widget};

/// Text-mode label: `!` marks a low battery, `+` charging.
pub fn battery_label(format: &str, st: &BatteryStatus, cfg: &BatteryConfig) -> String {
    let mut s = format_value(format, st.percentage);
    if st.is_charging && cfg.show_charging {
        s.push('+');
    } else if st.percentage < cfg.low_threshold {
        s.insert(0, '!');
    }
    s
}

struct BatteryState {
    status: Option<BatteryStatus>,
    history: RingBuffer<f64>,
}

pub struct BatteryWidget {
    base: BaseWidget,
    renderer: MetricRenderer,
    mode: DisplayMode,
    battery: BatteryConfig,
    provider: Box<dyn BatteryProvider>,
    state: RwLock<BatteryState>,
}

impl BatteryWidget {
    pub fn with_provider(cfg: &WidgetConfig, provider: Box<dyn BatteryProvider>) -> Self {
        Self {
            base: BaseWidget::from_config(cfg),
            renderer: MetricRenderer::from_config(cfg),
            mode: cfg.mode,
            battery: cfg.battery,
            provider,
            state: RwLock::new(BatteryState { status: None, history: RingBuffer::new(cfg.graph.history.max(1)) }),
        }
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(BatteryWidget::with_provider(cfg, Box::new(SysBattery::new()))))
}

impl Widget for BatteryWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        let status = self.provider.battery_status()?;
        let mut st = write_state(&self.state);
        if status.has_battery {
            st.history.push(status.percentage);
        }
        st.status = Some(status);
        Ok(())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        let area = self.base.content_area();
        let text_color = luma_or(self.renderer.colors.text, 255);
        {
            let st = read_state(&self.state);
            match &st.status {
                None => draw_status(&mut img, "...", text_color),
                Some(s) if !s.has_battery => draw_status(&mut img, "No Battery", text_color),
                Some(s) if self.mode == DisplayMode::Text => {
                    let label = battery_label(&self.renderer.text.format, s, &self.battery);
                    let align = self.renderer.text.align;
                    draw_text_aligned(&mut img, self.renderer.face(), &label, area, align.h, align.v, 0, text_color);
                }
                Some(s) => self.renderer.render(&mut img, area, self.mode, s.percentage, &st.history.snapshot()),
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(BatteryStatus);

    impl BatteryProvider for Fixed {
        fn battery_status(&self) -> WidgetResult<BatteryStatus> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_labels() {
        let cfg = BatteryConfig::default();
        let mut st = BatteryStatus { percentage: 15.0, has_battery: true, ..BatteryStatus::default() };
        assert_eq!(battery_label("{value}%", &st, &cfg), "!15%");
        st.is_charging = true;
        assert_eq!(battery_label("{value}%", &st, &cfg), "15%+");
    }

    #[test]
    fn test_no_battery_status_tile() {
        let w = BatteryWidget::with_provider(&WidgetConfig::new("battery", "b", 64, 12), Box::new(Fixed(BatteryStatus::default())));
        w.update().unwrap();
        let img = w.render().unwrap().unwrap();
        assert!(img.count_not(0) > 0);
        assert!(read_state(&w.state).history.is_empty());
    }
}
