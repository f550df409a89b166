/*
 *  widgets/weather.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Current conditions tile
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

use log::warn;

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{AlignConfig, WeatherConfig, WidgetConfig};
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::{draw_status, draw_text_aligned, load_font_or_default, FontFace};
use crate::weather::{format_weather, Location, OpenMeteo, Units, WeatherConditions, WeatherPoller};
use crate::widget::{read_state, write_state, BaseWidget, Stoppable, Widget};

/// Line shown on the tile; AQI is appended when asked for but not in the format.
pub fn weather_line(cfg: &WeatherConfig, w: &WeatherConditions, units: Units) -> String {
    let mut line = format_weather(&cfg.format, w, units);
    if cfg.show_aqi && !cfg.format.contains("{aqi}") {
        if let Some(aqi) = w.air_quality.as_ref().and_then(|a| a.us_aqi) {
            line.push_str(&format!(" AQI {aqi:.0}"));
        }
    }
    line
}

pub struct WeatherWidget {
    base: BaseWidget,
    weather: WeatherConfig,
    units: Units,
    face: FontFace,
    align: AlignConfig,
    color: u8,
    poller: Result<WeatherPoller, WidgetError>,
    state: RwLock<WeatherConditions>,
}

impl WeatherWidget {
    pub fn with_poller(cfg: &WidgetConfig, poller: WidgetResult<WeatherPoller>) -> Self {
        if let Err(e) = &poller {
            warn!("weather widget {}: {}", cfg.id, e);
        }
        Self {
            base: BaseWidget::from_config(cfg),
            weather: cfg.weather.clone(),
            units: Units::parse(&cfg.weather.units),
            face: load_font_or_default(&cfg.text.font, cfg.text.size),
            align: cfg.text.align,
            color: luma_or(cfg.colors.text, 255),
            poller,
            state: RwLock::new(WeatherConditions::default()),
        }
    }
}

/// Starts an Open-Meteo poller; needs a tokio runtime.
pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    let w = &cfg.weather;
    let poller = Location::parse(&w.location).and_then(|loc| {
        let provider = Arc::new(OpenMeteo::new()?);
        let interval = Duration::from_secs_f64(w.poll_interval.max(60.0));
        WeatherPoller::start(provider, loc, Units::parse(&w.units), w.show_aqi, interval)
    });
    Ok(Arc::new(WeatherWidget::with_poller(cfg, poller)))
}

impl Widget for WeatherWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        let poller = self.poller.as_ref().map_err(Clone::clone)?;
        let latest = poller.latest();
        let err = match (&latest.current, &latest.last_error) {
            (None, Some(e)) => Some(e.clone()),
            _ => None,
        };
        if *read_state(&self.state) != latest {
            *write_state(&self.state) = latest;
            self.base.trigger();
        }
        err.map_or(Ok(()), Err)
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        {
            let st = read_state(&self.state);
            if self.poller.is_err() {
                draw_status(&mut img, "ERR", self.color);
            } else if st.current.is_none() {
                let s = if st.last_error.is_some() { "ERR" } else { "..." };
                draw_status(&mut img, s, self.color);
            } else {
                let line = weather_line(&self.weather, &st, self.units);
                draw_text_aligned(&mut img, &self.face, &line, self.base.content_area(), self.align.h, self.align.v, 0, self.color);
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }
}

impl Stoppable for WeatherWidget {
    fn stop(&self) {
        if let Ok(p) = &self.poller {
            p.stop();
        }
    }
}
