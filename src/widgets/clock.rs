/*
 *  widgets/clock.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Local time tile
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

use std::fmt::Write;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local, TimeZone, Timelike};

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{AlignConfig, ClockConfig, WidgetConfig};
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::{draw_text_aligned, load_font_or_default, FontFace};
use crate::widget::{read_state, write_state, BaseWidget, Widget};

/// Format `t`, blanking colons on odd seconds when `blink_colon` is set.
pub fn format_clock<Tz: TimeZone>(t: &DateTime<Tz>, cfg: &ClockConfig) -> WidgetResult<String>
where
    Tz::Offset: std::fmt::Display,
{
    let mut s = String::new();
    write!(s, "{}", t.format(&cfg.format))
        .map_err(|_| WidgetError::Config(format!("bad clock format: {}", cfg.format)))?;
    if cfg.blink_colon && t.second() % 2 == 1 {
        s = s.replace(':', " ");
    }
    Ok(s)
}

pub struct ClockWidget {
    base: BaseWidget,
    clock: ClockConfig,
    face: FontFace,
    align: AlignConfig,
    color: u8,
    text: RwLock<String>,
}

impl ClockWidget {
    pub fn new(cfg: &WidgetConfig) -> Self {
        Self {
            base: BaseWidget::from_config(cfg),
            clock: cfg.clock.clone(),
            face: load_font_or_default(&cfg.text.font, cfg.text.size),
            align: cfg.text.align,
            color: luma_or(cfg.colors.text, 255),
            text: RwLock::new(String::new()),
        }
    }

    pub fn update_with(&self, now: DateTime<Local>) -> WidgetResult<()> {
        let s = format_clock(&now, &self.clock)?;
        *write_state(&self.text) = s;
        Ok(())
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(ClockWidget::new(cfg)))
}

impl Widget for ClockWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        self.update_with(Local::now())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        let mut img = self.base.create_canvas();
        let text = read_state(&self.text);
        draw_text_aligned(
            &mut img,
            &self.face,
            &text,
            self.base.content_area(),
            self.align.h,
            self.align.v,
            0,
            self.color,
        );
        drop(text);
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_format_and_blink() {
        let mut cfg = ClockConfig { format: "%H:%M".into(), blink_colon: false };
        assert_eq!(format_clock(&at(9, 5, 1), &cfg).unwrap(), "09:05");
        cfg.blink_colon = true;
        assert_eq!(format_clock(&at(9, 5, 1), &cfg).unwrap(), "09 05");
        assert_eq!(format_clock(&at(9, 5, 2), &cfg).unwrap(), "09:05");
    }

    #[test]
    fn test_bad_format_is_an_error() {
        let cfg = ClockConfig { format: "%Q".into(), blink_colon: false };
        assert!(format_clock(&at(1, 2, 3), &cfg).is_err());
    }

    #[test]
    fn test_renders_before_first_update() {
        let w = ClockWidget::new(&WidgetConfig::new("clock", "c", 64, 16));
        let img = w.render().unwrap().unwrap();
        assert_eq!((img.width(), img.height()), (64, 16));
        w.update().unwrap();
        assert!(w.render().unwrap().unwrap().count_not(0) > 0);
    }
}
