/*
 *  widgets/keyboard_layout.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Active keyboard layout tile
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

use std::process::Command;
use std::sync::{Arc, RwLock};

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{AlignConfig, WidgetConfig};
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::{draw_status, draw_text_aligned, load_font_or_default, FontFace};
use crate::widget::{read_state, write_state, BaseWidget, Widget};

pub trait LayoutProvider: Send + Sync {
    /// Short layout code such as `us` or `de`.
    fn current_layout(&self) -> WidgetResult<String>;
}

/// First entry of the `layout:` line in `setxkbmap -query` output.
pub fn parse_setxkbmap(out: &str) -> Option<String> {
    out.lines()
        .find_map(|l| l.trim().strip_prefix("layout:"))
        .and_then(|v| v.trim().split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Region part of a locale such as `en_GB.UTF-8`.
pub fn layout_from_locale(lang: &str) -> Option<String> {
    let base = lang.split(['.', '@']).next()?;
    let (_, region) = base.split_once('_')?;
    (!region.is_empty()).then(|| region.to_ascii_lowercase())
}

pub struct Setxkbmap;

impl LayoutProvider for Setxkbmap {
    fn current_layout(&self) -> WidgetResult<String> {
        let out = Command::new("setxkbmap").arg("-query").output()?;
        if !out.status.success() {
            return Err(WidgetError::Provider("setxkbmap -query failed".into()));
        }
        parse_setxkbmap(&String::from_utf8_lossy(&out.stdout))
            .ok_or_else(|| WidgetError::Decode("no layout in setxkbmap output".into()))
    }
}

/// Fixed answer, for platforms without a query tool.
pub struct StaticLayout(pub String);

impl LayoutProvider for StaticLayout {
    fn current_layout(&self) -> WidgetResult<String> {
        Ok(self.0.clone())
    }
}

pub fn default_provider() -> Box<dyn LayoutProvider> {
    if cfg!(target_os = "linux") && std::env::var_os("DISPLAY").is_some() {
        Box::new(Setxkbmap)
    } else {
        let code = std::env::var("LANG").ok().and_then(|l| layout_from_locale(&l)).unwrap_or_else(|| "us".into());
        Box::new(StaticLayout(code))
    }
}

pub struct KeyboardLayoutWidget {
    base: BaseWidget,
    face: FontFace,
    align: AlignConfig,
    color: u8,
    provider: Box<dyn LayoutProvider>,
    layout: RwLock<Option<String>>,
}

impl KeyboardLayoutWidget {
    pub fn with_provider(cfg: &WidgetConfig, provider: Box<dyn LayoutProvider>) -> Self {
        Self {
            base: BaseWidget::from_config(cfg),
            face: load_font_or_default(&cfg.text.font, cfg.text.size),
            align: cfg.text.align,
            color: luma_or(cfg.colors.text, 255),
            provider,
            layout: RwLock::new(None),
        }
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(KeyboardLayoutWidget::with_provider(cfg, default_provider())))
}

impl Widget for KeyboardLayoutWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        let code = self.provider.current_layout()?.to_ascii_uppercase();
        let mut cur = write_state(&self.layout);
        if cur.as_deref() != Some(code.as_str()) {
            if cur.is_some() {
                self.base.trigger();
            }
            *cur = Some(code);
        }
        Ok(())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        match read_state(&self.layout).as_deref() {
            Some(code) => draw_text_aligned(
                &mut img,
                &self.face,
                code,
                self.base.content_area(),
                self.align.h,
                self.align.v,
                0,
                self.color,
            ),
            None => draw_status(&mut img, "--", self.color),
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setxkbmap() {
        let out = "rules:      evdev\nmodel:      pc105\nlayout:     de,us\nvariant:    ,\n";
        assert_eq!(parse_setxkbmap(out).as_deref(), Some("de"));
        assert_eq!(parse_setxkbmap("rules: evdev\n"), None);
    }

    #[test]
    fn test_locale_fallback() {
        assert_eq!(layout_from_locale("en_GB.UTF-8").as_deref(), Some("gb"));
        assert_eq!(layout_from_locale("C"), None);
    }

    #[test]
    fn test_upper_cased() {
        let w = KeyboardLayoutWidget::with_provider(&WidgetConfig::new("keyboard_layout", "kb", 20, 10), Box::new(StaticLayout("fr".into())));
        w.update().unwrap();
        assert_eq!(read_state(&w.layout).as_deref(), Some("FR"));
    }
}
