/*
 *  fonts.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Font faces, text measurement and aligned text drawing
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

use std::path::Path;

use embedded_graphics::mono_font::{iso_8859_1, MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Gray8;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::bitmap::GrayImage;
use crate::constants::ELLIPSIS;
use crate::draw::Rect;
use crate::error::{WidgetError, WidgetResult};

/// Built-in bitmap fonts by nominal cell size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFont {
    Tiny,   // ~3x5
    Small,  // ~5x7
    Medium, // ~8x8
    Large,  // ~12x12
    Huge,   // ~16x16
}

impl BitmapFont {
    pub fn mono(self) -> &'static MonoFont<'static> {
        match self {
            BitmapFont::Tiny => &iso_8859_1::FONT_4X6,
            BitmapFont::Small => &iso_8859_1::FONT_5X7,
            BitmapFont::Medium => &iso_8859_1::FONT_6X10,
            BitmapFont::Large => &iso_8859_1::FONT_8X13,
            BitmapFont::Huge => &iso_8859_1::FONT_10X20,
        }
    }
}

// (pixel height, face) ordered by height
const FACES: [(u32, &MonoFont<'static>); 9] = [
    (6, &iso_8859_1::FONT_4X6),
    (7, &iso_8859_1::FONT_5X7),
    (8, &iso_8859_1::FONT_5X8),
    (10, &iso_8859_1::FONT_6X10),
    (12, &iso_8859_1::FONT_6X12),
    (13, &iso_8859_1::FONT_7X13),
    (15, &iso_8859_1::FONT_9X15),
    (18, &iso_8859_1::FONT_9X18),
    (20, &iso_8859_1::FONT_10X20),
];

/// A loaded face. Cheap to copy; all faces are static bitmap fonts.
#[derive(Debug, Clone, Copy)]
pub struct FontFace {
    font: &'static MonoFont<'static>,
}

impl FontFace {
    pub fn internal(set: BitmapFont) -> Self {
        Self { font: set.mono() }
    }

    /// Face whose pixel height is closest to `size`.
    pub fn nearest(size: u32) -> Self {
        let font = FACES
            .iter()
            .min_by_key(|(h, _)| h.abs_diff(size))
            .map(|(_, f)| *f)
            .unwrap_or(&iso_8859_1::FONT_5X8);
        Self { font }
    }

    pub fn line_height(&self) -> u32 {
        self.font.character_size.height
    }

    fn advance(&self) -> u32 {
        self.font.character_size.width + self.font.character_spacing
    }

    /// Pixel extent (w, h) of a single line.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        let n = text.chars().count() as u32;
        if n == 0 {
            return (0, self.line_height());
        }
        (n * self.advance() - self.font.character_spacing, self.line_height())
    }

    pub fn text_width(&self, text: &str) -> u32 {
        self.measure(text).0
    }

    /// Draw a single line with its top-left at (x, y).
    pub fn draw(&self, img: &mut GrayImage, text: &str, x: i32, y: i32, color: u8) {
        let style = MonoTextStyle::new(self.font, Gray8::new(color));
        let mut cx = x;
        for (i, part) in text.split(ELLIPSIS).enumerate() {
            if i > 0 {
                self.draw_ellipsis(img, cx, y, color);
                cx += self.advance() as i32;
            }
            if !part.is_empty() {
                let _ = Text::with_baseline(part, Point::new(cx, y), style, Baseline::Top).draw(img);
                cx += (part.chars().count() as u32 * self.advance()) as i32;
            }
        }
    }

    // Latin-1 faces carry no ellipsis; three dots on the baseline fill one cell.
    fn draw_ellipsis(&self, img: &mut GrayImage, x: i32, y: i32, color: u8) {
        let w = self.font.character_size.width as i32;
        let by = y + self.font.baseline as i32;
        let step = (w / 3).max(1);
        for k in 0..3 {
            let dx = k * step;
            if dx < w {
                img.set_pixel(x + dx, by, color);
            }
        }
    }
}

/// Resolve a configured face. Empty or generic names pick the nearest
/// built-in face; outline font files fall back to the nearest bitmap face.
pub fn load_font(name: &str, size: u32) -> WidgetResult<FontFace> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".ttf") || lower.ends_with(".otf") {
        if !Path::new(name).exists() {
            return Err(WidgetError::Resource(format!("font file not found: {name}")));
        }
        warn!("outline font {} rendered with nearest bitmap face ({}px)", name, size);
    }
    Ok(FontFace::nearest(size.max(1)))
}

/// Load a face, degrading to the small internal font on failure.
pub fn load_font_or_default(name: &str, size: u32) -> FontFace {
    load_font(name, size).unwrap_or_else(|e| {
        warn!("font fallback: {}", e);
        FontFace::internal(BitmapFont::Small)
    })
}

/// Blit one glyph from a built-in set.
pub fn draw_glyph(img: &mut GrayImage, set: BitmapFont, ch: char, x: i32, y: i32, color: u8) {
    let mut tmp = [0u8; 4];
    FontFace::internal(set).draw(img, ch.encode_utf8(&mut tmp), x, y, color);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Top-left origin for `text` aligned inside `area`.
pub fn align_origin(face: &FontFace, text: &str, area: Rect, h: HAlign, v: VAlign, padding: u32) -> (i32, i32) {
    let (tw, th) = face.measure(text);
    let pad = padding as i32;
    let x = match h {
        HAlign::Left => area.x + pad,
        HAlign::Center => area.x + (area.w as i32 - tw as i32) / 2,
        HAlign::Right => area.right() - pad - tw as i32,
    };
    let y = match v {
        VAlign::Top => area.y + pad,
        VAlign::Middle => area.y + (area.h as i32 - th as i32) / 2,
        VAlign::Bottom => area.bottom() - pad - th as i32,
    };
    (x, y)
}

pub fn draw_text_aligned(
    img: &mut GrayImage,
    face: &FontFace,
    text: &str,
    area: Rect,
    h: HAlign,
    v: VAlign,
    padding: u32,
    color: u8,
) {
    let (x, y) = align_origin(face, text, area, h, v, padding);
    face.draw(img, text, x, y, color);
}

/// Centred status text in the small internal font.
pub fn draw_status(img: &mut GrayImage, text: &str, color: u8) {
    let face = FontFace::internal(BitmapFont::Small);
    let area = Rect::new(0, 0, img.width(), img.height());
    draw_text_aligned(img, &face, text, area, HAlign::Center, VAlign::Middle, 0, color);
}

/// Several centred status lines stacked around the middle.
pub fn draw_status_lines(img: &mut GrayImage, lines: &[String], color: u8) {
    let face = FontFace::internal(BitmapFont::Small);
    let lh = face.line_height() as i32 + 1;
    let total = lh * lines.len() as i32;
    let mut y = (img.height() as i32 - total) / 2;
    for line in lines {
        let x = (img.width() as i32 - face.text_width(line) as i32) / 2;
        face.draw(img, line, x, y, color);
        y += lh;
    }
}
