/*
 *  draw.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Clipped drawing primitives over grayscale images
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

use std::f32::consts::PI;
use crate::bitmap::GrayImage;

/// Integer pixel rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 { self.x + self.w as i32 }
    pub fn bottom(&self) -> i32 { self.y + self.h as i32 }
    pub fn is_empty(&self) -> bool { self.w == 0 || self.h == 0 }

    /// Shrink by `n` on every side, saturating at zero size.
    pub fn inset(&self, n: u32) -> Rect {
        Rect {
            x: self.x + n as i32,
            y: self.y + n as i32,
            w: self.w.saturating_sub(2 * n),
            h: self.h.saturating_sub(2 * n),
        }
    }
}

pub fn draw_horizontal_line(img: &mut GrayImage, x0: i32, x1: i32, y: i32, v: u8) {
    let (a, b) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
    let a = a.max(0);
    let b = b.min(img.width() as i32 - 1);
    for x in a..=b {
        img.set_pixel(x, y, v);
    }
}

pub fn draw_vertical_line(img: &mut GrayImage, x: i32, y0: i32, y1: i32, v: u8) {
    let (a, b) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
    let a = a.max(0);
    let b = b.min(img.height() as i32 - 1);
    for y in a..=b {
        img.set_pixel(x, y, v);
    }
}

/// Bresenham line, endpoints inclusive.
pub fn draw_line(img: &mut GrayImage, x0: i32, y0: i32, x1: i32, y1: i32, v: u8) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y) = (x0, y0);
    let mut err = dx + dy;
    loop {
        img.set_pixel(x, y, v);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// One pixel outline.
pub fn draw_rectangle(img: &mut GrayImage, r: Rect, v: u8) {
    if r.is_empty() {
        return;
    }
    let (x1, y1) = (r.right() - 1, r.bottom() - 1);
    draw_horizontal_line(img, r.x, x1, r.y, v);
    draw_horizontal_line(img, r.x, x1, y1, v);
    draw_vertical_line(img, r.x, r.y, y1, v);
    draw_vertical_line(img, x1, r.y, y1, v);
}

pub fn draw_filled_rectangle(img: &mut GrayImage, r: Rect, v: u8) {
    if r.is_empty() {
        return;
    }
    for y in r.y..r.bottom() {
        draw_horizontal_line(img, r.x, r.right() - 1, y, v);
    }
}

/// Outline the whole image.
pub fn draw_border(img: &mut GrayImage, v: u8) {
    let r = Rect::new(0, 0, img.width(), img.height());
    draw_rectangle(img, r, v);
}

/// Fill the left `frac` of `r`.
pub fn draw_horizontal_bar(img: &mut GrayImage, r: Rect, frac: f64, v: u8) {
    let frac = clamp01(frac);
    let filled = (r.w as f64 * frac).round() as u32;
    draw_filled_rectangle(img, Rect::new(r.x, r.y, filled, r.h), v);
}

/// Fill the bottom `frac` of `r`.
pub fn draw_vertical_bar(img: &mut GrayImage, r: Rect, frac: f64, v: u8) {
    let frac = clamp01(frac);
    let filled = (r.h as f64 * frac).round() as u32;
    draw_filled_rectangle(img, Rect::new(r.x, r.bottom() - filled as i32, r.w, filled), v);
}

/// Plot a history of percentages, newest sample rightmost.
///
/// `capacity` columns share the width; a shorter history leaves the oldest
/// columns empty. Column height is `round(v/100 · (h−1))`. Negative colours
/// disable the fill or the top line. Fewer than two samples draw nothing.
pub fn draw_graph(img: &mut GrayImage, r: Rect, seq: &[f64], capacity: usize, fill: i16, line: i16) {
    if seq.len() < 2 || r.is_empty() {
        return;
    }
    let capacity = capacity.max(seq.len());
    let start = seq.len().saturating_sub(capacity);
    let seq = &seq[start..];
    let offset = capacity - seq.len();
    let step = r.w as f64 / capacity as f64;
    let base = r.bottom() - 1;

    for (i, &v) in seq.iter().enumerate() {
        let slot = (offset + i) as f64;
        let c0 = r.x + (slot * step).floor() as i32;
        let c1 = (r.x + ((slot + 1.0) * step).floor() as i32).max(c0 + 1).min(r.right());
        let height = (clamp01(v / 100.0) * (r.h as f64 - 1.0)).round() as i32;
        let top = base - height;
        for x in c0..c1 {
            if fill >= 0 {
                draw_vertical_line(img, x, top, base, fill.min(255) as u8);
            }
            if line >= 0 {
                img.set_pixel(x, top, line.min(255) as u8);
            }
        }
    }
}

/// Centre and radius of the semicircular gauge inside `r`.
pub fn gauge_geometry(r: Rect) -> (i32, i32, i32) {
    let cx = r.x + (r.w / 2) as i32;
    let cy = r.bottom() - 1;
    let radius = (r.w / 2).min(r.h) as i32 - 1;
    (cx, cy, radius)
}

#[inline]
fn polar(cx: i32, cy: i32, len: f32, angle: f32) -> (i32, i32) {
    (cx + (len * angle.cos()).round() as i32, cy - (len * angle.sin()).round() as i32)
}

/// Semicircular gauge sweeping 180° to 0°, needle at `π(1 − value)`.
pub fn draw_gauge(
    img: &mut GrayImage,
    r: Rect,
    value01: f64,
    arc: u8,
    needle: u8,
    show_ticks: bool,
    ticks: u8,
) {
    let (cx, cy, radius) = gauge_geometry(r);
    if radius < 1 {
        return;
    }
    let rf = radius as f32;

    let steps = (radius * 6).max(48);
    for s in 0..=steps {
        let a = PI * (1.0 - s as f32 / steps as f32);
        let (x, y) = polar(cx, cy, rf, a);
        img.set_pixel(x, y, arc);
    }

    if show_ticks {
        let inner = (rf - 3.0).max(0.0);
        for k in 0..=10 {
            let a = PI * (1.0 - k as f32 / 10.0);
            let (x0, y0) = polar(cx, cy, inner, a);
            let (x1, y1) = polar(cx, cy, rf, a);
            draw_line(img, x0, y0, x1, y1, ticks);
        }
    }

    let a = PI * (1.0 - clamp01(value01) as f32);
    let len = (rf - 2.0).max(1.0);
    let (nx, ny) = polar(cx, cy, len, a);
    draw_line(img, cx, cy, nx, ny, needle);
}

#[inline]
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endpoints() {
        let mut img = GrayImage::new(10, 10, 0);
        draw_line(&mut img, 1, 1, 8, 5, 255);
        assert_eq!(img.get(1, 1), Some(255));
        assert_eq!(img.get(8, 5), Some(255));
    }

    #[test]
    fn test_line_clips() {
        let mut img = GrayImage::new(5, 5, 0);
        draw_line(&mut img, -10, 2, 20, 2, 1);
        assert_eq!(img.count_not(0), 5);
    }

    #[test]
    fn test_rectangle_outline() {
        let mut img = GrayImage::new(5, 4, 0);
        draw_rectangle(&mut img, Rect::new(0, 0, 5, 4), 9);
        assert_eq!(img.count_not(0), 14);
        assert_eq!(img.get(2, 2), Some(0));
    }

    #[test]
    fn test_horizontal_bar_proportion() {
        let mut img = GrayImage::new(128, 40, 0);
        draw_horizontal_bar(&mut img, Rect::new(0, 0, 128, 40), 0.75, 255);
        assert_eq!(img.get(95, 39), Some(255));
        assert_eq!(img.get(96, 0), Some(0));
    }

    #[test]
    fn test_vertical_bar_from_bottom() {
        let mut img = GrayImage::new(4, 10, 0);
        draw_vertical_bar(&mut img, Rect::new(0, 0, 4, 10), 0.3, 200);
        assert_eq!(img.get(0, 9), Some(200));
        assert_eq!(img.get(0, 7), Some(200));
        assert_eq!(img.get(0, 6), Some(0));
    }

    #[test]
    fn test_graph_newest_rightmost() {
        let mut img = GrayImage::new(10, 11, 0);
        draw_graph(&mut img, Rect::new(0, 0, 10, 11), &[0.0, 100.0], 10, 255, -1);
        // newest (100) fills the rightmost column entirely
        assert_eq!(img.get(9, 0), Some(255));
        // the 0 sample still paints its baseline pixel
        assert_eq!(img.get(8, 10), Some(255));
        assert_eq!(img.get(8, 9), Some(0));
        // older slots stay empty
        assert_eq!(img.get(0, 10), Some(0));
    }

    #[test]
    fn test_graph_single_sample_blank() {
        let mut img = GrayImage::new(10, 10, 0);
        draw_graph(&mut img, Rect::new(0, 0, 10, 10), &[50.0], 10, 255, 255);
        assert_eq!(img.count_not(0), 0);
    }

    #[test]
    fn test_gauge_half_needle_vertical() {
        let mut img = GrayImage::new(64, 40, 0);
        draw_gauge(&mut img, Rect::new(0, 0, 64, 40), 0.5, 0, 255, false, 0);
        let (cx, cy, radius) = gauge_geometry(Rect::new(0, 0, 64, 40));
        assert_eq!(cx, 32);
        for y in (cy - radius + 2)..=cy {
            assert_eq!(img.get(cx, y), Some(255));
            assert_eq!(img.get(cx - 1, y), Some(0));
            assert_eq!(img.get(cx + 1, y), Some(0));
        }
    }

    #[test]
    fn test_gauge_tiny_is_noop() {
        let mut img = GrayImage::new(2, 1, 0);
        draw_gauge(&mut img, Rect::new(0, 0, 2, 1), 1.0, 255, 255, true, 255);
        assert_eq!(img.count_not(0), 0);
    }
}
