/*
 *  bitmap.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime-sized 8-bit grayscale image
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


use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Gray8, GrayColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// Luminance written by transparent widgets; the compositor skips it.
pub const TRANSPARENT: u8 = 0;

/// Row-major W×H luminance buffer. Every write clips to `[0,W)×[0,H)`
/// and nothing reallocates the backing store after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    buf: Vec<u8>,
    w: usize,
    h: usize,
}

impl GrayImage {
    pub fn new(width: u32, height: u32, fill: u8) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h }
    }

    /// Canvas for a style background: negative means transparent.
    pub fn with_background(width: u32, height: u32, background: i16) -> Self {
        Self::new(width, height, luma_or(background, TRANSPARENT))
    }

    pub fn width(&self) -> u32 { self.w as u32 }
    pub fn height(&self) -> u32 { self.h as u32 }

    pub fn as_slice(&self) -> &[u8] { &self.buf }
    pub fn as_mut_slice(&mut self) -> &mut [u8] { &mut self.buf }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 {
            let (x, y) = (x as usize, y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        self.idx(x, y).map(|i| self.buf[i])
    }

    /// Out-of-bounds writes are dropped.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, v: u8) {
        if let Some(i) = self.idx(x, y) {
            self.buf[i] = v;
        }
    }

    pub fn fill(&mut self, v: u8) {
        self.buf.fill(v);
    }

    /// Copy `src` with its top-left at (dx, dy). When `skip_transparent`
    /// is set, source pixels equal to [`TRANSPARENT`] leave the target alone.
    pub fn blit(&mut self, src: &GrayImage, dx: i32, dy: i32, skip_transparent: bool) {
        for sy in 0..src.h {
            let ty = dy + sy as i32;
            if ty < 0 || ty as usize >= self.h {
                continue;
            }
            for sx in 0..src.w {
                let v = src.buf[sy * src.w + sx];
                if skip_transparent && v == TRANSPARENT {
                    continue;
                }
                self.set_pixel(dx + sx as i32, ty, v);
            }
        }
    }

    /// Copy the `(sx, sy, w, h)` region of `src` to (dx, dy).
    pub fn copy_region(&mut self, src: &GrayImage, sx: i32, sy: i32, w: u32, h: u32, dx: i32, dy: i32) {
        for row in 0..h as i32 {
            for col in 0..w as i32 {
                if let Some(v) = src.get(sx + col, sy + row) {
                    self.set_pixel(dx + col, dy + row, v);
                }
            }
        }
    }

    /// Number of pixels not equal to `v`; handy for tests and idle checks.
    pub fn count_not(&self, v: u8) -> usize {
        self.buf.iter().filter(|&&p| p != v).count()
    }

    /// Binary PGM (P5) encoding.
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.w, self.h).into_bytes();
        out.extend_from_slice(&self.buf);
        out
    }
}

/// Map a style colour (negative disables) to a luminance.
#[inline]
pub fn luma_or(color: i16, fallback: u8) -> u8 {
    if color < 0 { fallback } else { color.min(255) as u8 }
}

impl OriginDimensions for GrayImage {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for GrayImage {
    type Color = Gray8;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            self.set_pixel(p.x, p.y, c.luma());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.luma());
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let Size { width, height } = area.size;
        if width == 0 || height == 0 { return Ok(()); }
        let (x0, y0) = (area.top_left.x, area.top_left.y);

        let mut it = colors.into_iter();
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                match it.next() {
                    Some(c) => self.set_pixel(x0 + col, y0 + row, c.luma()),
                    None => return Ok(()),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    #[test]
    fn test_zero_area_image() {
        let img = GrayImage::new(0, 40, 0);
        assert_eq!(img.width(), 0);
        assert!(img.as_slice().is_empty());
        let img = GrayImage::new(128, 0, 0);
        assert_eq!(img.height(), 0);
    }

    #[test]
    fn test_set_pixel_clips() {
        let mut img = GrayImage::new(4, 4, 0);
        img.set_pixel(-1, 0, 255);
        img.set_pixel(4, 0, 255);
        img.set_pixel(0, 4, 255);
        assert_eq!(img.count_not(0), 0);
        img.set_pixel(3, 3, 200);
        assert_eq!(img.get(3, 3), Some(200));
        assert_eq!(img.as_slice().len(), 16);
    }

    #[test]
    fn test_background_transparent() {
        let img = GrayImage::with_background(2, 2, -1);
        assert!(img.as_slice().iter().all(|&p| p == TRANSPARENT));
        let img = GrayImage::with_background(2, 2, 30);
        assert!(img.as_slice().iter().all(|&p| p == 30));
    }

    #[test]
    fn test_blit_skips_transparent() {
        let mut dst = GrayImage::new(4, 1, 9);
        let mut src = GrayImage::new(2, 1, 0);
        src.set_pixel(1, 0, 77);
        dst.blit(&src, 2, 0, true);
        assert_eq!(dst.as_slice(), &[9, 9, 9, 77]);
        dst.blit(&src, 3, 0, false);
        assert_eq!(dst.as_slice(), &[9, 9, 9, 0]);
    }

    #[test]
    fn test_embedded_graphics_target() {
        let mut img = GrayImage::new(8, 8, 0);
        Line::new(Point::new(-4, 0), Point::new(20, 0))
            .into_styled(PrimitiveStyle::with_stroke(Gray8::new(128), 1))
            .draw(&mut img)
            .unwrap();
        assert_eq!(img.count_not(0), 8);
    }

    #[test]
    fn test_pgm_header() {
        let img = GrayImage::new(3, 2, 1);
        let pgm = img.to_pgm();
        assert!(pgm.starts_with(b"P5\n3 2\n255\n"));
        assert_eq!(pgm.len(), 11 + 6);
    }
}
