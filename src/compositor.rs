/*
 *  compositor.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Stacks widget tiles into the display frame
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


use std::sync::Arc;

use log::debug;

use crate::bitmap::GrayImage;
use crate::widget::Widget;

/// Display-sized frame builder. Widgets are drawn in ascending Z; equal Z
/// keeps configuration order.
pub struct Compositor {
    width: u32,
    height: u32,
    background: u8,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, background: 0 }
    }

    pub fn with_background(mut self, v: u8) -> Self {
        self.background = v;
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn compose(&self, widgets: &[Arc<dyn Widget>]) -> GrayImage {
        let mut frame = GrayImage::new(self.width, self.height, self.background);
        let mut order: Vec<&Arc<dyn Widget>> = widgets.iter().collect();
        order.sort_by_key(|w| w.position().z);
        for w in order {
            match w.render() {
                Ok(Some(tile)) => {
                    let pos = w.position();
                    frame.blit(&tile, pos.x, pos.y, w.style().background < 0);
                }
                Ok(None) => {}
                Err(e) => debug!("{}: render skipped: {}", w.name(), e),
            }
        }
        frame
    }
}
