/*
 *  lib.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Grayscale widget deck for small OLED panels
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

//! Widgets sample a data source on their own cadence and repaint an 8-bit
//! luminance bitmap on demand; the compositor stacks those bitmaps by Z into
//! one frame for the panel.

use std::future::Future;
use std::pin::Pin;

pub mod audio;
pub mod bitmap;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod draw;
pub mod error;
pub mod fonts;
pub mod metric_renderer;
pub mod metrics;
pub mod pacer;
pub mod registry;
pub mod ringbuf;
pub mod runtime;
pub mod telegram;
pub mod textable;
pub mod wad;
pub mod weather;
pub mod widget;
pub mod widgets;
pub mod wordwrap;

/// Boxed future returned by provider traits used as trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use bitmap::GrayImage;
pub use error::{WidgetError, WidgetResult};
pub use widget::{Stoppable, Widget};
