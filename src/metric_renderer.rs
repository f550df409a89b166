/*
 *  metric_renderer.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Text, bar, graph and gauge strategies for scalar metrics
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

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{
    BarConfig, BarDirection, ColorsConfig, DisplayMode, GaugeConfig, GraphConfig, PerCoreConfig,
    TextConfig, WidgetConfig,
};
use crate::draw::{
    draw_gauge, draw_graph, draw_horizontal_bar, draw_rectangle, draw_vertical_bar, Rect,
};
use crate::fonts::{draw_text_aligned, load_font_or_default, FontFace};

/// Clamp a percentage into [0, 100]; NaN reads as 0.
#[inline]
pub fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// Substitute `{value}` with the rounded reading.
pub fn format_value(format: &str, value: f64) -> String {
    let n = format!("{:.0}", value);
    if format.contains("{value}") {
        format.replace("{value}", &n)
    } else {
        n
    }
}

/// Turn `[time][core]` samples into `[core][time]` sequences.
pub fn transpose(history: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let cores = history.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![Vec::with_capacity(history.len()); cores];
    for sample in history {
        for (core, &v) in sample.iter().enumerate() {
            out[core].push(v);
        }
    }
    out
}

/// Near-square grid of `n` cells inside `area`, row-major.
pub fn grid_cells(area: Rect, n: usize, margin: u32) -> Vec<Rect> {
    if n == 0 || area.is_empty() {
        return Vec::new();
    }
    let cols = (n as f64).sqrt().ceil() as u32;
    let rows = (n as u32).div_ceil(cols);
    let cw = area.w.saturating_sub(margin * (cols - 1)) / cols;
    let ch = area.h.saturating_sub(margin * (rows - 1)) / rows;
    (0..n as u32)
        .map(|i| {
            let (c, r) = (i % cols, i / cols);
            Rect::new(
                area.x + (c * (cw + margin)) as i32,
                area.y + (r * (ch + margin)) as i32,
                cw,
                ch,
            )
        })
        .collect()
}

/// One way of drawing a percentage into a rectangle.
pub trait DisplayStrategy: Send + Sync {
    /// `value` is already clamped to [0, 100].
    fn draw(&self, ctx: &MetricRenderer, img: &mut GrayImage, area: Rect, value: f64, history: &[f64]);
}

pub struct TextStrategy;
pub struct BarStrategy;
pub struct GraphStrategy;
pub struct GaugeStrategy;

impl DisplayStrategy for TextStrategy {
    fn draw(&self, ctx: &MetricRenderer, img: &mut GrayImage, area: Rect, value: f64, _history: &[f64]) {
        let text = format_value(&ctx.text.format, value);
        let align = ctx.text.align;
        draw_text_aligned(img, &ctx.face, &text, area, align.h, align.v, 0, luma_or(ctx.colors.text, 255));
    }
}

impl DisplayStrategy for BarStrategy {
    fn draw(&self, ctx: &MetricRenderer, img: &mut GrayImage, area: Rect, value: f64, _history: &[f64]) {
        let mut r = area;
        if ctx.bar.border {
            draw_rectangle(img, r, luma_or(ctx.colors.border, 255));
            r = r.inset(1);
        }
        let fill = luma_or(ctx.colors.fill, 255);
        match ctx.bar.direction {
            BarDirection::Horizontal => draw_horizontal_bar(img, r, value / 100.0, fill),
            BarDirection::Vertical => draw_vertical_bar(img, r, value / 100.0, fill),
        }
    }
}

impl DisplayStrategy for GraphStrategy {
    fn draw(&self, ctx: &MetricRenderer, img: &mut GrayImage, area: Rect, _value: f64, history: &[f64]) {
        let clamped: Vec<f64> = history.iter().map(|&v| clamp_percent(v)).collect();
        draw_graph(img, area, &clamped, ctx.graph.history.max(2), ctx.graph.fill_color, ctx.graph.line_color);
    }
}

impl DisplayStrategy for GaugeStrategy {
    fn draw(&self, ctx: &MetricRenderer, img: &mut GrayImage, area: Rect, value: f64, _history: &[f64]) {
        let g = &ctx.gauge;
        let arc = if ctx.colors.arc >= 0 { ctx.colors.arc } else { g.arc_color };
        let needle = if ctx.colors.needle >= 0 { ctx.colors.needle } else { g.needle_color };
        draw_gauge(
            img,
            area,
            value / 100.0,
            luma_or(arc, 255),
            luma_or(needle, 255),
            g.show_ticks,
            luma_or(g.ticks_color, 128),
        );
    }
}

static TEXT: TextStrategy = TextStrategy;
static BAR: BarStrategy = BarStrategy;
static GRAPH: GraphStrategy = GraphStrategy;
static GAUGE: GaugeStrategy = GaugeStrategy;

/// Shared renderer for cpu/memory/battery/network/volume tiles.
pub struct MetricRenderer {
    pub bar: BarConfig,
    pub graph: GraphConfig,
    pub gauge: GaugeConfig,
    pub text: TextConfig,
    pub colors: ColorsConfig,
    face: FontFace,
}

impl MetricRenderer {
    pub fn new(bar: BarConfig, graph: GraphConfig, gauge: GaugeConfig, text: TextConfig, colors: ColorsConfig) -> Self {
        let face = load_font_or_default(&text.font, text.size);
        Self { bar, graph, gauge, text, colors, face }
    }

    pub fn from_config(cfg: &WidgetConfig) -> Self {
        Self::new(cfg.bar, cfg.graph, cfg.gauge, cfg.text.clone(), cfg.colors)
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn strategy(mode: DisplayMode) -> &'static dyn DisplayStrategy {
        match mode {
            DisplayMode::Text => &TEXT,
            DisplayMode::Bar => &BAR,
            DisplayMode::Graph => &GRAPH,
            DisplayMode::Gauge => &GAUGE,
        }
    }

    /// Draw `value` (percent) into `area` with the strategy for `mode`.
    pub fn render(&self, img: &mut GrayImage, area: Rect, mode: DisplayMode, value: f64, history: &[f64]) {
        if area.is_empty() {
            return;
        }
        Self::strategy(mode).draw(self, img, area, clamp_percent(value), history);
    }

    /// Per-core variant: one cell per value, histories already core-of-time.
    pub fn render_grid(
        &self,
        img: &mut GrayImage,
        area: Rect,
        mode: DisplayMode,
        values: &[f64],
        histories: &[Vec<f64>],
        per_core: &PerCoreConfig,
    ) {
        let border = luma_or(self.colors.border, 255);
        for (i, cell) in grid_cells(area, values.len(), per_core.margin).into_iter().enumerate() {
            let mut inner = cell;
            if per_core.border {
                draw_rectangle(img, cell, border);
                inner = cell.inset(1);
            }
            let history = histories.get(i).map(Vec::as_slice).unwrap_or(&[]);
            self.render(img, inner, mode, values[i], history);
        }
    }
}
