/*
 *  widgets/game_of_life.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Conway's game of life on a toroidal grid
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

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bitmap::{luma_or, GrayImage};
use crate::config::{GameOfLifeConfig, WidgetConfig};
use crate::draw::{draw_filled_rectangle, Rect};
use crate::error::WidgetResult;
use crate::widget::{read_state, write_state, BaseWidget, Widget};

/// Row-major cell grid whose edges wrap.
#[derive(Debug, Clone, PartialEq)]
pub struct LifeGrid {
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
}

impl LifeGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows, cells: vec![false; cols * rows] }
    }

    pub fn cols(&self) -> usize { self.cols }
    pub fn rows(&self) -> usize { self.rows }

    pub fn get(&self, c: usize, r: usize) -> bool {
        self.cells[r * self.cols + c]
    }

    pub fn set(&mut self, c: usize, r: usize, alive: bool) {
        let i = r * self.cols + c;
        self.cells[i] = alive;
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn randomize<R: Rng>(&mut self, rng: &mut R, density: f64) {
        let p = density.clamp(0.0, 1.0);
        for c in &mut self.cells {
            *c = rng.random_bool(p);
        }
    }

    fn neighbours(&self, c: usize, r: usize) -> usize {
        let mut n = 0;
        for dr in [self.rows - 1, 0, 1] {
            for dc in [self.cols - 1, 0, 1] {
                if dr == 0 && dc == 0 {
                    continue;
                }
                if self.get((c + dc) % self.cols, (r + dr) % self.rows) {
                    n += 1;
                }
            }
        }
        n
    }

    /// B3/S23.
    pub fn step(&self) -> LifeGrid {
        let mut next = LifeGrid::new(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                let n = self.neighbours(c, r);
                next.set(c, r, matches!((self.get(c, r), n), (true, 2) | (_, 3)));
            }
        }
        next
    }
}

struct LifeState {
    grid: LifeGrid,
    rng: StdRng,
    stagnant: u32,
    generation: u64,
}

pub struct GameOfLifeWidget {
    base: BaseWidget,
    life: GameOfLifeConfig,
    state: RwLock<LifeState>,
}

impl GameOfLifeWidget {
    pub fn new(cfg: &WidgetConfig) -> Self {
        let base = BaseWidget::from_config(cfg);
        let life = cfg.game_of_life.clone();
        let area = base.content_area();
        let cell = life.cell_size.max(1);
        let mut rng = match life.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        let mut grid = LifeGrid::new((area.w / cell) as usize, (area.h / cell) as usize);
        grid.randomize(&mut rng, life.density);
        Self { base, life, state: RwLock::new(LifeState { grid, rng, stagnant: 0, generation: 0 }) }
    }

    pub fn generation(&self) -> u64 {
        read_state(&self.state).generation
    }
}

pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    Ok(Arc::new(GameOfLifeWidget::new(cfg)))
}

impl Widget for GameOfLifeWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        let mut guard = write_state(&self.state);
        let st = &mut *guard;
        if st.grid.cells.is_empty() {
            return Ok(());
        }
        let next = st.grid.step();
        // still lifes and dead boards both count as stagnation
        if next.population() == st.grid.population() {
            st.stagnant += 1;
        } else {
            st.stagnant = 0;
        }
        st.grid = next;
        st.generation += 1;
        if st.grid.population() == 0 || st.stagnant >= self.life.reseed_after.max(1) {
            debug!("game of life reseed after {} generations", st.generation);
            st.grid.randomize(&mut st.rng, self.life.density);
            st.stagnant = 0;
        }
        Ok(())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        let area = self.base.content_area();
        let cell = self.life.cell_size.max(1);
        let color = luma_or(self.life.alive_color, 255);
        {
            let st = read_state(&self.state);
            for r in 0..st.grid.rows() {
                for c in 0..st.grid.cols() {
                    if st.grid.get(c, r) {
                        let x = area.x + (c as u32 * cell) as i32;
                        let y = area.y + (r as u32 * cell) as i32;
                        draw_filled_rectangle(&mut img, Rect::new(x, y, cell, cell), color);
                    }
                }
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }
}
