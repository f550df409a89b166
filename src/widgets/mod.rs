/*
 *  widgets/mod.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Concrete widgets
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

//! One module per data source. Each exposes a `create` factory taking the
//! widget record, plus constructors that accept a provider for tests.

/// Forwards the geometry half of [`Widget`](crate::widget::Widget) to `self.base`.
macro_rules! delegate_base {
    () => {
        fn name(&self) -> &str {
            self.base.name()
        }
        fn position(&self) -> $crate::config::Position {
            self.base.position()
        }
        fn style(&self) -> $crate::config::StyleConfig {
            self.base.style()
        }
        fn update_interval(&self) -> std::time::Duration {
            self.base.update_interval()
        }
    };
}

pub mod audio_visualizer;
pub mod battery;
pub mod clock;
pub mod cpu;
pub mod doom;
pub mod game_of_life;
pub mod keyboard_layout;
pub mod memory;
pub mod network;
pub mod telegram;
pub mod telegram_counter;
pub mod volume;
pub mod weather;

pub use audio_visualizer::AudioVisualizerWidget;
pub use battery::BatteryWidget;
pub use clock::ClockWidget;
pub use cpu::CpuWidget;
pub use doom::DoomWidget;
pub use game_of_life::GameOfLifeWidget;
pub use keyboard_layout::KeyboardLayoutWidget;
pub use memory::MemoryWidget;
pub use network::NetworkWidget;
pub use telegram::TelegramWidget;
pub use telegram_counter::TelegramCounterWidget;
pub use volume::VolumeWidget;
pub use weather::WeatherWidget;
