/*
 *  constants.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared tuning constants
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

use std::time::Duration;

// Audio spectrum pipeline
/// FFT window length and the cap on the sliding sample buffer.
pub const FFT_SIZE: usize = 8192;
/// Upper bound on retained samples in the visualizer's sliding buffer.
pub const MAX_AUDIO_SAMPLES: usize = 8192;
/// Zero samples synthesised on an empty read so peaks keep decaying.
pub const SILENT_BLOCK_SAMPLES: usize = 1024;
/// Magnitude gain applied after `|X[k]| / N`.
pub const SPECTRUM_SENSITIVITY: f32 = 70.0;
/// Lowest frequency of the logarithmic bar mapping.
pub const SPECTRUM_MIN_HZ: f32 = 40.0;
/// Highest frequency of the logarithmic bar mapping.
pub const SPECTRUM_MAX_HZ: f32 = 20_000.0;
/// Peak fall rate, fraction of the held value per second.
pub const PEAK_DECAY_PER_SEC: f32 = 0.3;
/// Peaks below this are snapped to zero.
pub const PEAK_FLOOR: f32 = 0.01;
/// Smoothing exponent reference rate (frames per second).
pub const SMOOTHING_REFERENCE_FPS: f32 = 30.0;

/// Gain per frequency band, first entry whose limit exceeds the centre wins.
pub const FREQUENCY_COMPENSATION: [(f32, f32); 8] = [
    (100.0, 0.5),
    (250.0, 0.8),
    (500.0, 1.0),
    (1000.0, 2.0),
    (2000.0, 3.5),
    (4000.0, 5.0),
    (8000.0, 7.0),
    (f32::INFINITY, 10.0),
];

// Loopback capture
/// Requested shared-mode buffer duration.
pub const CAPTURE_BUFFER_DURATION: Duration = Duration::from_millis(20);
/// Pending samples kept between reads (about two seconds at 48 kHz).
pub const CAPTURE_PENDING_MAX: usize = 96_000;
pub const CAPTURE_DEFAULT_RATE: u32 = 48_000;
/// Longest a single device read may wait before the worker rechecks stop.
pub const CAPTURE_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// How long `close` waits for the worker before detaching it.
pub const CAPTURE_CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

// Volume and device polling
pub const VOLUME_POLL_DEFAULT: Duration = Duration::from_millis(100);
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(500);

// Text scrolling
/// Pixel gap between the two copies of a continuously scrolling line.
pub const SCROLL_LOOP_GAP: u32 = 12;
/// Pause at the far end of a pause_ends scroll, in pixels of travel.
pub const SCROLL_PAUSE_PIXELS: f32 = 100.0;
pub const ELLIPSIS: char = '\u{2026}';

// Telegram
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const TELEGRAM_LONG_POLL: Duration = Duration::from_secs(25);
pub const TELEGRAM_RECONNECT_DEFAULT: Duration = Duration::from_secs(5);
pub const TELEGRAM_RECONNECT_MAX: Duration = Duration::from_secs(300);
/// Error text is wrapped at this many characters in the status view.
pub const TELEGRAM_ERROR_WRAP: usize = 22;

// Weather
pub const WEATHER_POLL_DEFAULT: Duration = Duration::from_secs(15 * 60);
pub const WEATHER_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
