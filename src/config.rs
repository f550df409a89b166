/*
 *  config.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  YAML and command line configuration for the widget deck
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

use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::collections::HashSet;
use std::{fs, path::{Path, PathBuf}};
use std::time::Duration;
use thiserror::Error;

use crate::fonts::{HAlign, VAlign};
use crate::telegram::{BlinkMode, ChatType, TransitionKind};
use crate::textable::ScrollMode;
use crate::wordwrap::WordBreak;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub display: Option<DisplayConfig>,
    #[serde(default)]
    pub widgets: Vec<WidgetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    /// Write the composed frame here as PGM once a second.
    pub dump_frame: Option<PathBuf>,
}

impl Config {
    pub fn display_size(&self) -> (u32, u32) {
        let d = self.display.as_ref();
        (
            d.and_then(|d| d.width).unwrap_or(128),
            d.and_then(|d| d.height).unwrap_or(40),
        )
    }

    pub fn fps(&self) -> u32 {
        self.display.as_ref().and_then(|d| d.fps).unwrap_or(20).max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// -1 transparent, 0..=255 solid luminance
    pub background: i16,
    /// <0 disabled, 0..=255 single pixel border
    pub border: i16,
    pub padding: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self { background: 0, border: -1, padding: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoHideConfig {
    pub enabled: bool,
    /// seconds
    pub timeout: f64,
}

impl Default for AutoHideConfig {
    fn default() -> Self {
        Self { enabled: false, timeout: 3.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Text,
    Bar,
    Graph,
    Gauge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub h: HAlign,
    pub v: VAlign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub font: String,
    pub size: u32,
    pub align: AlignConfig,
    /// `{value}` is replaced by the formatted reading
    pub format: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { font: String::new(), size: 10, align: AlignConfig::default(), format: "{value}".into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarDirection {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    pub direction: BarDirection,
    pub border: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub history: usize,
    pub line_color: i16,
    pub fill_color: i16,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { history: 60, line_color: 255, fill_color: -1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    pub arc_color: i16,
    pub needle_color: i16,
    pub show_ticks: bool,
    pub ticks_color: i16,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self { arc_color: 255, needle_color: 255, show_ticks: false, ticks_color: 128 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerCoreConfig {
    pub enabled: bool,
    pub border: bool,
    pub margin: u32,
}

impl Default for PerCoreConfig {
    fn default() -> Self {
        Self { enabled: false, border: false, margin: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub fill: i16,
    pub text: i16,
    pub border: i16,
    /// gauge overrides, negative keeps the gauge record's colour
    pub arc: i16,
    pub needle: i16,
    pub peak: i16,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { fill: 255, text: 255, border: 255, arc: -1, needle: -1, peak: 255 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// chrono strftime
    pub format: String,
    pub blink_colon: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { format: "%H:%M".into(), blink_colon: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// None sums every non-loopback interface
    pub interface: Option<String>,
    /// bytes/s that maps to 100%; None tracks the observed maximum
    pub max_speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub low_threshold: f64,
    pub show_charging: bool,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self { low_threshold: 20.0, show_charging: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub poll_interval_ms: u64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// "lat,lon"
    pub location: String,
    /// "metric" | "imperial"
    pub units: String,
    /// seconds between fetches
    pub poll_interval: f64,
    pub show_aqi: bool,
    /// tokens: {temp} {unit} {desc} {humidity} {wind} {aqi} {min} {max}
    pub format: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            units: "metric".into(),
            poll_interval: 900.0,
            show_aqi: false,
            format: "{temp}{unit} {desc}".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOfLifeConfig {
    pub cell_size: u32,
    /// initial live-cell probability
    pub density: f64,
    pub alive_color: i16,
    /// generations without change before reseeding
    pub reseed_after: u32,
    pub seed: Option<u64>,
}

impl Default for GameOfLifeConfig {
    fn default() -> Self {
        Self { cell_size: 2, density: 0.3, alive_color: 255, reseed_after: 50, seed: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoomConfig {
    pub wad_path: PathBuf,
    /// fetched once when `wad_path` is missing
    pub wad_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramAuthConfig {
    pub token: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramFilters {
    /// empty accepts every chat type
    pub chat_types: Vec<ChatType>,
    /// empty accepts every chat
    pub chat_ids: Vec<i64>,
    pub ignore_forwarded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAxis {
    #[default]
    None,
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub axis: ScrollAxis,
    pub mode: ScrollMode,
    /// px per second
    pub speed: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self { axis: ScrollAxis::None, mode: ScrollMode::Continuous, speed: 20.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    /// seconds
    pub in_speed: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self { kind: TransitionKind::None, in_speed: 0.3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub auth: TelegramAuthConfig,
    pub filters: TelegramFilters,
    pub show_header: bool,
    pub header_format: String,
    pub separator: bool,
    /// false shows a fixed notice instead of the body
    pub show_message: bool,
    pub scroll: ScrollConfig,
    pub word_break: WordBreak,
    /// seconds, 0 keeps messages until replaced
    pub timeout: f64,
    pub blink: BlinkMode,
    pub blink_interval: f64,
    pub transition: TransitionConfig,
    pub reconnect_interval: f64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            auth: TelegramAuthConfig::default(),
            filters: TelegramFilters::default(),
            show_header: true,
            header_format: "{sender}".into(),
            separator: true,
            show_message: true,
            scroll: ScrollConfig::default(),
            word_break: WordBreak::Normal,
            timeout: 0.0,
            blink: BlinkMode::Never,
            blink_interval: 0.5,
            transition: TransitionConfig::default(),
            reconnect_interval: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizerMode {
    #[default]
    Spectrum,
    Oscilloscope,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyScale {
    #[default]
    Logarithmic,
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarStyle {
    #[default]
    Bars,
    Line,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStyle {
    #[default]
    Line,
    Filled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    #[default]
    Mono,
    StereoSeparated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioVisualizerConfig {
    pub mode: VisualizerMode,
    pub bar_count: usize,
    pub scale: FrequencyScale,
    pub style: BarStyle,
    /// 0 disables smoothing, must be < 1
    pub smoothing: f32,
    pub peak_hold: bool,
    /// seconds
    pub peak_hold_time: f32,
    pub frequency_compensation: bool,
    pub volume_compensation: bool,
    pub wave_style: WaveStyle,
    pub channel_mode: ChannelMode,
    pub sample_count: usize,
}

impl Default for AudioVisualizerConfig {
    fn default() -> Self {
        Self {
            mode: VisualizerMode::Spectrum,
            bar_count: 32,
            scale: FrequencyScale::Logarithmic,
            style: BarStyle::Bars,
            smoothing: 0.7,
            peak_hold: true,
            peak_hold_time: 0.5,
            frequency_compensation: true,
            volume_compensation: true,
            wave_style: WaveStyle::Line,
            channel_mode: ChannelMode::Mono,
            sample_count: 256,
        }
    }
}

/// One widget record, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub enabled: bool,
    pub position: Position,
    pub style: StyleConfig,
    /// seconds
    pub update_interval: f64,
    pub auto_hide: AutoHideConfig,
    pub mode: DisplayMode,
    pub text: TextConfig,
    pub bar: BarConfig,
    pub graph: GraphConfig,
    pub gauge: GaugeConfig,
    pub per_core: PerCoreConfig,
    pub colors: ColorsConfig,
    pub clock: ClockConfig,
    pub network: NetworkConfig,
    pub battery: BatteryConfig,
    pub volume: VolumeConfig,
    pub weather: WeatherConfig,
    pub game_of_life: GameOfLifeConfig,
    pub doom: DoomConfig,
    pub telegram: TelegramConfig,
    pub audio_visualizer: AudioVisualizerConfig,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            kind: String::new(),
            id: String::new(),
            enabled: true,
            position: Position::default(),
            style: StyleConfig::default(),
            update_interval: 1.0,
            auto_hide: AutoHideConfig::default(),
            mode: DisplayMode::default(),
            text: TextConfig::default(),
            bar: BarConfig::default(),
            graph: GraphConfig::default(),
            gauge: GaugeConfig::default(),
            per_core: PerCoreConfig::default(),
            colors: ColorsConfig::default(),
            clock: ClockConfig::default(),
            network: NetworkConfig::default(),
            battery: BatteryConfig::default(),
            volume: VolumeConfig::default(),
            weather: WeatherConfig::default(),
            game_of_life: GameOfLifeConfig::default(),
            doom: DoomConfig::default(),
            telegram: TelegramConfig::default(),
            audio_visualizer: AudioVisualizerConfig::default(),
        }
    }
}

impl WidgetConfig {
    /// Convenience for tests and programmatic setups.
    pub fn new(kind: &str, id: &str, w: u32, h: u32) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            position: Position { w, h, ..Position::default() },
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval.max(0.001))
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "lumadeck", about = "LumaDeck widget compositor", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long)]
    pub fps: Option<u32>,
    /// write the composed frame as PGM once a second
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub dump_frame: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();

    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Parse and validate a YAML document.
pub fn from_yaml_str(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lumadeck/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lumadeck/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lumadeck.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["lumadeck.yaml", "config.yaml", "config/lumadeck.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
    if !src.widgets.is_empty() { dst.widgets = src.widgets; }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some()      { dst.width = src.width; }
    if src.height.is_some()     { dst.height = src.height; }
    if src.fps.is_some()        { dst.fps = src.fps; }
    if src.dump_frame.is_some() { dst.dump_frame = src.dump_frame; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    let any_display = cli.display_width.is_some()
        || cli.display_height.is_some()
        || cli.fps.is_some()
        || cli.dump_frame.is_some();

    if any_display && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()  { display.width = cli.display_width; }
        if cli.display_height.is_some() { display.height = cli.display_height; }
        if cli.fps.is_some()            { display.fps = cli.fps; }
        if cli.dump_frame.is_some()     { display.dump_frame = cli.dump_frame.clone(); }
    }
}

fn color_ok(v: i16) -> bool {
    (-1..=255).contains(&v)
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if display.width == Some(0) || display.height == Some(0) {
            return Err(ConfigError::Validation("display width/height must be > 0".into()));
        }
    }
    let mut ids = HashSet::new();
    for (i, w) in cfg.widgets.iter().enumerate() {
        let label = if w.id.is_empty() { format!("widget #{i}") } else { w.id.clone() };
        if w.kind.is_empty() {
            return Err(ConfigError::Validation(format!("{label}: missing type")));
        }
        if !w.id.is_empty() && !ids.insert(w.id.clone()) {
            return Err(ConfigError::Validation(format!("duplicate widget id: {}", w.id)));
        }
        if !color_ok(w.style.background) {
            return Err(ConfigError::Validation(format!("{label}: background must be -1..=255")));
        }
        if w.style.border > 255 {
            return Err(ConfigError::Validation(format!("{label}: border must be <= 255")));
        }
        if !(w.update_interval > 0.0) {
            return Err(ConfigError::Validation(format!("{label}: update_interval must be > 0")));
        }
        if w.auto_hide.enabled && w.auto_hide.timeout < 0.0 {
            return Err(ConfigError::Validation(format!("{label}: auto_hide timeout must be >= 0")));
        }
        let s = w.audio_visualizer.smoothing;
        if !(0.0..1.0).contains(&s) {
            return Err(ConfigError::Validation(format!("{label}: smoothing must be in [0,1)")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: debug
display:
  width: 128
  height: 40
widgets:
  - type: cpu
    id: cpu0
    position: { x: 0, y: 0, w: 64, h: 20 }
    mode: graph
    graph: { history: 32 }
  - type: clock
    id: clock
    position: { x: 64, y: 0, w: 64, h: 20, z: 2 }
    style: { background: -1, border: 255, padding: 1 }
    auto_hide: { enabled: true, timeout: 5 }
    text: { size: 13, align: { h: right, v: top } }
  - type: telegram
    id: tg
    telegram:
      auth: { token: "123:abc" }
      filters: { chat_types: [private, group] }
      scroll: { axis: vertical, mode: bounce, speed: 12 }
      word_break: break-all
      transition: { type: fade, in_speed: 0.5 }
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = from_yaml_str(SAMPLE).unwrap();
        assert_eq!(cfg.display_size(), (128, 40));
        assert_eq!(cfg.widgets.len(), 3);
        let cpu = &cfg.widgets[0];
        assert_eq!(cpu.mode, DisplayMode::Graph);
        assert_eq!(cpu.graph.history, 32);
        assert_eq!(cpu.graph.line_color, 255);
        let clock = &cfg.widgets[1];
        assert_eq!(clock.style.background, -1);
        assert_eq!(clock.text.align.h, HAlign::Right);
        assert_eq!(clock.text.align.v, VAlign::Top);
        assert!(clock.auto_hide.enabled);
        let tg = &cfg.widgets[2].telegram;
        assert_eq!(tg.auth.token, "123:abc");
        assert_eq!(tg.filters.chat_types, vec![ChatType::Private, ChatType::Group]);
        assert_eq!(tg.scroll.mode, ScrollMode::Bounce);
        assert_eq!(tg.word_break, WordBreak::BreakAll);
        assert_eq!(tg.transition.kind, TransitionKind::Fade);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let y = "widgets:\n  - { type: cpu, id: a }\n  - { type: memory, id: a }\n";
        assert!(matches!(from_yaml_str(y), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bad_background_rejected() {
        let y = "widgets:\n  - { type: cpu, id: a, style: { background: 300 } }\n";
        assert!(from_yaml_str(y).is_err());
    }

    #[test]
    fn test_zero_display_rejected() {
        let y = "display: { width: 0, height: 40 }\n";
        assert!(from_yaml_str(y).is_err());
    }

    #[test]
    fn test_merge_prefers_source() {
        let mut dst = Config::default();
        let src = from_yaml_str("display: { width: 256 }\nwidgets:\n  - { type: clock }\n").unwrap();
        merge(&mut dst, src);
        assert_eq!(dst.display_size(), (256, 40));
        assert_eq!(dst.widgets.len(), 1);
    }
}
