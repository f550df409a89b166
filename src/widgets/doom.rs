/*
 *  widgets/doom.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  DOOM demo tile with an at-most-once engine lifecycle
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

//! The engine keeps global state, so it can run once per process. The
//! [`LifecycleGate`] enforces that; a second DOOM tile renders an error.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};

use crate::bitmap::GrayImage;
use crate::config::{DoomConfig, WidgetConfig};
use crate::draw::{draw_horizontal_bar, Rect};
use crate::error::{WidgetError, WidgetResult};
use crate::fonts::{draw_status, draw_status_lines};
use crate::wad::{is_wad, Progress, WadFetcher};
use crate::widget::{read_state, write_state, BaseWidget, Stoppable, Widget};
use crate::wordwrap::wrap_chars_count;

/// 35 Hz game tic.
pub const DOOM_TIC: Duration = Duration::from_micros(28_571);

pub trait DoomEngine: Send {
    fn start(&mut self, wad: &Path) -> WidgetResult<()>;
    fn tick(&mut self) -> WidgetResult<()>;
    /// RGB24 framebuffer as (width, height, pixels).
    fn frame(&self) -> (u32, u32, &[u8]);
}

pub type EngineFactory = Box<dyn FnOnce() -> WidgetResult<Box<dyn DoomEngine>> + Send>;

/// One-shot permission slip.
pub struct LifecycleGate(AtomicBool);

impl LifecycleGate {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// True for the first caller only.
    pub fn try_acquire(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self::new()
    }
}

pub static DOOM_GATE: LifecycleGate = LifecycleGate::new();

/// Nearest-neighbour scale of an RGB24 buffer into luminance.
pub fn rgb_to_luma(w: u32, h: u32, rgb: &[u8], out_w: u32, out_h: u32) -> GrayImage {
    let mut img = GrayImage::new(out_w, out_h, 0);
    if w == 0 || h == 0 || rgb.len() < (w * h * 3) as usize {
        return img;
    }
    for y in 0..out_h {
        let sy = (u64::from(y) * u64::from(h) / u64::from(out_h)) as u32;
        for x in 0..out_w {
            let sx = (u64::from(x) * u64::from(w) / u64::from(out_w)) as u32;
            let i = ((sy * w + sx) * 3) as usize;
            let (r, g, b) = (u32::from(rgb[i]), u32::from(rgb[i + 1]), u32::from(rgb[i + 2]));
            img.set_pixel(x as i32, y as i32, ((r * 299 + g * 587 + b * 114) / 1000) as u8);
        }
    }
    img
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Loading,
    Downloading(Progress),
    Running,
    Failed(String),
}

struct DoomState {
    phase: Phase,
    frame: Option<GrayImage>,
}

pub struct DoomWidget {
    base: BaseWidget,
    state: Arc<RwLock<DoomState>>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn ensure_wad(cfg: &DoomConfig, rt: Option<tokio::runtime::Handle>, state: &RwLock<DoomState>) -> WidgetResult<PathBuf> {
    if is_wad(&cfg.wad_path) {
        return Ok(cfg.wad_path.clone());
    }
    let Some(url) = &cfg.wad_url else {
        return Err(WidgetError::Resource(format!("WAD missing: {}", cfg.wad_path.display())));
    };
    let rt = rt.ok_or_else(|| WidgetError::NotInitialized("no runtime for WAD download".into()))?;
    let fetcher = WadFetcher::new()?;
    rt.block_on(fetcher.fetch(url, &cfg.wad_path, |p| {
        write_state(state).phase = Phase::Downloading(p);
    }))
}

fn run_engine(
    cfg: DoomConfig,
    area: Rect,
    factory: EngineFactory,
    rt: Option<tokio::runtime::Handle>,
    state: &RwLock<DoomState>,
    stop: &AtomicBool,
) -> WidgetResult<()> {
    let wad = ensure_wad(&cfg, rt, state)?;
    let mut engine = factory()?;
    engine.start(&wad)?;
    info!("DOOM running with {}", wad.display());
    write_state(state).phase = Phase::Running;
    while !stop.load(Ordering::SeqCst) {
        engine.tick()?;
        let (w, h, rgb) = engine.frame();
        let img = rgb_to_luma(w, h, rgb, area.w, area.h);
        write_state(state).frame = Some(img);
        thread::sleep(DOOM_TIC);
    }
    Ok(())
}

impl DoomWidget {
    pub fn with_engine(cfg: &WidgetConfig, gate: &LifecycleGate, factory: EngineFactory) -> Self {
        let base = BaseWidget::from_config(cfg);
        let state = Arc::new(RwLock::new(DoomState { phase: Phase::Loading, frame: None }));
        let stop = Arc::new(AtomicBool::new(false));
        let mut worker = None;

        if !gate.try_acquire() {
            write_state(&state).phase = Phase::Failed("DOOM can only run once per process".into());
        } else {
            let doom = cfg.doom.clone();
            let area = base.content_area();
            let rt = tokio::runtime::Handle::try_current().ok();
            let (st, sp) = (Arc::clone(&state), Arc::clone(&stop));
            let spawned = thread::Builder::new().name("doom".into()).spawn(move || {
                if let Err(e) = run_engine(doom, area, factory, rt, &st, &sp) {
                    error!("DOOM stopped: {}", e);
                    write_state(&st).phase = Phase::Failed(e.to_string());
                }
            });
            match spawned {
                Ok(h) => worker = Some(h),
                Err(e) => write_state(&state).phase = Phase::Failed(e.to_string()),
            }
        }
        Self { base, state, stop, worker: Mutex::new(worker) }
    }
}

/// Uses the process-wide gate. No engine is linked by default, so the tile
/// reports that once the WAD is in place.
pub fn create(cfg: &WidgetConfig) -> WidgetResult<Arc<dyn Widget>> {
    let factory: EngineFactory = Box::new(|| -> WidgetResult<Box<dyn DoomEngine>> {
        Err(WidgetError::Resource("no DOOM engine linked into this build".into()))
    });
    Ok(Arc::new(DoomWidget::with_engine(cfg, &DOOM_GATE, factory)))
}

impl Widget for DoomWidget {
    delegate_base!();

    fn update(&self) -> WidgetResult<()> {
        Ok(())
    }

    fn render(&self) -> WidgetResult<Option<GrayImage>> {
        if self.base.should_hide() {
            return Ok(None);
        }
        let mut img = self.base.create_canvas();
        let area = self.base.content_area();
        {
            let st = read_state(&self.state);
            match (&st.phase, &st.frame) {
                (Phase::Running, Some(frame)) => img.blit(frame, area.x, area.y, false),
                (Phase::Running, None) | (Phase::Loading, _) => draw_status(&mut img, "Loading...", 255),
                (Phase::Downloading(p), _) => {
                    let label = match p.fraction() {
                        Some(f) => format!("WAD {:.0}%", f * 100.0),
                        None => format!("WAD {}K", p.downloaded / 1024),
                    };
                    draw_status(&mut img, &label, 255);
                    let bar = Rect::new(area.x, area.bottom() - 2, area.w, 2);
                    draw_horizontal_bar(&mut img, bar, p.fraction().unwrap_or(0.0), 255);
                }
                (Phase::Failed(msg), _) => {
                    let lines = wrap_chars_count(msg, (area.w / 6).max(1) as usize);
                    draw_status_lines(&mut img, &lines, 255);
                }
            }
        }
        self.base.apply_border(&mut img);
        Ok(Some(img))
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }
}

impl Stoppable for DoomWidget {
    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(h) = handle {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat {
        px: Vec<u8>,
    }

    impl DoomEngine for Flat {
        fn start(&mut self, _wad: &Path) -> WidgetResult<()> {
            Ok(())
        }
        fn tick(&mut self) -> WidgetResult<()> {
            Ok(())
        }
        fn frame(&self) -> (u32, u32, &[u8]) {
            (4, 2, &self.px)
        }
    }

    fn engine(level: u8) -> EngineFactory {
        Box::new(move || -> WidgetResult<Box<dyn DoomEngine>> { Ok(Box::new(Flat { px: vec![level; 24] })) })
    }

    fn wad_file(tag: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("lumadeck-doom-{}-{}.wad", tag, std::process::id()));
        std::fs::write(&p, b"IWAD\0\0\0\0").unwrap();
        p
    }

    fn cfg(wad: PathBuf) -> WidgetConfig {
        let mut c = WidgetConfig::new("doom", "doom", 8, 4);
        c.doom.wad_path = wad;
        c
    }

    #[test]
    fn test_luma_conversion() {
        let img = rgb_to_luma(1, 1, &[255, 255, 255], 2, 2);
        assert_eq!(img.count_not(255), 0);
        let img = rgb_to_luma(1, 1, &[255, 0, 0], 1, 1);
        assert_eq!(img.get(0, 0), Some(76));
    }

    #[test]
    fn test_engine_runs_once_per_gate() {
        static GATE: LifecycleGate = LifecycleGate::new();
        let wad = wad_file("once");
        let first = DoomWidget::with_engine(&cfg(wad.clone()), &GATE, engine(200));
        let second = DoomWidget::with_engine(&cfg(wad.clone()), &GATE, engine(0));

        for _ in 0..200 {
            if read_state(&first.state).frame.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let img = first.render().unwrap().unwrap();
        assert_eq!(img.count_not(200), 0);
        assert!(matches!(read_state(&second.state).phase, Phase::Failed(_)));

        first.stop();
        second.stop();
        let _ = std::fs::remove_file(wad);
    }

    #[test]
    fn test_missing_wad_without_url_fails() {
        static GATE: LifecycleGate = LifecycleGate::new();
        let w = DoomWidget::with_engine(
            &cfg(PathBuf::from("/nonexistent/doom1.wad")),
            &GATE,
            Box::new(|| -> WidgetResult<Box<dyn DoomEngine>> { Err(WidgetError::Resource("unused".into())) }),
        );
        w.stop();
        assert!(matches!(read_state(&w.state).phase, Phase::Failed(ref m) if m.contains("WAD missing")));
    }
}
