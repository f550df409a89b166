/*
 *  audio/volume.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Output volume reader and its shared polling monitor
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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::audio::notifier::{shared_notifier, Subscription};
use crate::error::{WidgetError, WidgetResult};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeReading {
    /// 0..=100
    pub percent: f64,
    pub muted: bool,
}

/// Current output volume. Readers that cache a device handle override the
/// reinitialize pair.
pub trait VolumeReader: Send {
    fn get_volume(&mut self) -> WidgetResult<VolumeReading>;

    fn needs_reinitialize(&self) -> bool {
        false
    }

    fn reinitialize(&mut self) -> WidgetResult<()> {
        Ok(())
    }
}

/// Parse the first `NN%` in `pactl get-sink-volume` output.
pub fn parse_pactl_volume(s: &str) -> Option<f64> {
    s.split_whitespace()
        .filter_map(|tok| tok.strip_suffix('%'))
        .find_map(|n| n.parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 100.0))
}

pub fn parse_pactl_mute(s: &str) -> Option<bool> {
    match s.trim().strip_prefix("Mute:")?.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

#[cfg(target_os = "linux")]
pub struct PactlVolume {
    stale: bool,
}

#[cfg(target_os = "linux")]
impl PactlVolume {
    pub fn new() -> Self {
        Self { stale: false }
    }

    fn run(args: &[&str]) -> WidgetResult<String> {
        let out = std::process::Command::new("pactl").args(args).output()?;
        if !out.status.success() {
            return Err(WidgetError::Provider(format!("pactl {} failed", args.join(" "))));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[cfg(target_os = "linux")]
impl VolumeReader for PactlVolume {
    fn get_volume(&mut self) -> WidgetResult<VolumeReading> {
        let vol = Self::run(&["get-sink-volume", "@DEFAULT_SINK@"]).inspect_err(|_| self.stale = true)?;
        let mute = Self::run(&["get-sink-mute", "@DEFAULT_SINK@"]).inspect_err(|_| self.stale = true)?;
        let percent = parse_pactl_volume(&vol)
            .ok_or_else(|| WidgetError::Decode(format!("unexpected volume output: {}", vol.trim())))?;
        let muted = parse_pactl_mute(&mute).unwrap_or(false);
        Ok(VolumeReading { percent, muted })
    }

    fn needs_reinitialize(&self) -> bool {
        self.stale
    }

    fn reinitialize(&mut self) -> WidgetResult<()> {
        self.stale = false;
        Ok(())
    }
}

/// Sticky error for platforms without a volume back-end.
pub struct UnsupportedVolume;

impl VolumeReader for UnsupportedVolume {
    fn get_volume(&mut self) -> WidgetResult<VolumeReading> {
        Err(WidgetError::PlatformUnsupported(format!("volume reader on {}", std::env::consts::OS)))
    }
}

pub fn default_reader() -> Box<dyn VolumeReader> {
    #[cfg(target_os = "linux")]
    {
        Box::new(PactlVolume::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedVolume)
    }
}

/// One poll: honour device-change signals and reinitialize requests, then read.
pub fn poll_once(reader: &mut dyn VolumeReader, device_changed: bool) -> WidgetResult<VolumeReading> {
    if device_changed || reader.needs_reinitialize() {
        debug!("reinitializing volume reader");
        reader.reinitialize()?;
    }
    reader.get_volume()
}

/// Published monitor state: the last good reading or the current error.
pub type VolumeState = Option<Result<VolumeReading, WidgetError>>;

/// Background poller publishing through a watch channel.
pub struct VolumeMonitor {
    rx: watch::Receiver<VolumeState>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VolumeMonitor {
    pub fn start(reader: Box<dyn VolumeReader>, interval: Duration, devices: Option<Subscription>) -> WidgetResult<Self> {
        let (tx, rx) = watch::channel::<VolumeState>(None);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("volume".into())
            .spawn(move || poll_loop(reader, interval, devices, tx, worker_stop))
            .map_err(|e| WidgetError::NotInitialized(e.to_string()))?;
        Ok(Self { rx, stop, worker: Mutex::new(Some(handle)) })
    }

    /// Latest reading, `None` before the first poll completes.
    pub fn current(&self) -> VolumeState {
        self.rx.borrow().clone()
    }

    pub fn percent(&self) -> Option<f64> {
        match self.current() {
            Some(Ok(r)) => Some(r.percent),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<VolumeState> {
        self.rx.clone()
    }

    /// Stop polling. The worker drops its device subscription on exit.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(h) = handle {
            let _ = h.join();
        }
    }
}

fn poll_loop(
    mut reader: Box<dyn VolumeReader>,
    interval: Duration,
    devices: Option<Subscription>,
    tx: watch::Sender<VolumeState>,
    stop: Arc<AtomicBool>,
) {
    info!("volume poller started ({:?})", interval);
    let mut errors: u64 = 0;
    while !stop.load(Ordering::SeqCst) {
        let changed = devices.as_ref().is_some_and(Subscription::try_recv);
        match poll_once(reader.as_mut(), changed) {
            Ok(r) => {
                if errors > 0 {
                    info!("volume reader recovered after {} errors", errors);
                    errors = 0;
                }
                tx.send_if_modified(|cur| {
                    let new = Some(Ok(r));
                    if *cur != new {
                        *cur = new;
                        true
                    } else {
                        false
                    }
                });
            }
            Err(e) => {
                if errors == 0 {
                    warn!("volume read failed: {}", e);
                }
                errors += 1;
                tx.send_replace(Some(Err(e)));
            }
        }
        thread::sleep(interval);
    }
    debug!("volume poller exit");
}

static MONITOR: OnceLock<WidgetResult<VolumeMonitor>> = OnceLock::new();

/// Process-wide monitor at the default cadence.
pub fn shared_volume() -> WidgetResult<&'static VolumeMonitor> {
    MONITOR
        .get_or_init(|| {
            let devices = shared_notifier().ok().map(|n| n.subscribe());
            VolumeMonitor::start(default_reader(), crate::constants::VOLUME_POLL_DEFAULT, devices)
        })
        .as_ref()
        .map_err(Clone::clone)
}
