/*
 *  metrics.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  System metric providers backed by /proc and /sys
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

//! Provider traits for the metric widgets plus Linux implementations that
//! read /proc and /sys directly. Widgets only see the traits, tests plug in
//! mocks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::error::{WidgetError, WidgetResult};

pub trait CpuProvider: Send + Sync {
    fn counts(&self, logical: bool) -> WidgetResult<usize>;
    /// Busy percentage over `interval`, or since the previous call when zero.
    fn percent(&self, interval: Duration, per_core: bool) -> WidgetResult<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub used_percent: f64,
}

pub trait MemoryProvider: Send + Sync {
    fn virtual_memory(&self) -> WidgetResult<VirtualMemory>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub name: String,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

pub trait NetworkProvider: Send + Sync {
    /// One entry per interface, or a single `all` entry summing non-loopback ones.
    fn io_counters(&self, per_interface: bool) -> WidgetResult<Vec<IoCounters>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatteryStatus {
    pub percentage: f64,
    pub is_charging: bool,
    pub is_plugged_in: bool,
    pub has_battery: bool,
    pub is_economy_mode: bool,
    pub time_to_empty: Option<Duration>,
    pub time_to_full: Option<Duration>,
}

pub trait BatteryProvider: Send + Sync {
    fn battery_status(&self) -> WidgetResult<BatteryStatus>;
}

fn read_trimmed(path: &Path) -> WidgetResult<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

fn read_u64(path: &Path) -> Option<u64> {
    read_trimmed(path).ok()?.parse().ok()
}

// ---- cpu ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Aggregate line first, then one entry per `cpuN` line.
pub fn parse_proc_stat(content: &str) -> Vec<CpuTimes> {
    content
        .lines()
        .filter(|l| l.starts_with("cpu"))
        .map(|l| {
            let fields: Vec<u64> = l.split_whitespace().skip(1).filter_map(|f| f.parse().ok()).collect();
            // user nice system idle iowait irq softirq steal
            let idle = fields.get(3).copied().unwrap_or(0) + fields.get(4).copied().unwrap_or(0);
            let total = fields.iter().take(8).sum();
            CpuTimes { idle, total }
        })
        .collect()
}

pub fn busy_percent(prev: CpuTimes, cur: CpuTimes) -> f64 {
    let total = cur.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let idle = cur.idle.saturating_sub(prev.idle);
    100.0 * (total.saturating_sub(idle)) as f64 / total as f64
}

pub struct ProcCpu {
    root: PathBuf,
    last: Mutex<Option<Vec<CpuTimes>>>,
}

impl ProcCpu {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), last: Mutex::new(None) }
    }

    fn sample(&self) -> WidgetResult<Vec<CpuTimes>> {
        let s = fs::read_to_string(self.root.join("stat"))?;
        let times = parse_proc_stat(&s);
        if times.is_empty() {
            return Err(WidgetError::Decode("no cpu lines in /proc/stat".into()));
        }
        Ok(times)
    }
}

impl Default for ProcCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProvider for ProcCpu {
    fn counts(&self, _logical: bool) -> WidgetResult<usize> {
        Ok(self.sample()?.len().saturating_sub(1).max(1))
    }

    fn percent(&self, interval: Duration, per_core: bool) -> WidgetResult<Vec<f64>> {
        let (prev, cur) = if interval.is_zero() {
            let cur = self.sample()?;
            let mut last = self.last.lock().map_err(|_| WidgetError::Provider("cpu lock poisoned".into()))?;
            let prev = last.replace(cur.clone()).unwrap_or_else(|| vec![CpuTimes::default(); cur.len()]);
            (prev, cur)
        } else {
            let prev = self.sample()?;
            thread::sleep(interval);
            (prev, self.sample()?)
        };
        let pct: Vec<f64> = prev.iter().zip(cur.iter()).map(|(p, c)| busy_percent(*p, *c)).collect();
        if per_core {
            Ok(pct.into_iter().skip(1).collect())
        } else {
            Ok(pct.into_iter().take(1).collect())
        }
    }
}

// ---- memory -------------------------------------------------------------

pub fn parse_meminfo(content: &str) -> WidgetResult<VirtualMemory> {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next();
        let kib = parts.next().and_then(|v| v.parse::<u64>().ok());
        match key {
            Some("MemTotal:") => total = kib,
            Some("MemAvailable:") => available = kib,
            _ => {}
        }
    }
    let (Some(total), Some(available)) = (total, available) else {
        return Err(WidgetError::Decode("meminfo missing MemTotal/MemAvailable".into()));
    };
    let used_percent = if total == 0 {
        0.0
    } else {
        100.0 * total.saturating_sub(available) as f64 / total as f64
    };
    Ok(VirtualMemory { total: total * 1024, available: available * 1024, used_percent })
}

pub struct ProcMemory {
    root: PathBuf,
}

impl ProcMemory {
    pub fn new() -> Self {
        Self { root: PathBuf::from("/proc") }
    }
}

impl Default for ProcMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider for ProcMemory {
    fn virtual_memory(&self) -> WidgetResult<VirtualMemory> {
        parse_meminfo(&fs::read_to_string(self.root.join("meminfo"))?)
    }
}

// ---- network ------------------------------------------------------------

pub fn parse_net_dev(content: &str) -> Vec<IoCounters> {
    content
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let fields: Vec<u64> = rest.split_whitespace().filter_map(|f| f.parse().ok()).collect();
            Some(IoCounters {
                name: name.trim().to_string(),
                bytes_recv: *fields.first()?,
                bytes_sent: *fields.get(8)?,
            })
        })
        .collect()
}

pub fn sum_counters(list: &[IoCounters]) -> IoCounters {
    list.iter().filter(|c| c.name != "lo").fold(
        IoCounters { name: "all".into(), ..IoCounters::default() },
        |mut acc, c| {
            acc.bytes_recv += c.bytes_recv;
            acc.bytes_sent += c.bytes_sent;
            acc
        },
    )
}

pub struct ProcNetwork {
    root: PathBuf,
}

impl ProcNetwork {
    pub fn new() -> Self {
        Self { root: PathBuf::from("/proc") }
    }
}

impl Default for ProcNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkProvider for ProcNetwork {
    fn io_counters(&self, per_interface: bool) -> WidgetResult<Vec<IoCounters>> {
        let list = parse_net_dev(&fs::read_to_string(self.root.join("net/dev"))?);
        if per_interface {
            Ok(list)
        } else {
            Ok(vec![sum_counters(&list)])
        }
    }
}

// ---- battery ------------------------------------------------------------

pub struct SysBattery {
    root: PathBuf,
}

impl SysBattery {
    pub fn new() -> Self {
        Self::with_root("/sys/class/power_supply")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysBattery {
    fn default() -> Self {
        Self::new()
    }
}

fn hours(num: Option<u64>, den: Option<u64>) -> Option<Duration> {
    match (num, den) {
        (Some(n), Some(d)) if d > 0 => Some(Duration::from_secs_f64(n as f64 / d as f64 * 3600.0)),
        _ => None,
    }
}

impl BatteryProvider for SysBattery {
    fn battery_status(&self) -> WidgetResult<BatteryStatus> {
        let mut st = BatteryStatus::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            // no power_supply class at all: a desktop without battery
            Err(_) => return Ok(st),
        };
        for entry in entries.flatten() {
            let dir = entry.path();
            let kind = read_trimmed(&dir.join("type")).unwrap_or_default();
            match kind.as_str() {
                "Battery" if !st.has_battery => {
                    st.has_battery = true;
                    st.percentage = read_u64(&dir.join("capacity")).unwrap_or(0).min(100) as f64;
                    let status = read_trimmed(&dir.join("status")).unwrap_or_default();
                    st.is_charging = status == "Charging";
                    let now = read_u64(&dir.join("energy_now")).or_else(|| read_u64(&dir.join("charge_now")));
                    let full = read_u64(&dir.join("energy_full")).or_else(|| read_u64(&dir.join("charge_full")));
                    let rate = read_u64(&dir.join("power_now")).or_else(|| read_u64(&dir.join("current_now")));
                    if st.is_charging {
                        st.time_to_full = hours(full.zip(now).map(|(f, n)| f.saturating_sub(n)), rate);
                    } else if status == "Discharging" {
                        st.time_to_empty = hours(now, rate);
                    }
                }
                "Mains" | "USB" => {
                    st.is_plugged_in |= read_u64(&dir.join("online")) == Some(1);
                }
                _ => {}
            }
        }
        st.is_economy_mode = read_trimmed(Path::new("/sys/firmware/acpi/platform_profile"))
            .map(|p| p == "low-power")
            .unwrap_or(false);
        Ok(st)
    }
}
