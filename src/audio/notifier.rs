/*
 *  audio/notifier.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Fan-out of default audio device changes
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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::constants::DEVICE_POLL_INTERVAL;
use crate::error::{WidgetError, WidgetResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlow {
    Render,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Console,
    Multimedia,
    Communications,
}

/// The five callback kinds an OS device source reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    DefaultDeviceChanged { flow: DataFlow, role: DeviceRole, id: String },
    DeviceAdded(String),
    DeviceRemoved(String),
    StateChanged { id: String, state: u32 },
    PropertyValueChanged { id: String },
}

impl DeviceEvent {
    /// Whether consumers need to hear about this event.
    pub fn is_relevant(&self) -> bool {
        match self {
            DeviceEvent::DefaultDeviceChanged { flow, role, .. } => {
                *flow == DataFlow::Render
                    && matches!(role, DeviceRole::Console | DeviceRole::Multimedia | DeviceRole::Communications)
            }
            DeviceEvent::StateChanged { .. } | DeviceEvent::DeviceRemoved(_) => true,
            DeviceEvent::DeviceAdded(_) | DeviceEvent::PropertyValueChanged { .. } => false,
        }
    }
}

type SubList = Mutex<Vec<(u64, SyncSender<()>)>>;

fn lock_subs(subs: &SubList) -> MutexGuard<'_, Vec<(u64, SyncSender<()>)>> {
    subs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receive side of a subscription. Holds at most one pending signal and
/// unsubscribes itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: Receiver<()>,
    owner: Weak<SubList>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Consume a pending signal, if any.
    pub fn try_recv(&self) -> bool {
        matches!(self.rx.try_recv(), Ok(()))
    }

    /// True once the notifier dropped this subscription.
    pub fn is_closed(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn recv_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subs) = self.owner.upgrade() {
            lock_subs(&subs).retain(|(sid, _)| *sid != self.id);
        }
    }
}

#[derive(Debug, Default)]
pub struct DeviceNotifier {
    subs: Arc<SubList>,
    next_id: AtomicU64,
}

impl DeviceNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn subs(&self) -> MutexGuard<'_, Vec<(u64, SyncSender<()>)>> {
        lock_subs(&self.subs)
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::sync_channel(1);
        self.subs().push((id, tx));
        Subscription { id, rx, owner: Arc::downgrade(&self.subs) }
    }

    /// Drop the sender, closing the channel. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        self.subs().retain(|(sid, _)| *sid != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subs().len()
    }

    /// Best-effort signal to everyone; full channels drop it, closed ones
    /// are pruned.
    pub fn notify_subscribers(&self) {
        self.subs().retain(|(id, tx)| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => {
                debug!("device subscriber {} gone", id);
                false
            }
        });
    }

    /// Entry point for OS callbacks. Returns whether subscribers were signalled.
    pub fn handle_event(&self, event: &DeviceEvent) -> bool {
        if !event.is_relevant() {
            return false;
        }
        debug!("audio device event: {:?}", event);
        self.notify_subscribers();
        true
    }
}

/// What the OS reports at one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub default: Option<String>,
    pub devices: Vec<String>,
}

/// Translate two consecutive polls into device events.
pub fn diff_snapshots(prev: &DeviceSnapshot, cur: &DeviceSnapshot) -> Vec<DeviceEvent> {
    let mut events = Vec::new();
    for d in &prev.devices {
        if !cur.devices.contains(d) {
            events.push(DeviceEvent::DeviceRemoved(d.clone()));
        }
    }
    for d in &cur.devices {
        if !prev.devices.contains(d) {
            events.push(DeviceEvent::DeviceAdded(d.clone()));
        }
    }
    if prev.default != cur.default {
        if let Some(id) = &cur.default {
            events.push(DeviceEvent::DefaultDeviceChanged {
                flow: DataFlow::Render,
                role: DeviceRole::Multimedia,
                id: id.clone(),
            });
        }
    }
    events
}

#[cfg(target_os = "linux")]
pub fn poll_devices() -> WidgetResult<DeviceSnapshot> {
    use std::process::Command;

    let out = Command::new("pactl").arg("get-default-sink").output()?;
    if !out.status.success() {
        return Err(WidgetError::Provider("pactl get-default-sink failed".into()));
    }
    let default = String::from_utf8_lossy(&out.stdout).trim().to_string();
    let list = Command::new("pactl").args(["list", "short", "sinks"]).output()?;
    let devices = String::from_utf8_lossy(&list.stdout)
        .lines()
        .filter_map(|l| l.split('\t').nth(1).map(str::to_string))
        .collect();
    Ok(DeviceSnapshot { default: (!default.is_empty()).then_some(default), devices })
}

#[cfg(windows)]
pub fn poll_devices() -> WidgetResult<DeviceSnapshot> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default = host.default_output_device().and_then(|d| d.name().ok());
    let devices = host
        .output_devices()
        .map_err(|e| WidgetError::Provider(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();
    Ok(DeviceSnapshot { default, devices })
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn poll_devices() -> WidgetResult<DeviceSnapshot> {
    Err(WidgetError::PlatformUnsupported(std::env::consts::OS.into()))
}

fn spawn_watcher(notifier: &'static DeviceNotifier, first: DeviceSnapshot) {
    let spawned = thread::Builder::new().name("device-watch".into()).spawn(move || {
        let mut prev = first;
        let mut failing = false;
        loop {
            thread::sleep(DEVICE_POLL_INTERVAL);
            match poll_devices() {
                Ok(cur) => {
                    if failing {
                        info!("device polling recovered");
                        failing = false;
                    }
                    for ev in diff_snapshots(&prev, &cur) {
                        notifier.handle_event(&ev);
                    }
                    prev = cur;
                }
                Err(e) => {
                    if !failing {
                        warn!("device polling failed: {}", e);
                        failing = true;
                    }
                }
            }
        }
    });
    if let Err(e) = spawned {
        warn!("device watcher not started: {}", e);
    }
}

static NOTIFIER: OnceLock<WidgetResult<(DeviceNotifier, DeviceSnapshot)>> = OnceLock::new();
static WATCH: Once = Once::new();

/// Process-wide notifier fed by the OS device poller. A failed probe sticks.
pub fn shared_notifier() -> WidgetResult<&'static DeviceNotifier> {
    let (notifier, first) = NOTIFIER
        .get_or_init(|| {
            let snap = poll_devices().map_err(|e| WidgetError::NotInitialized(e.to_string()))?;
            Ok((DeviceNotifier::new(), snap))
        })
        .as_ref()
        .map_err(Clone::clone)?;
    WATCH.call_once(|| spawn_watcher(notifier, first.clone()));
    Ok(notifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_single_pending() {
        let n = DeviceNotifier::new();
        let a = n.subscribe();
        let b = n.subscribe();
        n.notify_subscribers();
        n.notify_subscribers();
        assert!(a.try_recv());
        assert!(!a.try_recv());
        assert!(b.try_recv());
    }

    #[test]
    fn test_unsubscribe_closes_and_unknown_is_noop() {
        let n = DeviceNotifier::new();
        let a = n.subscribe();
        let _b = n.subscribe();
        n.unsubscribe(9999);
        assert_eq!(n.subscriber_count(), 2);
        n.unsubscribe(a.id());
        assert_eq!(n.subscriber_count(), 1);
        assert!(a.is_closed());
        n.unsubscribe(a.id());
        assert_eq!(n.subscriber_count(), 1);
    }

    #[test]
    fn test_dropped_subscription_leaves_the_list() {
        let n = DeviceNotifier::new();
        let a = n.subscribe();
        let b = n.subscribe();
        drop(a);
        assert_eq!(n.subscriber_count(), 1);
        n.notify_subscribers();
        assert!(b.try_recv());
        drop(b);
        n.notify_subscribers();
        assert_eq!(n.subscriber_count(), 0);
    }

    #[test]
    fn test_event_filter() {
        let n = DeviceNotifier::new();
        let s = n.subscribe();
        assert!(!n.handle_event(&DeviceEvent::DeviceAdded("x".into())));
        assert!(!n.handle_event(&DeviceEvent::PropertyValueChanged { id: "x".into() }));
        assert!(!n.handle_event(&DeviceEvent::DefaultDeviceChanged {
            flow: DataFlow::Capture,
            role: DeviceRole::Console,
            id: "mic".into(),
        }));
        assert!(!s.try_recv());
        assert!(n.handle_event(&DeviceEvent::DeviceRemoved("x".into())));
        assert!(s.try_recv());
        assert!(n.handle_event(&DeviceEvent::StateChanged { id: "x".into(), state: 4 }));
        assert!(s.try_recv());
    }

    #[test]
    fn test_diff_snapshots() {
        let a = DeviceSnapshot { default: Some("hdmi".into()), devices: vec!["hdmi".into(), "usb".into()] };
        let b = DeviceSnapshot { default: Some("usb".into()), devices: vec!["usb".into(), "bt".into()] };
        let ev = diff_snapshots(&a, &b);
        assert!(ev.contains(&DeviceEvent::DeviceRemoved("hdmi".into())));
        assert!(ev.contains(&DeviceEvent::DeviceAdded("bt".into())));
        assert!(ev.iter().any(|e| matches!(e, DeviceEvent::DefaultDeviceChanged { id, .. } if id == "usb")));
        assert!(diff_snapshots(&a, &a).is_empty());
    }
}
