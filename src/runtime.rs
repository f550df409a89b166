/*
 *  runtime.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-widget update tickers
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

//! One tokio task per widget ticks `update` on the widget's own cadence.
//! Updates run on the blocking pool since providers may shell out or read
//! `/proc`. Errors are counted and polling carries on.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{WidgetError, WidgetResult};
use crate::widget::Widget;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetStats {
    pub updates: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    failing: bool,
}

impl WidgetStats {
    fn record(&mut self, name: &str, result: WidgetResult<()>) {
        self.updates += 1;
        match result {
            Ok(()) => {
                if self.failing {
                    info!("{}: update recovered", name);
                    self.failing = false;
                }
            }
            Err(e) => {
                self.errors += 1;
                if !self.failing {
                    warn!("{}: update failed: {}", name, e);
                    self.failing = true;
                } else {
                    debug!("{}: update failed: {}", name, e);
                }
                self.last_error = Some(e.to_string());
            }
        }
    }
}

type SharedStats = Arc<Mutex<WidgetStats>>;

pub struct Runtime {
    widgets: Vec<Arc<dyn Widget>>,
    stats: Vec<SharedStats>,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Runtime {
    /// Spawn a ticker per widget on the current tokio runtime.
    pub fn start(widgets: Vec<Arc<dyn Widget>>) -> WidgetResult<Self> {
        let handle = Handle::try_current().map_err(|e| WidgetError::NotInitialized(e.to_string()))?;
        let (stop_tx, _) = watch::channel(false);
        let mut stats = Vec::with_capacity(widgets.len());
        let mut tasks = Vec::with_capacity(widgets.len());
        for w in &widgets {
            let s: SharedStats = Arc::default();
            tasks.push(handle.spawn(tick_loop(Arc::clone(w), Arc::clone(&s), stop_tx.subscribe())));
            stats.push(s);
        }
        info!("runtime started {} widget tickers", widgets.len());
        Ok(Self { widgets, stats, stop_tx, tasks: Mutex::new(tasks) })
    }

    pub fn widgets(&self) -> &[Arc<dyn Widget>] {
        &self.widgets
    }

    pub fn stats(&self, name: &str) -> Option<WidgetStats> {
        self.widgets
            .iter()
            .position(|w| w.name() == name)
            .map(|i| self.stats[i].lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Stop the tickers, wait for them, then stop every widget that owns
    /// background workers.
    pub async fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
        let tasks: Vec<_> = self.tasks.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
        for t in tasks {
            if let Err(e) = t.await {
                warn!("widget ticker ended abnormally: {}", e);
            }
        }
        for w in &self.widgets {
            if w.as_stoppable().is_none() {
                continue;
            }
            let w = Arc::clone(w);
            let name = w.name().to_string();
            let stopped = tokio::task::spawn_blocking(move || {
                if let Some(s) = w.as_stoppable() {
                    s.stop();
                }
            })
            .await;
            match stopped {
                Ok(()) => debug!("{} stopped", name),
                Err(e) => warn!("{} stop failed: {}", name, e),
            }
        }
        info!("runtime stopped");
    }
}

async fn tick_loop(widget: Arc<dyn Widget>, stats: SharedStats, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = interval(widget.update_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!("{}: ticker every {:?}", widget.name(), widget.update_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let w = Arc::clone(&widget);
                let result = match tokio::task::spawn_blocking(move || w.update()).await {
                    Ok(r) => r,
                    Err(e) => Err(WidgetError::Provider(format!("update panicked: {e}"))),
                };
                stats.lock().unwrap_or_else(PoisonError::into_inner).record(widget.name(), result);
            }
            _ = stop_rx.changed() => break,
        }
    }
    debug!("{}: ticker exit", widget.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::GrayImage;
    use crate::config::{Position, StyleConfig};
    use crate::widget::Stoppable;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    struct Probe {
        name: &'static str,
        fail: bool,
        calls: AtomicU64,
        stopped: AtomicBool,
    }

    impl Probe {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self { name, fail, calls: AtomicU64::new(0), stopped: AtomicBool::new(false) })
        }
    }

    impl Widget for Probe {
        fn name(&self) -> &str {
            self.name
        }
        fn position(&self) -> Position {
            Position { w: 4, h: 4, ..Position::default() }
        }
        fn style(&self) -> StyleConfig {
            StyleConfig::default()
        }
        fn update_interval(&self) -> Duration {
            Duration::from_millis(10)
        }
        fn update(&self) -> WidgetResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(WidgetError::Provider("flaky".into())) } else { Ok(()) }
        }
        fn render(&self) -> WidgetResult<Option<GrayImage>> {
            Ok(None)
        }
        fn as_stoppable(&self) -> Option<&dyn Stoppable> {
            Some(self)
        }
    }

    impl Stoppable for Probe {
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ticks_records_and_stops() {
        let good = Probe::new("good", false);
        let bad = Probe::new("bad", true);
        let rt = Runtime::start(vec![good.clone() as Arc<dyn Widget>, bad.clone() as Arc<dyn Widget>]).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        rt.shutdown().await;

        let g = rt.stats("good").unwrap();
        assert!(g.updates >= 3);
        assert_eq!(g.errors, 0);
        let b = rt.stats("bad").unwrap();
        assert_eq!(b.errors, b.updates);
        assert_eq!(b.last_error.as_deref(), Some("provider error: flaky"));
        assert!(good.stopped.load(Ordering::SeqCst));
        assert!(bad.stopped.load(Ordering::SeqCst));

        // no more ticks after shutdown
        let calls = good.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(good.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_start_needs_runtime() {
        assert!(Runtime::start(Vec::new()).is_err());
    }
}
