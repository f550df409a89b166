/*
 *  main.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Entry point: load config, start the deck, pace frames
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


use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use env_logger::Env;
use log::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use lumadeck::audio::capture::shutdown_shared_capture;
use lumadeck::compositor::Compositor;
use lumadeck::config;
use lumadeck::pacer::AutoPacer;
use lumadeck::registry::Registry;
use lumadeck::runtime::Runtime;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

const DUMP_EVERY: Duration = Duration::from_secs(1);

/// Waits for SIGINT, SIGTERM or SIGHUP.
#[cfg(unix)]
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

fn dump_frame(path: &Path, pgm: &[u8], failing: &mut bool) {
    match std::fs::write(path, pgm) {
        Ok(()) => *failing = false,
        Err(e) if !*failing => {
            warn!("frame dump to {} failed: {}", path.display(), e);
            *failing = true;
        }
        Err(_) => {}
    }
}

/// Compose frames at the configured rate, backing off when composing runs long.
async fn frame_loop(runtime: &Runtime, compositor: &Compositor, fps: u32, dump: Option<PathBuf>) {
    let mut pacer = AutoPacer::new(fps, fps, (fps / 4).max(1));
    let mut last_dump: Option<Instant> = None;
    let mut dump_failing = false;
    loop {
        tokio::time::sleep(pacer.until_next(Instant::now())).await;
        if !pacer.should_flush() {
            continue;
        }
        let t0 = Instant::now();
        let frame = compositor.compose(runtime.widgets());
        pacer.record_frame_ms(t0.elapsed().as_secs_f32() * 1000.0);

        if let Some(path) = dump.as_deref() {
            if last_dump.is_none_or(|t| t.elapsed() >= DUMP_EVERY) {
                dump_frame(path, &frame.to_pgm(), &mut dump_failing);
                last_dump = Some(Instant::now());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let (width, height) = cfg.display_size();
    let fps = cfg.fps();
    info!("display {}x{} at {} fps", width, height, fps);

    let registry = Registry::with_builtin();
    let widgets = registry.create_all(&cfg.widgets);
    if widgets.is_empty() {
        warn!("no widgets configured, the deck will stay dark");
    }
    let runtime = Runtime::start(widgets).context("starting widget runtime")?;
    let compositor = Compositor::new(width, height);
    let dump = cfg.display.as_ref().and_then(|d| d.dump_frame.clone());

    tokio::select! {
        r = signal_handler() => {
            if let Err(e) = r {
                error!("signal handler failed: {}", e);
            }
        }
        _ = frame_loop(&runtime, &compositor, fps, dump) => {}
    }

    runtime.shutdown().await;
    if let Err(e) = tokio::task::spawn_blocking(shutdown_shared_capture).await {
        warn!("capture shutdown failed: {}", e);
    }
    info!("done");
    Ok(())
}
