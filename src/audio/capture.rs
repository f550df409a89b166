/*
 *  audio/capture.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Loopback capture of the default output on a dedicated worker
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

//! The OS handle lives on one thread from open to close. Readers only touch
//! the pending buffers behind `shared`, so `read_samples` never blocks on the
//! device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use thiserror::Error;

use crate::constants::{CAPTURE_CLOSE_TIMEOUT, CAPTURE_PENDING_MAX};
use crate::error::WidgetError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("capture not initialized: {0}")]
    NotInitialized(String),
    #[error("read buffer failure: {0}")]
    ReadBuffer(String),
    #[error("loopback capture unsupported: {0}")]
    PlatformUnsupported(String),
}

impl From<CaptureError> for WidgetError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::NotInitialized(m) => WidgetError::NotInitialized(m),
            CaptureError::ReadBuffer(m) => WidgetError::Provider(m),
            CaptureError::PlatformUnsupported(m) => WidgetError::PlatformUnsupported(m),
        }
    }
}

/// An opened OS loopback stream. Not `Send`: it is created, read and closed
/// on the capture worker only.
pub trait LoopbackSource {
    fn sample_rate(&self) -> u32;
    /// Wait for the next packet and append its frames, returning the frame count.
    fn read_frames(&mut self, left: &mut Vec<f32>, right: &mut Vec<f32>) -> Result<usize, CaptureError>;
    fn close(&mut self);
}

pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn LoopbackSource>, CaptureError> + Send>;

#[derive(Debug, Default)]
struct Pending {
    left: VecDeque<f32>,
    right: VecDeque<f32>,
    sample_rate: u32,
    failed: Option<CaptureError>,
}

impl Pending {
    fn push(&mut self, left: &[f32], right: &[f32]) {
        self.left.extend(left);
        self.right.extend(right);
        for q in [&mut self.left, &mut self.right] {
            if q.len() > CAPTURE_PENDING_MAX {
                let excess = q.len() - CAPTURE_PENDING_MAX;
                q.drain(..excess);
            }
        }
    }
}

pub struct LoopbackCapture {
    shared: Arc<Mutex<Pending>>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<(JoinHandle<()>, Receiver<()>)>>,
}

impl LoopbackCapture {
    /// Open a source on a fresh worker thread. Construction fails if the
    /// factory does; the worker has exited by then.
    pub fn start_with(factory: SourceFactory) -> Result<Self, CaptureError> {
        let shared = Arc::new(Mutex::new(Pending::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let (init_tx, init_rx) = mpsc::channel::<Result<u32, CaptureError>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let worker_shared = Arc::clone(&shared);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("loopback".into())
            .spawn(move || {
                let mut source = match factory() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(source.sample_rate()));
                capture_loop(source.as_mut(), &worker_shared, &worker_stop);
                source.close();
                let _ = done_tx.send(());
                debug!("loopback worker exit");
            })
            .map_err(|e| CaptureError::NotInitialized(e.to_string()))?;

        let rate = match init_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::NotInitialized("capture worker died during init".into()));
            }
        };
        info!("loopback capture running at {} Hz", rate);
        shared.lock().unwrap_or_else(PoisonError::into_inner).sample_rate = rate;

        Ok(Self { shared, stop, worker: Mutex::new(Some((handle, done_rx))) })
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sample_rate(&self) -> u32 {
        self.pending().sample_rate
    }

    /// Drain everything captured so far, left channel. Empty is not an error.
    pub fn read_samples(&self) -> Result<Vec<f32>, CaptureError> {
        let mut p = self.pending();
        let out: Vec<f32> = p.left.drain(..).collect();
        p.right.clear();
        if out.is_empty() {
            if let Some(e) = &p.failed {
                return Err(e.clone());
            }
        }
        Ok(out)
    }

    /// Drain both channels.
    pub fn read_stereo(&self) -> Result<(Vec<f32>, Vec<f32>), CaptureError> {
        let mut p = self.pending();
        let left: Vec<f32> = p.left.drain(..).collect();
        let right: Vec<f32> = p.right.drain(..).collect();
        if left.is_empty() {
            if let Some(e) = &p.failed {
                return Err(e.clone());
            }
        }
        Ok((left, right))
    }

    /// Stop the worker; the source is closed on its own thread. A worker
    /// stuck in the device for longer than `CAPTURE_CLOSE_TIMEOUT` is detached.
    pub fn close(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some((handle, done)) = worker else {
            return;
        };
        match done.recv_timeout(CAPTURE_CLOSE_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("loopback worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("loopback worker did not stop within {:?}, detaching", CAPTURE_CLOSE_TIMEOUT);
            }
        }
    }
}

fn capture_loop(source: &mut dyn LoopbackSource, shared: &Mutex<Pending>, stop: &AtomicBool) {
    let mut left = Vec::with_capacity(4096);
    let mut right = Vec::with_capacity(4096);
    while !stop.load(Ordering::SeqCst) {
        left.clear();
        right.clear();
        match source.read_frames(&mut left, &mut right) {
            Ok(0) => {}
            Ok(_) => shared.lock().unwrap_or_else(PoisonError::into_inner).push(&left, &right),
            Err(e) => {
                warn!("loopback read failed: {}", e);
                shared.lock().unwrap_or_else(PoisonError::into_inner).failed = Some(e);
                break;
            }
        }
    }
}

static CAPTURE: OnceLock<Result<LoopbackCapture, CaptureError>> = OnceLock::new();

/// Process-wide capture, opened on first use. A failed open sticks.
pub fn shared_capture() -> Result<&'static LoopbackCapture, CaptureError> {
    CAPTURE
        .get_or_init(|| {
            LoopbackCapture::start_with(Box::new(open_default_source)).inspect_err(|e| {
                warn!("loopback capture unavailable: {}", e);
            })
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Close the shared capture if it was ever opened.
pub fn shutdown_shared_capture() {
    if let Some(Ok(c)) = CAPTURE.get() {
        c.close();
    }
}

#[cfg(target_os = "linux")]
pub fn open_default_source() -> Result<Box<dyn LoopbackSource>, CaptureError> {
    Ok(Box::new(pulse::ParecSource::open()?))
}

#[cfg(windows)]
pub fn open_default_source() -> Result<Box<dyn LoopbackSource>, CaptureError> {
    Ok(Box::new(wasapi::CpalLoopback::open()?))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn open_default_source() -> Result<Box<dyn LoopbackSource>, CaptureError> {
    Err(CaptureError::PlatformUnsupported(std::env::consts::OS.into()))
}

#[cfg(target_os = "linux")]
mod pulse {
    use std::io::Read;
    use std::process::{Child, Command, Stdio};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
    use std::thread;

    use log::debug;

    use super::{CaptureError, LoopbackSource};
    use crate::constants::{CAPTURE_BUFFER_DURATION, CAPTURE_DEFAULT_RATE, CAPTURE_READ_TIMEOUT};

    const FRAME_BYTES: usize = 8; // two float32 channels

    /// Reads the default sink's monitor through `parec` as raw float32 stereo.
    /// A pipe thread forwards stdout so a silent sink never blocks the worker.
    pub struct ParecSource {
        child: Child,
        rx: Receiver<std::io::Result<Vec<u8>>>,
        carry: Vec<u8>,
        rate: u32,
    }

    impl ParecSource {
        pub fn open() -> Result<Self, CaptureError> {
            let rate = CAPTURE_DEFAULT_RATE;
            let mut child = Command::new("parec")
                .arg("--device=@DEFAULT_MONITOR@")
                .arg("--format=float32le")
                .arg("--channels=2")
                .arg(format!("--rate={rate}"))
                .arg(format!("--latency-msec={}", CAPTURE_BUFFER_DURATION.as_millis()))
                .arg("--raw")
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| CaptureError::NotInitialized(format!("parec: {e}")))?;
            let mut stdout = child
                .stdout
                .take()
                .ok_or_else(|| CaptureError::NotInitialized("parec stdout unavailable".into()))?;
            let frames = (rate as u128 * CAPTURE_BUFFER_DURATION.as_millis() / 1000) as usize;
            let chunk_len = frames.max(64) * FRAME_BYTES;

            let (tx, rx) = mpsc::sync_channel(64);
            let spawned = thread::Builder::new().name("parec-pipe".into()).spawn(move || {
                let mut chunk = vec![0u8; chunk_len];
                loop {
                    match stdout.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(Ok(chunk[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
                debug!("parec pipe closed");
            });
            if let Err(e) = spawned {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CaptureError::NotInitialized(format!("parec pipe: {e}")));
            }
            Ok(Self { child, rx, carry: Vec::new(), rate })
        }

        fn take_frames(&mut self, left: &mut Vec<f32>, right: &mut Vec<f32>) -> usize {
            let whole = self.carry.len() / FRAME_BYTES * FRAME_BYTES;
            for frame in self.carry[..whole].chunks_exact(FRAME_BYTES) {
                left.push(f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]));
                right.push(f32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]));
            }
            self.carry.drain(..whole);
            whole / FRAME_BYTES
        }
    }

    impl LoopbackSource for ParecSource {
        fn sample_rate(&self) -> u32 {
            self.rate
        }

        fn read_frames(&mut self, left: &mut Vec<f32>, right: &mut Vec<f32>) -> Result<usize, CaptureError> {
            let first = match self.rx.recv_timeout(CAPTURE_READ_TIMEOUT) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::ReadBuffer("parec closed its output".into()));
                }
            };
            self.carry.extend_from_slice(&first.map_err(|e| CaptureError::ReadBuffer(e.to_string()))?);
            while let Ok(chunk) = self.rx.try_recv() {
                self.carry.extend_from_slice(&chunk.map_err(|e| CaptureError::ReadBuffer(e.to_string()))?);
            }
            Ok(self.take_frames(left, right))
        }

        fn close(&mut self) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(windows)]
mod wasapi {
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use log::warn;

    use super::{CaptureError, LoopbackSource};
    use crate::constants::CAPTURE_READ_TIMEOUT;

    /// WASAPI loopback: an input stream opened on the default render device.
    pub struct CpalLoopback {
        stream: Option<cpal::Stream>,
        rx: Receiver<Vec<f32>>,
        channels: usize,
        rate: u32,
    }

    impl CpalLoopback {
        pub fn open() -> Result<Self, CaptureError> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| CaptureError::NotInitialized("no default render endpoint".into()))?;
            let supported = device
                .default_output_config()
                .map_err(|e| CaptureError::NotInitialized(e.to_string()))?;
            if supported.sample_format() != cpal::SampleFormat::F32 {
                return Err(CaptureError::NotInitialized(format!(
                    "unsupported mix format {:?}",
                    supported.sample_format()
                )));
            }
            let config: cpal::StreamConfig = supported.into();
            let channels = config.channels.max(1) as usize;
            let rate = config.sample_rate.0;

            let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(64);
            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let _ = tx.try_send(data.to_vec());
                    },
                    |err| warn!("loopback stream error: {}", err),
                    None,
                )
                .map_err(|e| CaptureError::NotInitialized(e.to_string()))?;
            stream.play().map_err(|e| CaptureError::NotInitialized(e.to_string()))?;
            Ok(Self { stream: Some(stream), rx, channels, rate })
        }

        fn split(&self, data: &[f32], left: &mut Vec<f32>, right: &mut Vec<f32>) -> usize {
            let mut frames = 0;
            for frame in data.chunks_exact(self.channels) {
                left.push(frame[0]);
                right.push(*frame.get(1).unwrap_or(&frame[0]));
                frames += 1;
            }
            frames
        }
    }

    impl LoopbackSource for CpalLoopback {
        fn sample_rate(&self) -> u32 {
            self.rate
        }

        fn read_frames(&mut self, left: &mut Vec<f32>, right: &mut Vec<f32>) -> Result<usize, CaptureError> {
            let first = match self.rx.recv_timeout(CAPTURE_READ_TIMEOUT) {
                Ok(p) => p,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::ReadBuffer("loopback stream closed".into()));
                }
            };
            let mut frames = self.split(&first, left, right);
            while let Ok(p) = self.rx.try_recv() {
                frames += self.split(&p, left, right);
            }
            Ok(frames)
        }

        fn close(&mut self) {
            if let Some(stream) = self.stream.take() {
                let _ = stream.pause();
            }
        }
    }
}
