//! Capture device contract and the cpal-backed production implementation.
//!
//! The recording worker consumes the device through two small traits so
//! tests can substitute a scripted device:
//!
//! * [`CaptureDevice::open`] — open a stream with a requested
//!   [`StreamSpec`].
//! * [`CaptureStream::read_chunk`] — blocking read of the next chunk of
//!   mono samples at the requested rate; [`CaptureStream::close`] tears
//!   the stream down.
//!
//! [`CpalCaptureDevice`] owns the platform stream on a dedicated audio
//! thread (cpal streams are not `Send`); the callback forwards raw
//! buffers over a channel and the [`CaptureStream`] side downmixes and
//! resamples them to the requested spec.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::convert::{downmix_to_mono, resample};

// ---------------------------------------------------------------------------
// StreamSpec
// ---------------------------------------------------------------------------

/// Requested capture format.  The defaults match the recording worker's
/// persistence format: mono, 44.1 kHz, 1024-sample reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples handed back per `read_chunk` by scripted devices; the cpal
    /// implementation returns whatever buffer the hardware delivered.
    pub frame_size: u32,
}

impl Default for StreamSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 44_100,
            frame_size: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn capture thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("capture stream is closed")]
    StreamClosed,
}

// ---------------------------------------------------------------------------
// Device / stream contracts
// ---------------------------------------------------------------------------

/// Factory for capture streams.  Exclusively owned by the pipeline that
/// opened it and the active recording worker.
pub trait CaptureDevice: Send + Sync {
    fn open(&self, spec: StreamSpec) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// One open capture stream.  `read_chunk` blocks on the device; the
/// recording worker calls it in a loop on its own thread.
pub trait CaptureStream: Send {
    /// Next chunk of mono samples at the requested rate.  An empty chunk
    /// means the device produced nothing within the read window; the
    /// caller should keep looping.
    fn read_chunk(&mut self) -> Result<Vec<f32>, CaptureError>;

    /// Stop the underlying hardware stream.  Idempotent.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// CpalCaptureDevice
// ---------------------------------------------------------------------------

/// Production capture device using the system default cpal input.
#[derive(Debug, Default)]
pub struct CpalCaptureDevice;

impl CaptureDevice for CpalCaptureDevice {
    fn open(&self, spec: StreamSpec) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if spec.channels != 1 {
            log::warn!(
                "capture: {} channels requested, delivering mono",
                spec.channels
            );
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (format_tx, format_rx) = mpsc::channel::<Result<(u32, u16), CaptureError>>();
        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<f32>>();

        let thread_stop = Arc::clone(&stop);
        let join = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || run_stream(format_tx, chunk_tx, thread_stop))?;

        // The audio thread reports either the native format or the setup
        // error before entering its park loop.
        let (native_rate, native_channels) = match format_rx.recv() {
            Ok(result) => result?,
            Err(_) => return Err(CaptureError::StreamClosed),
        };

        log::debug!("capture: stream open at {native_rate} Hz, {native_channels} ch");

        Ok(Box::new(CpalStream {
            rx: chunk_rx,
            stop,
            join: Some(join),
            native_rate,
            native_channels,
            target_rate: spec.sample_rate,
        }))
    }
}

/// Body of the audio thread: build the stream, report the format, then
/// hold the stream alive until asked to stop.
fn run_stream(
    format_tx: Sender<Result<(u32, u16), CaptureError>>,
    chunk_tx: Sender<Vec<f32>>,
    stop: Arc<AtomicBool>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = format_tx.send(Err(CaptureError::NoDevice));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = format_tx.send(Err(e.into()));
            return;
        }
    };
    let native_channels = supported.channels();
    let native_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = match device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Ignore send errors; the receiver may have been dropped.
            let _ = chunk_tx.send(data.to_vec());
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None, // no timeout
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = format_tx.send(Err(e.into()));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = format_tx.send(Err(e.into()));
        return;
    }

    let _ = format_tx.send(Ok((native_rate, native_channels)));

    // The stream delivers via its callback; this thread only keeps it
    // alive until close() flips the flag.
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
}

/// Consumer side of the cpal stream.  `Send`, unlike the stream itself,
/// so the recording worker can own it.
struct CpalStream {
    rx: Receiver<Vec<f32>>,
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
    native_rate: u32,
    native_channels: u16,
    target_rate: u32,
}

impl CaptureStream for CpalStream {
    fn read_chunk(&mut self) -> Result<Vec<f32>, CaptureError> {
        match self.rx.recv_timeout(Duration::from_secs(2)) {
            Ok(raw) => {
                let mono = downmix_to_mono(&raw, self.native_channels);
                Ok(resample(&mono, self.native_rate, self.target_rate))
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("capture: no audio from device for 2 s");
                Ok(Vec::new())
            }
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::StreamClosed),
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("capture: audio thread panicked during shutdown");
            }
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
