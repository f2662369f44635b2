//! Recording worker.
//!
//! [`run_recorder`] is the body of the capture thread: it pulls chunks
//! from a [`CaptureStream`], tracks elapsed time from the sample count,
//! emits tick events on whole-second boundaries, and writes the take to
//! a WAV file when the loop ends.  The loop ends when the cancellation
//! token fires or the configured maximum duration is reached.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::audio::{write_wav_mono, CaptureStream, StreamSpec};

use super::PipelineEvent;

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between the coordination context
/// and the recording worker.  Checked once per capture loop iteration,
/// so cancellation is a soft cutoff: the chunk in flight still lands in
/// the take.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Recorder loop
// ---------------------------------------------------------------------------

/// Capture-thread body.  Consumes the stream, accumulates samples, and
/// finishes by writing `output` and emitting either `RecordingFinished`
/// or `RecordingFailed`.  Event-send failures are ignored: a dropped
/// receiver means the owner is shutting down.
pub(super) fn run_recorder(
    mut stream: Box<dyn CaptureStream>,
    spec: StreamSpec,
    max_duration_secs: u32,
    output: PathBuf,
    cancel: CancelToken,
    elapsed_secs: Arc<AtomicU64>,
    events: UnboundedSender<PipelineEvent>,
) {
    let mut samples: Vec<f32> = Vec::new();
    let mut last_tick: u64 = 0;
    // A zero rate is rejected at config load; keep the arithmetic safe
    // for hand-built specs anyway.
    let rate = u64::from(spec.sample_rate.max(1));
    let max_samples = max_duration_secs as u64 * rate;

    loop {
        if cancel.is_cancelled() {
            log::debug!("recorder: stop requested after {last_tick}s");
            break;
        }

        match stream.read_chunk() {
            Ok(chunk) => samples.extend_from_slice(&chunk),
            Err(e) => {
                log::error!("recorder: capture stream failed: {e}");
                stream.close();
                let _ = events.send(PipelineEvent::RecordingFailed {
                    message: e.to_string(),
                });
                return;
            }
        }

        let elapsed = samples.len() as u64 / rate;
        if elapsed > last_tick {
            last_tick = elapsed;
            elapsed_secs.store(elapsed, Ordering::SeqCst);
            let _ = events.send(PipelineEvent::RecordingTick { elapsed });
        }

        if samples.len() as u64 >= max_samples {
            log::info!("recorder: maximum duration of {max_duration_secs}s reached");
            break;
        }
    }

    stream.close();

    match write_wav_mono(&output, &samples, spec.sample_rate) {
        Ok(()) => {
            log::info!(
                "recorder: saved {:.1}s of audio to {}",
                samples.len() as f64 / spec.sample_rate as f64,
                output.display()
            );
            let _ = events.send(PipelineEvent::RecordingFinished { path: output });
        }
        Err(e) => {
            log::error!("recorder: failed to save {}: {e}", output.display());
            let _ = events.send(PipelineEvent::RecordingFailed {
                message: e.to_string(),
            });
        }
    }
}
