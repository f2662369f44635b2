//! Capture/transcribe pipeline.
//!
//! [`Pipeline`] owns one recording session and one transcription at a
//! time.  Recording runs on a dedicated worker thread (the capture
//! stream is thread-bound); transcription runs on the tokio runtime
//! with the blocking inference moved to `spawn_blocking`.  Progress is
//! reported over an unbounded event channel; the receiver side is where
//! application state gets mutated, never the workers.
//!
//! Concurrency rules: a second `start_recording` while a session is
//! registered is rejected, a second `transcribe_async` while inference
//! is in flight is rejected.  Requests are never queued.

mod recorder;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::audio::{CaptureDevice, CaptureError, StreamSpec};
use crate::stt::EngineHandle;

pub use recorder::CancelToken;

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start_recording` while a session is still registered.
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// `stop_recording` with no session registered.
    #[error("no recording is in progress")]
    NotRecording,

    /// `transcribe_async` while a previous transcription is in flight.
    #[error("a transcription is already in progress")]
    AlreadyTranscribing,

    /// The capture device could not be opened.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Progress notifications emitted by the workers.  Consumed on the
/// coordination context, which owns all state mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// One more whole second of audio has been captured.
    RecordingTick { elapsed: u64 },
    /// The take has been written to disk.
    RecordingFinished { path: PathBuf },
    /// Capture or save failed; the session produced no usable take.
    RecordingFailed { message: String },
    /// Transcription has been running for `elapsed` seconds.
    TranscribingTick { elapsed: u64 },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Static pipeline parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capture format requested from the device.
    pub spec: StreamSpec,
    /// Soft cutoff: recording stops on its own after this many seconds.
    pub max_duration_secs: u32,
    /// Where the take is written.  Reused between takes; each recording
    /// overwrites the last.
    pub output_path: PathBuf,
    /// Optional phrase appended to every transcript as `"\n\n{phrase}"`.
    pub conclusion: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            spec: StreamSpec::default(),
            max_duration_secs: 60,
            output_path: PathBuf::from("current_record.wav"),
            conclusion: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct RecorderSession {
    cancel: CancelToken,
    join: thread::JoinHandle<()>,
}

pub struct Pipeline {
    device: Box<dyn CaptureDevice>,
    engine: EngineHandle,
    config: PipelineConfig,
    events: UnboundedSender<PipelineEvent>,
    session: Option<RecorderSession>,
    /// A cancelled session still writing its take; joined before the
    /// next recording starts and on cleanup.
    retired: Option<thread::JoinHandle<()>>,
    elapsed_secs: Arc<AtomicU64>,
    transcribing: Arc<AtomicBool>,
    transcribe_task: Option<tokio::task::JoinHandle<()>>,
}

impl Pipeline {
    /// Build a pipeline and the event receiver that goes with it.
    pub fn new(
        device: Box<dyn CaptureDevice>,
        engine: EngineHandle,
        config: PipelineConfig,
    ) -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Self {
            device,
            engine,
            config,
            events: tx,
            session: None,
            retired: None,
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            transcribing: Arc::new(AtomicBool::new(false)),
            transcribe_task: None,
        };
        (pipeline, rx)
    }

    /// Seconds of audio captured in the current (or last) session.
    pub fn elapsed(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribing.load(Ordering::SeqCst)
    }

    // --- Recording ---

    /// Open the capture device and start the recording worker.
    ///
    /// The session stays registered until [`stop_recording`] is called,
    /// even after the worker finishes on its own at the duration cutoff.
    ///
    /// [`stop_recording`]: Pipeline::stop_recording
    pub fn start_recording(&mut self) -> Result<(), PipelineError> {
        if self.session.is_some() {
            return Err(PipelineError::AlreadyRecording);
        }

        // A previous take may still be flushing to disk.
        if let Some(old) = self.retired.take() {
            let _ = old.join();
        }

        let stream = self.device.open(self.config.spec)?;

        self.elapsed_secs.store(0, Ordering::SeqCst);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let spec = self.config.spec;
        let max_duration = self.config.max_duration_secs;
        let output = self.config.output_path.clone();
        let elapsed = Arc::clone(&self.elapsed_secs);
        let events = self.events.clone();

        let join = thread::Builder::new()
            .name("recorder".into())
            .spawn(move || {
                recorder::run_recorder(
                    stream,
                    spec,
                    max_duration,
                    output,
                    worker_cancel,
                    elapsed,
                    events,
                );
            })
            .map_err(CaptureError::Thread)?;

        log::info!("pipeline: recording started (max {max_duration}s)");
        self.session = Some(RecorderSession { cancel, join });
        Ok(())
    }

    /// Cancel the recording worker and return the output path.
    ///
    /// Does not wait for the take to be saved; `RecordingFinished` on
    /// the event channel is the signal that the file is ready.
    pub fn stop_recording(&mut self) -> Result<PathBuf, PipelineError> {
        let session = self.session.take().ok_or(PipelineError::NotRecording)?;
        session.cancel.cancel();
        self.retired = Some(session.join);
        log::info!("pipeline: recording stopped");
        Ok(self.config.output_path.clone())
    }

    // --- Transcription ---

    /// Transcribe the last take and deliver the result through `cb`,
    /// exactly once.
    ///
    /// `cb` receives `None` when the engine has no model loaded, when no
    /// take exists on disk, or when inference fails; those conditions
    /// are logged, not returned as errors.  Only a transcription already
    /// in flight is rejected.
    pub fn transcribe_async(
        &mut self,
        cb: impl FnOnce(Option<String>) + Send + 'static,
    ) -> Result<(), PipelineError> {
        if self.transcribing.load(Ordering::SeqCst) {
            return Err(PipelineError::AlreadyTranscribing);
        }

        if !self.engine.is_loaded() {
            log::warn!("pipeline: transcription requested with no model loaded");
            cb(None);
            return Ok(());
        }

        let audio_path = self.config.output_path.clone();
        if !audio_path.exists() {
            log::warn!(
                "pipeline: no take found at {}, nothing to transcribe",
                audio_path.display()
            );
            cb(None);
            return Ok(());
        }

        self.transcribing.store(true, Ordering::SeqCst);

        let engine = self.engine.clone();
        let conclusion = self.config.conclusion.clone();
        let events = self.events.clone();
        let in_flight = Arc::clone(&self.transcribing);

        let task = tokio::spawn(async move {
            let ticker = tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.tick().await; // first tick fires immediately
                let mut elapsed = 0u64;
                loop {
                    interval.tick().await;
                    elapsed += 1;
                    if events
                        .send(PipelineEvent::TranscribingTick { elapsed })
                        .is_err()
                    {
                        break;
                    }
                }
            });

            let result =
                tokio::task::spawn_blocking(move || engine.transcribe(&audio_path)).await;

            ticker.abort();
            in_flight.store(false, Ordering::SeqCst);

            match result {
                Ok(Ok(text)) => {
                    let full = match conclusion {
                        Some(phrase) if !phrase.is_empty() => format!("{text}\n\n{phrase}"),
                        _ => text,
                    };
                    log::info!("pipeline: transcription finished ({} chars)", full.len());
                    cb(Some(full));
                }
                Ok(Err(e)) => {
                    log::error!("pipeline: transcription failed: {e}");
                    cb(None);
                }
                Err(e) => {
                    log::error!("pipeline: transcription worker panicked: {e}");
                    cb(None);
                }
            }
        });

        self.transcribe_task = Some(task);
        Ok(())
    }

    // --- Shutdown ---

    /// Cancel and join every worker.  After this returns, no callback
    /// or event will fire again from this pipeline.
    pub async fn cleanup(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            let _ = tokio::task::spawn_blocking(move || session.join.join()).await;
        }
        if let Some(old) = self.retired.take() {
            let _ = tokio::task::spawn_blocking(move || old.join()).await;
        }
        if let Some(task) = self.transcribe_task.take() {
            let _ = task.await;
        }
        log::debug!("pipeline: cleaned up");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{read_wav_mono, write_wav_mono, CaptureStream};
    use crate::stt::MockEngine;
    use std::sync::mpsc as std_mpsc;
    use tokio::time::timeout;

    const RECV_DEADLINE: Duration = Duration::from_secs(5);

    /// Scripted capture device: every `open` hands out a stream that
    /// yields fixed-size chunks of silence until closed.
    struct FakeDevice {
        chunk_len: usize,
        fail_open: bool,
        fail_after_reads: Option<usize>,
    }

    impl FakeDevice {
        fn new(chunk_len: usize) -> Self {
            Self {
                chunk_len,
                fail_open: false,
                fail_after_reads: None,
            }
        }

        fn failing_open() -> Self {
            Self {
                chunk_len: 0,
                fail_open: true,
                fail_after_reads: None,
            }
        }

        fn failing_after(chunk_len: usize, reads: usize) -> Self {
            Self {
                chunk_len,
                fail_open: false,
                fail_after_reads: Some(reads),
            }
        }
    }

    impl CaptureDevice for FakeDevice {
        fn open(&self, _spec: StreamSpec) -> Result<Box<dyn CaptureStream>, CaptureError> {
            if self.fail_open {
                return Err(CaptureError::NoDevice);
            }
            Ok(Box::new(FakeStream {
                chunk_len: self.chunk_len,
                reads: 0,
                fail_after_reads: self.fail_after_reads,
                closed: false,
            }))
        }
    }

    struct FakeStream {
        chunk_len: usize,
        reads: usize,
        fail_after_reads: Option<usize>,
        closed: bool,
    }

    impl CaptureStream for FakeStream {
        fn read_chunk(&mut self) -> Result<Vec<f32>, CaptureError> {
            if let Some(limit) = self.fail_after_reads {
                if self.reads >= limit {
                    return Err(CaptureError::StreamClosed);
                }
            }
            self.reads += 1;
            // Pace the fake stream so cancellation has a chance to land
            // between chunks.
            std::thread::sleep(Duration::from_millis(2));
            Ok(vec![0.25; self.chunk_len])
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn test_config(dir: &tempfile::TempDir, max_secs: u32) -> PipelineConfig {
        PipelineConfig {
            spec: StreamSpec::default(),
            max_duration_secs: max_secs,
            output_path: dir.path().join("current_record.wav"),
            conclusion: None,
        }
    }

    fn pipeline_with(
        device: FakeDevice,
        engine: MockEngine,
        config: PipelineConfig,
    ) -> (Pipeline, UnboundedReceiver<PipelineEvent>) {
        Pipeline::new(Box::new(device), EngineHandle::new(Box::new(engine)), config)
    }

    async fn next_event(rx: &mut UnboundedReceiver<PipelineEvent>) -> PipelineEvent {
        timeout(RECV_DEADLINE, rx.recv())
            .await
            .expect("timed out waiting for pipeline event")
            .expect("event channel closed")
    }

    async fn wait_for_finished(rx: &mut UnboundedReceiver<PipelineEvent>) -> PathBuf {
        loop {
            match next_event(rx).await {
                PipelineEvent::RecordingFinished { path } => return path,
                PipelineEvent::RecordingTick { .. } => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    // --- recording ---

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _rx) =
            pipeline_with(FakeDevice::new(64), MockEngine::ok(""), test_config(&dir, 60));
        p.start_recording().unwrap();
        assert!(matches!(
            p.start_recording(),
            Err(PipelineError::AlreadyRecording)
        ));
        p.stop_recording().unwrap();
        p.cleanup().await;
    }

    #[tokio::test]
    async fn stop_without_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _rx) =
            pipeline_with(FakeDevice::new(64), MockEngine::ok(""), test_config(&dir, 60));
        assert!(matches!(
            p.stop_recording(),
            Err(PipelineError::NotRecording)
        ));
    }

    #[tokio::test]
    async fn stop_saves_the_take_and_reports_finished() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        let expected = config.output_path.clone();
        let (mut p, mut rx) = pipeline_with(FakeDevice::new(512), MockEngine::ok(""), config);

        p.start_recording().unwrap();
        assert!(p.is_recording());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let path = p.stop_recording().unwrap();
        assert_eq!(path, expected);
        assert!(!p.is_recording());

        let saved = wait_for_finished(&mut rx).await;
        assert_eq!(saved, expected);
        let (samples, rate) = read_wav_mono(&saved).unwrap();
        assert!(!samples.is_empty());
        assert_eq!(rate, StreamSpec::default().sample_rate);
        p.cleanup().await;
    }

    #[tokio::test]
    async fn recording_ticks_report_elapsed_seconds() {
        let dir = tempfile::tempdir().unwrap();
        // Half a second of audio per read: the first tick lands after
        // two reads.
        let chunk = StreamSpec::default().sample_rate as usize / 2;
        let (mut p, mut rx) =
            pipeline_with(FakeDevice::new(chunk), MockEngine::ok(""), test_config(&dir, 60));

        p.start_recording().unwrap();
        let event = next_event(&mut rx).await;
        assert_eq!(event, PipelineEvent::RecordingTick { elapsed: 1 });
        assert!(p.elapsed() >= 1);
        p.stop_recording().unwrap();
        p.cleanup().await;
    }

    #[tokio::test]
    async fn max_duration_cuts_off_but_session_stays_registered() {
        let dir = tempfile::tempdir().unwrap();
        // One read delivers a full second, so a 1s limit ends the
        // worker immediately.
        let chunk = StreamSpec::default().sample_rate as usize;
        let (mut p, mut rx) =
            pipeline_with(FakeDevice::new(chunk), MockEngine::ok(""), test_config(&dir, 1));

        p.start_recording().unwrap();
        let saved = wait_for_finished(&mut rx).await;
        assert!(saved.exists());

        // The worker is done, but the session is still ours to close.
        assert!(p.is_recording());
        p.stop_recording().unwrap();
        assert!(!p.is_recording());
        p.cleanup().await;
    }

    #[tokio::test]
    async fn device_open_failure_surfaces_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _rx) = pipeline_with(
            FakeDevice::failing_open(),
            MockEngine::ok(""),
            test_config(&dir, 60),
        );
        assert!(matches!(
            p.start_recording(),
            Err(PipelineError::Capture(CaptureError::NoDevice))
        ));
        assert!(!p.is_recording());
    }

    #[tokio::test]
    async fn stream_failure_mid_recording_reports_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, mut rx) = pipeline_with(
            FakeDevice::failing_after(64, 3),
            MockEngine::ok(""),
            test_config(&dir, 60),
        );

        p.start_recording().unwrap();
        let event = next_event(&mut rx).await;
        assert!(
            matches!(event, PipelineEvent::RecordingFailed { .. }),
            "expected RecordingFailed, got {event:?}"
        );
        // The session is still registered even though the worker died.
        p.stop_recording().unwrap();
        p.cleanup().await;
    }

    #[tokio::test]
    async fn zero_sample_rate_does_not_panic_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir, 1);
        config.spec.sample_rate = 0;
        let (mut p, mut rx) =
            pipeline_with(FakeDevice::new(64), MockEngine::ok(""), config);

        p.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        p.stop_recording().unwrap();

        // The worker must finish cleanly instead of dying on a division.
        let event = next_event(&mut rx).await;
        assert!(
            matches!(
                event,
                PipelineEvent::RecordingTick { .. }
                    | PipelineEvent::RecordingFinished { .. }
                    | PipelineEvent::RecordingFailed { .. }
            ),
            "unexpected event: {event:?}"
        );
        p.cleanup().await;
    }

    // --- transcription ---

    /// Record a short take so there is a file for transcription to read.
    fn seed_take(config: &PipelineConfig) {
        write_wav_mono(&config.output_path, &vec![0.1; 4410], config.spec.sample_rate).unwrap();
    }

    #[tokio::test]
    async fn transcription_delivers_text_through_callback() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        seed_take(&config);
        let (mut p, _rx) = pipeline_with(FakeDevice::new(64), MockEngine::ok("hello world"), config);

        let (tx, rx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        p.cleanup().await;

        assert_eq!(rx.recv().unwrap(), Some("hello world".to_string()));
    }

    #[tokio::test]
    async fn conclusion_phrase_is_appended_to_the_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir, 60);
        config.conclusion = Some("Sent from dictation".to_string());
        seed_take(&config);
        let (mut p, _rx) = pipeline_with(FakeDevice::new(64), MockEngine::ok("hello"), config);

        let (tx, rx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        p.cleanup().await;

        assert_eq!(
            rx.recv().unwrap(),
            Some("hello\n\nSent from dictation".to_string())
        );
    }

    #[tokio::test]
    async fn empty_conclusion_is_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir, 60);
        config.conclusion = Some(String::new());
        seed_take(&config);
        let (mut p, _rx) = pipeline_with(FakeDevice::new(64), MockEngine::ok("hello"), config);

        let (tx, rx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        p.cleanup().await;

        assert_eq!(rx.recv().unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn unloaded_engine_yields_none_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        seed_take(&config);
        let (mut p, _rx) = pipeline_with(FakeDevice::new(64), MockEngine::unloaded(), config);

        let (tx, rx) = std_mpsc::channel();
        let result = p.transcribe_async(move |text| tx.send(text).unwrap());
        assert!(result.is_ok());
        assert_eq!(rx.recv().unwrap(), None);
        assert!(!p.is_transcribing());
    }

    #[tokio::test]
    async fn missing_take_yields_none_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _rx) = pipeline_with(
            FakeDevice::new(64),
            MockEngine::ok("never used"),
            test_config(&dir, 60),
        );

        let (tx, rx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        assert_eq!(rx.recv().unwrap(), None);
    }

    #[tokio::test]
    async fn inference_failure_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        seed_take(&config);
        let (mut p, _rx) =
            pipeline_with(FakeDevice::new(64), MockEngine::failing("boom"), config);

        let (tx, rx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        p.cleanup().await;

        assert_eq!(rx.recv().unwrap(), None);
        assert!(!p.is_transcribing());
    }

    #[tokio::test]
    async fn concurrent_transcriptions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        seed_take(&config);
        let engine = MockEngine::ok_with_delay("slow", Duration::from_millis(200));
        let (mut p, _rx) = pipeline_with(FakeDevice::new(64), engine, config);

        let (tx, rx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        assert!(p.is_transcribing());
        assert!(matches!(
            p.transcribe_async(|_| {}),
            Err(PipelineError::AlreadyTranscribing)
        ));
        p.cleanup().await;

        assert_eq!(rx.recv().unwrap(), Some("slow".to_string()));
        // In-flight guard clears, so a new request goes through again.
        let (tx2, rx2) = std_mpsc::channel();
        p.transcribe_async(move |text| tx2.send(text).unwrap()).unwrap();
        p.cleanup().await;
        assert_eq!(rx2.recv().unwrap(), Some("slow".to_string()));
    }

    #[tokio::test]
    async fn transcribing_ticks_are_emitted_while_inference_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        seed_take(&config);
        let engine = MockEngine::ok_with_delay("slow", Duration::from_millis(1200));
        let (mut p, mut rx) = pipeline_with(FakeDevice::new(64), engine, config);

        p.transcribe_async(|_| {}).unwrap();
        let event = next_event(&mut rx).await;
        assert_eq!(event, PipelineEvent::TranscribingTick { elapsed: 1 });
        p.cleanup().await;
    }

    #[tokio::test]
    async fn cleanup_is_safe_with_nothing_running() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _rx) =
            pipeline_with(FakeDevice::new(64), MockEngine::ok(""), test_config(&dir, 60));
        p.cleanup().await;
        p.cleanup().await;
    }

    #[tokio::test]
    async fn record_then_transcribe_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 60);
        let (mut p, mut rx) =
            pipeline_with(FakeDevice::new(2048), MockEngine::ok("the take"), config);

        p.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        p.stop_recording().unwrap();
        wait_for_finished(&mut rx).await;

        let (tx, crx) = std_mpsc::channel();
        p.transcribe_async(move |text| tx.send(text).unwrap()).unwrap();
        p.cleanup().await;
        assert_eq!(crx.recv().unwrap(), Some("the take".to_string()));
    }
}
