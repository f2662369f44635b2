//! Speech-to-text engine contract and implementations.
//!
//! [`SpeechEngine`] is the interface the pipeline consumes: an engine is
//! loaded with a model reference, queried for readiness, and asked to
//! transcribe a recorded WAV file.  [`WhisperEngine`] is the production
//! implementation wrapping a `whisper_rs::WhisperContext`.
//!
//! [`MockEngine`] (test-only) is a scripted stub so the pipeline can be
//! exercised without a GGML model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::{read_wav_mono, resample, WavError};

/// Sample rate the Whisper family of models expects.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// All errors that can arise from the speech engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// A transcription was requested with no model loaded.
    #[error("no model is loaded")]
    NotLoaded,

    /// `whisper_rs` failed to initialise a context or state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// The recorded audio file could not be read.
    #[error("audio file unreadable: {0}")]
    Audio(#[from] WavError),
}

// ---------------------------------------------------------------------------
// SpeechEngine trait
// ---------------------------------------------------------------------------

/// Load/unload-gated transcription engine.
///
/// # Contract
///
/// * `load` is a no-op when a model is already loaded (logged, `Ok`).
/// * `transcribe` returns [`EngineError::NotLoaded`] before a successful
///   `load` (or after `unload`).
/// * `transcribe` is synchronous and may block for the full inference
///   time; callers run it on a worker, never on the coordination context.
pub trait SpeechEngine: Send {
    fn load(&mut self, model_ref: &str) -> Result<(), EngineError>;
    fn is_loaded(&self) -> bool;
    fn unload(&mut self);
    fn transcribe(&self, audio_path: &Path) -> Result<String, EngineError>;
}

// Compile-time assertion: Box<dyn SpeechEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechEngine>) {}
};

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production engine wrapping a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created for every [`transcribe`] call, so a
/// loaded context never accumulates decoder state between takes.
///
/// [`transcribe`]: SpeechEngine::transcribe
pub struct WhisperEngine {
    ctx: Option<WhisperContext>,
    language: String,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("loaded", &self.ctx.is_some())
            .field("language", &self.language)
            .field("n_threads", &self.n_threads)
            .finish()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send` and `unsafe impl Sync` in whisper-rs — the model
// weights are read-only after loading.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Create an engine with no model loaded.  `language` is an ISO-639-1
    /// code or `"auto"`; `threads` of `None` picks a count from the CPU.
    pub fn new(language: impl Into<String>, threads: Option<i32>) -> Self {
        let n_threads = threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(4) as i32
        });
        Self {
            ctx: None,
            language: language.into(),
            n_threads,
        }
    }
}

impl SpeechEngine for WhisperEngine {
    fn load(&mut self, model_ref: &str) -> Result<(), EngineError> {
        if self.ctx.is_some() {
            log::info!("speech engine: a model is already loaded, ignoring load request");
            return Ok(());
        }

        if !Path::new(model_ref).exists() {
            return Err(EngineError::ModelNotFound(model_ref.to_string()));
        }

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_ref, ctx_params)
            .map_err(|e| EngineError::ContextInit(e.to_string()))?;

        log::info!("speech engine: model loaded from {model_ref}");
        self.ctx = Some(ctx);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.ctx.is_some()
    }

    fn unload(&mut self) {
        if self.ctx.take().is_some() {
            log::info!("speech engine: model unloaded");
        } else {
            log::debug!("speech engine: unload with no model loaded");
        }
    }

    fn transcribe(&self, audio_path: &Path) -> Result<String, EngineError> {
        let ctx = self.ctx.as_ref().ok_or(EngineError::NotLoaded)?;

        let (samples, rate) = read_wav_mono(audio_path)?;
        let audio = resample(&samples, rate, WHISPER_SAMPLE_RATE);
        if audio.is_empty() {
            return Err(EngineError::Transcription("recorded audio is empty".into()));
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        let lang: Option<&str> = if self.language == "auto" {
            None
        } else {
            Some(self.language.as_str())
        };
        params.set_language(lang);
        params.set_n_threads(self.n_threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = ctx
            .create_state()
            .map_err(|e| EngineError::ContextInit(e.to_string()))?;

        state
            .full(params, &audio)
            .map_err(|e| EngineError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| EngineError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// MockEngine  (test-only)
// ---------------------------------------------------------------------------

/// Scripted engine stub for pipeline tests.
#[cfg(test)]
pub struct MockEngine {
    loaded: bool,
    response: Result<String, String>,
    delay: std::time::Duration,
}

#[cfg(test)]
impl MockEngine {
    /// Loaded engine that returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            loaded: true,
            response: Ok(text.into()),
            delay: std::time::Duration::ZERO,
        }
    }

    /// Loaded engine that returns `Ok(text)` after sleeping — for
    /// exercising in-flight guards.
    pub fn ok_with_delay(text: impl Into<String>, delay: std::time::Duration) -> Self {
        Self {
            loaded: true,
            response: Ok(text.into()),
            delay,
        }
    }

    /// Loaded engine whose inference always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            loaded: true,
            response: Err(message.into()),
            delay: std::time::Duration::ZERO,
        }
    }

    /// Engine with no model loaded.
    pub fn unloaded() -> Self {
        Self {
            loaded: false,
            response: Err("unloaded".into()),
            delay: std::time::Duration::ZERO,
        }
    }
}

#[cfg(test)]
impl SpeechEngine for MockEngine {
    fn load(&mut self, _model_ref: &str) -> Result<(), EngineError> {
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn transcribe(&self, _audio_path: &Path) -> Result<String, EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.response
            .clone()
            .map_err(EngineError::Transcription)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let mut engine = WhisperEngine::new("auto", None);
        let result = engine.load("/nonexistent/model.bin");
        assert!(
            matches!(result, Err(EngineError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
        assert!(!engine.is_loaded());
    }

    #[test]
    fn transcribe_before_load_returns_not_loaded() {
        let engine = WhisperEngine::new("auto", None);
        let err = engine.transcribe(Path::new("whatever.wav")).unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded));
    }

    #[test]
    fn unload_without_model_is_harmless() {
        let mut engine = WhisperEngine::new("auto", None);
        engine.unload();
        assert!(!engine.is_loaded());
    }

    #[test]
    fn thread_count_is_positive_and_bounded() {
        let engine = WhisperEngine::new("auto", None);
        assert!(engine.n_threads >= 1 && engine.n_threads <= 8);
    }

    #[test]
    fn explicit_thread_count_is_respected() {
        let engine = WhisperEngine::new("fr", Some(2));
        assert_eq!(engine.n_threads, 2);
        assert_eq!(engine.language, "fr");
    }

    // --- MockEngine ---

    #[test]
    fn mock_load_unload_toggles_readiness() {
        let mut engine = MockEngine::unloaded();
        assert!(!engine.is_loaded());
        engine.load("any-model").unwrap();
        assert!(engine.is_loaded());
        engine.unload();
        assert!(!engine.is_loaded());
    }

    #[test]
    fn mock_unloaded_transcribe_errors() {
        let engine = MockEngine::unloaded();
        let err = engine.transcribe(Path::new("take.wav")).unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded));
    }

    #[test]
    fn mock_ok_returns_configured_text() {
        let engine = MockEngine::ok("hello");
        assert_eq!(engine.transcribe(Path::new("take.wav")).unwrap(), "hello");
    }

    #[test]
    fn box_dyn_speech_engine_compiles() {
        // If this test compiles, the trait is object-safe.
        let engine: Box<dyn SpeechEngine> = Box::new(MockEngine::ok("ok"));
        let _ = engine.transcribe(Path::new("take.wav"));
    }
}
