//! Shared handle over a speech engine.
//!
//! The engine is consulted from several places at once (the status bus
//! when reporting readiness, the transcription worker when running
//! inference), so it lives behind an `Arc<Mutex<..>>`.  [`EngineHandle`]
//! is a cheap `Clone` wrapper that serialises access; holders never see
//! the mutex directly.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::engine::{EngineError, SpeechEngine};

/// Cloneable, thread-safe handle over a boxed [`SpeechEngine`].
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<Box<dyn SpeechEngine>>>,
}

impl EngineHandle {
    pub fn new(engine: Box<dyn SpeechEngine>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Load a model into the engine.  No-op if one is already loaded.
    pub fn load(&self, model_ref: &str) -> Result<(), EngineError> {
        self.inner.lock().unwrap().load(model_ref)
    }

    /// Whether a model is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.lock().unwrap().is_loaded()
    }

    /// Drop the loaded model, freeing its memory.
    pub fn unload(&self) {
        self.inner.lock().unwrap().unload();
    }

    /// Run inference on a recorded file.  Blocks for the full inference
    /// time and holds the engine lock throughout, so concurrent calls
    /// queue up rather than interleave.
    pub fn transcribe(&self, audio_path: &Path) -> Result<String, EngineError> {
        self.inner.lock().unwrap().transcribe(audio_path)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::MockEngine;

    #[test]
    fn handle_reports_engine_readiness() {
        let handle = EngineHandle::new(Box::new(MockEngine::unloaded()));
        assert!(!handle.is_loaded());
        handle.load("any-model").unwrap();
        assert!(handle.is_loaded());
        handle.unload();
        assert!(!handle.is_loaded());
    }

    #[test]
    fn clones_share_the_same_engine() {
        let a = EngineHandle::new(Box::new(MockEngine::unloaded()));
        let b = a.clone();
        a.load("any-model").unwrap();
        assert!(b.is_loaded());
    }

    #[test]
    fn transcribe_goes_through_to_engine() {
        let handle = EngineHandle::new(Box::new(MockEngine::ok("dictated text")));
        let text = handle.transcribe(Path::new("take.wav")).unwrap();
        assert_eq!(text, "dictated text");
    }

    #[test]
    fn handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineHandle>();
    }
}
