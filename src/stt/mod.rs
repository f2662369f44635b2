//! Speech-to-text: the engine contract, the Whisper implementation, and
//! the shared handle the rest of the application holds.

mod engine;
mod handle;

pub use engine::{EngineError, SpeechEngine, WhisperEngine};
pub use handle::EngineHandle;

#[cfg(test)]
pub use engine::MockEngine;
