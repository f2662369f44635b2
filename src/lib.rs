//! Modular desktop shell core.
//!
//! Four subsystems make up the crate:
//!
//! * [`registry`] — discovers installed modules from declarative
//!   `module.toml` manifests and merges the user's favorites back in.
//! * [`store`] — namespaced, versioned JSON documents for persisted user
//!   data, written atomically.
//! * [`bus`] — a synchronous application-state bus with derived status
//!   reporting for UI surfaces.
//! * [`pipeline`] — voice capture and transcription, built on [`audio`]
//!   (cpal capture, WAV I/O) and [`stt`] (Whisper inference).
//!
//! [`config`] holds the on-disk settings and platform paths shared by
//! all of them.

pub mod audio;
pub mod bus;
pub mod config;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod stt;
