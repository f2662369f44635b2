//! Audio capture and file handling.
//!
//! * [`capture`] — the [`CaptureDevice`]/[`CaptureStream`] contracts and
//!   the cpal-backed default device.
//! * [`convert`] — channel downmix and linear resampling.
//! * [`wav`] — WAV persistence for recorded takes (`hound`).

pub mod capture;
pub mod convert;
pub mod wav;

pub use capture::{CaptureDevice, CaptureError, CaptureStream, CpalCaptureDevice, StreamSpec};
pub use convert::{downmix_to_mono, resample};
pub use wav::{read_wav_mono, write_wav_mono, WavError};
