//! Human-readable status derived from the bus state.

use super::StateSnapshot;

/// Presentation category of a status line, for color / icon selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Ready,
    Error,
    Neutral,
    Warning,
}

/// A status line plus its presentation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    pub text: &'static str,
    pub category: StatusCategory,
}

impl StatusInfo {
    /// Pure function of the current state.  Priority order:
    /// transcribing > recording > ready > engine missing > neutral.
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Self {
        if snapshot.is_transcribing {
            Self {
                text: "Transcribing…",
                category: StatusCategory::Warning,
            }
        } else if snapshot.is_recording {
            Self {
                text: "Recording…",
                category: StatusCategory::Warning,
            }
        } else if snapshot.whisper_ready && snapshot.max_duration > 0 {
            Self {
                text: "Ready",
                category: StatusCategory::Ready,
            }
        } else if !snapshot.whisper_ready {
            Self {
                text: "Speech engine not loaded",
                category: StatusCategory::Error,
            }
        } else {
            Self {
                text: "Waiting for configuration",
                category: StatusCategory::Neutral,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(
        max_duration: u32,
        whisper_ready: bool,
        is_recording: bool,
        is_transcribing: bool,
    ) -> StateSnapshot {
        StateSnapshot {
            max_duration,
            whisper_ready,
            is_recording,
            is_transcribing,
            ready_to_record: whisper_ready && max_duration > 0 && !is_transcribing,
            ui_locked: is_recording || is_transcribing,
        }
    }

    #[test]
    fn transcribing_dominates_everything_else() {
        // Whatever the other three fields say, transcribing wins.
        for max_duration in [0, 10] {
            for whisper_ready in [false, true] {
                for is_recording in [false, true] {
                    let info = StatusInfo::from_snapshot(&snapshot(
                        max_duration,
                        whisper_ready,
                        is_recording,
                        true,
                    ));
                    assert_eq!(info.category, StatusCategory::Warning);
                    assert_eq!(info.text, "Transcribing…");
                }
            }
        }
    }

    #[test]
    fn recording_beats_ready() {
        let info = StatusInfo::from_snapshot(&snapshot(10, true, true, false));
        assert_eq!(info.text, "Recording…");
    }

    #[test]
    fn ready_requires_engine_and_duration() {
        let info = StatusInfo::from_snapshot(&snapshot(10, true, false, false));
        assert_eq!(info.category, StatusCategory::Ready);
    }

    #[test]
    fn missing_engine_is_an_error() {
        let info = StatusInfo::from_snapshot(&snapshot(10, false, false, false));
        assert_eq!(info.category, StatusCategory::Error);
    }

    #[test]
    fn engine_loaded_but_no_duration_is_neutral() {
        let info = StatusInfo::from_snapshot(&snapshot(0, true, false, false));
        assert_eq!(info.category, StatusCategory::Neutral);
    }
}
