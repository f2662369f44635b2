//! Observable application-state bus for one feature's runtime status.
//!
//! [`StateBus`] is the single source of truth for the dictation feature's
//! run status, decoupled from any presentation surface.  It is a tiny
//! single-writer state machine — `{Idle, Recording, Transcribing}` derived
//! from two booleans — whose only transitions are the four setters.
//!
//! Two notification styles fan out synchronously on every mutation, in
//! this order:
//!
//! 1. **Plain callback subscribers** — anonymous `FnMut(&StateSnapshot) ->
//!    bool` closures.  A callback signals that its owner is gone by
//!    returning `false`; it is then logged and removed after that delivery
//!    round, without affecting delivery to later subscribers.
//! 2. **Registered UI components** — [`UiComponent`] handles registered and
//!    unregistered explicitly at construction/teardown.  Before each round
//!    the bus sweeps components whose `is_alive()` is false, then calls
//!    `apply_state` on the survivors; a component error is logged
//!    per-handle and never aborts the round.
//!
//! All bus methods take `&mut self`, so re-entrant subscription changes
//! from inside a notification are impossible by construction — iteration
//! is always over a stable list.

pub mod status;

pub use status::{StatusCategory, StatusInfo};

// ---------------------------------------------------------------------------
// StateSnapshot
// ---------------------------------------------------------------------------

/// Immutable copy of the bus state handed to every subscriber and
/// component on notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Maximum recording duration in seconds.
    pub max_duration: u32,
    /// Whether a speech model is loaded and ready for inference.
    pub whisper_ready: bool,
    pub is_recording: bool,
    pub is_transcribing: bool,
    /// `whisper_ready && max_duration > 0 && !is_transcribing`.
    pub ready_to_record: bool,
    /// `is_recording || is_transcribing` — interactive controls should be
    /// disabled while this is set.
    pub ui_locked: bool,
}

// ---------------------------------------------------------------------------
// Subscriber / component plumbing
// ---------------------------------------------------------------------------

/// Identifies one plain-callback subscription for [`StateBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

/// Identifies one registered UI component for
/// [`StateBus::unregister_ui_component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentId(u64);

/// Push-style presentation handle.  Registered objects re-read
/// `ready_to_record` / `ui_locked` / status text on every `apply_state`
/// call and adjust their own presentation.
pub trait UiComponent: Send {
    /// `false` once the owning widget has been destroyed; the bus drops
    /// the registration on its next sweep.
    fn is_alive(&self) -> bool;

    /// Refresh the component from `snapshot`.  Errors are logged by the
    /// bus and do not remove the registration.
    fn apply_state(&mut self, snapshot: &StateSnapshot) -> anyhow::Result<()>;
}

struct Subscriber {
    id: SubscriberId,
    callback: Box<dyn FnMut(&StateSnapshot) -> bool + Send>,
}

struct Registration {
    id: ComponentId,
    component: Box<dyn UiComponent>,
}

// ---------------------------------------------------------------------------
// StateBus
// ---------------------------------------------------------------------------

/// Observable runtime status of the dictation feature.
///
/// One instance per pipeline owner, constructed at module activation.
/// Mutated only through its own setters, which notify synchronously —
/// there is no deferred or batched delivery.
///
/// ```rust
/// use modshell::bus::StateBus;
///
/// let mut bus = StateBus::new();
/// bus.subscribe(|snapshot| {
///     println!("ready: {}", snapshot.ready_to_record);
///     true
/// });
/// bus.set_whisper_ready(true);
/// bus.set_max_duration(30);
/// assert!(bus.is_ready_to_record());
/// ```
pub struct StateBus {
    max_duration: u32,
    whisper_ready: bool,
    is_recording: bool,
    is_transcribing: bool,

    subscribers: Vec<Subscriber>,
    components: Vec<Registration>,
    next_id: u64,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBus {
    pub fn new() -> Self {
        Self {
            max_duration: 0,
            whisper_ready: false,
            is_recording: false,
            is_transcribing: false,
            subscribers: Vec::new(),
            components: Vec::new(),
            next_id: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Setters (the only mutation path) — each notifies synchronously
    // -----------------------------------------------------------------------

    pub fn set_max_duration(&mut self, seconds: u32) {
        self.max_duration = seconds;
        self.notify();
    }

    pub fn set_whisper_ready(&mut self, ready: bool) {
        self.whisper_ready = ready;
        self.notify();
    }

    pub fn set_recording(&mut self, recording: bool) {
        if recording && self.is_transcribing {
            // Recording and transcribing are mutually exclusive.
            log::warn!("state bus: recording started while transcribing flag was set");
            self.is_transcribing = false;
        }
        self.is_recording = recording;
        self.notify();
    }

    pub fn set_transcribing(&mut self, transcribing: bool) {
        if transcribing && self.is_recording {
            log::warn!("state bus: transcription started while recording flag was set");
            self.is_recording = false;
        }
        self.is_transcribing = transcribing;
        self.notify();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn max_duration(&self) -> u32 {
        self.max_duration
    }

    pub fn whisper_ready(&self) -> bool {
        self.whisper_ready
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn is_transcribing(&self) -> bool {
        self.is_transcribing
    }

    /// Whether a recording may be started right now.
    pub fn is_ready_to_record(&self) -> bool {
        self.whisper_ready && self.max_duration > 0 && !self.is_transcribing
    }

    /// Whether interactive controls should be disabled.
    pub fn is_ui_locked(&self) -> bool {
        self.is_recording || self.is_transcribing
    }

    /// Copy of the current state, as delivered to subscribers.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            max_duration: self.max_duration,
            whisper_ready: self.whisper_ready,
            is_recording: self.is_recording,
            is_transcribing: self.is_transcribing,
            ready_to_record: self.is_ready_to_record(),
            ui_locked: self.is_ui_locked(),
        }
    }

    /// Status line and category for the current state.
    pub fn status_info(&self) -> StatusInfo {
        StatusInfo::from_snapshot(&self.snapshot())
    }

    // -----------------------------------------------------------------------
    // Subscription management
    // -----------------------------------------------------------------------

    /// Add a plain callback invoked on every state change.  The callback
    /// returns `false` to signal its owner is gone; the bus then removes it
    /// after that delivery round.
    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&StateSnapshot) -> bool + Send + 'static,
    ) -> SubscriberId {
        let id = SubscriberId(self.fresh_id());
        self.subscribers.push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscription.  Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Register a presentation handle.  The component immediately receives
    /// the current state so it never renders stale defaults.
    pub fn register_ui_component(&mut self, mut component: Box<dyn UiComponent>) -> ComponentId {
        let id = ComponentId(self.fresh_id());
        let snapshot = self.snapshot();
        if let Err(e) = component.apply_state(&snapshot) {
            log::warn!("state bus: component {id:?} failed initial apply: {e:#}");
        }
        self.components.push(Registration { id, component });
        id
    }

    /// Remove a registration.  Unknown ids are ignored.
    pub fn unregister_ui_component(&mut self, id: ComponentId) {
        self.components.retain(|r| r.id != id);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[cfg(test)]
    fn component_count(&self) -> usize {
        self.components.len()
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Fan the current state out: callbacks first, components second.
    fn notify(&mut self) {
        let snapshot = self.snapshot();

        let mut failed: Vec<SubscriberId> = Vec::new();
        for sub in &mut self.subscribers {
            if !(sub.callback)(&snapshot) {
                log::warn!("state bus: subscriber {:?} is gone, removing", sub.id);
                failed.push(sub.id);
            }
        }
        self.subscribers.retain(|s| !failed.contains(&s.id));

        // Sweep dead components before delivering to survivors.
        self.components.retain(|r| {
            let alive = r.component.is_alive();
            if !alive {
                log::debug!("state bus: sweeping dead component {:?}", r.id);
            }
            alive
        });
        for reg in &mut self.components {
            if let Err(e) = reg.component.apply_state(&snapshot) {
                log::warn!(
                    "state bus: component {:?} failed to apply state: {e:#}",
                    reg.id
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
