// ── Alarm orchestration ──
//
// Owns the exclusive audio channel and the Idle / Alarming / TestPlaying
// state machine. Every writer goes through the preemption rule: a new
// playback stops whatever is audible, nothing queues.

mod audio;
mod sounds;

use std::sync::Mutex;

use ledwatch_api::{DeviceId, DeviceRecord};
use tokio::sync::watch;
use tracing::{info, warn};

pub use audio::{AudioChannel, AudioError, Playback, SilentAudio};
pub use sounds::{Sound, SoundLibrary};

/// Orchestrator state. At most one non-idle state exists at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    /// A device is driving looping alarm playback.
    Alarming { client_id: DeviceId, sound: String },
    /// A user-started, non-looping preview.
    TestPlaying { sound: String },
}

impl AlarmState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn alarming_client(&self) -> Option<DeviceId> {
        match self {
            Self::Alarming { client_id, .. } => Some(*client_id),
            _ => None,
        }
    }
}

/// The orchestrator's record of an active alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSession {
    pub client_id: DeviceId,
    pub sound: String,
    pub looping: bool,
}

struct Inner {
    audio: Box<dyn AudioChannel>,
    state: AlarmState,
}

/// State machine guarding the single audio output.
pub struct AlarmOrchestrator {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<AlarmState>,
    library: SoundLibrary,
}

impl AlarmOrchestrator {
    pub fn new(audio: Box<dyn AudioChannel>, library: SoundLibrary) -> Self {
        let (state_tx, _) = watch::channel(AlarmState::Idle);
        Self {
            inner: Mutex::new(Inner {
                audio,
                state: AlarmState::Idle,
            }),
            state_tx,
            library,
        }
    }

    pub fn library(&self) -> &SoundLibrary {
        &self.library
    }

    pub fn state(&self) -> AlarmState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AlarmState> {
        self.state_tx.subscribe()
    }

    pub fn session(&self) -> Option<AlarmSession> {
        match self.state() {
            AlarmState::Alarming { client_id, sound } => Some(AlarmSession {
                client_id,
                sound,
                looping: true,
            }),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// `* → Alarming`. Preempts anything audible, test playback included.
    ///
    /// Unknown sounds fall back to the library default. A playback failure
    /// is logged; the state still records the alarm.
    pub fn play_alarm(&self, client_id: DeviceId, requested: &str) {
        let sound = self.library.resolve(requested).clone();
        let mut inner = self.lock();

        if let Err(e) = inner.audio.preempt(&sound, true) {
            warn!(error = %e, %client_id, "alarm playback failed");
        }
        self.transition(
            &mut inner,
            AlarmState::Alarming {
                client_id,
                sound: sound.name,
            },
        );
    }

    /// `* → Idle`, stopping any playback.
    pub fn stop_all(&self) {
        let mut inner = self.lock();
        inner.audio.stop();
        self.transition(&mut inner, AlarmState::Idle);
    }

    /// Check the active alarm against a fresh fleet snapshot.
    ///
    /// Ends the session when its device is gone or no longer reports
    /// `alarm`. Returns `true` if the session ended.
    pub fn reconcile(&self, devices: &[DeviceRecord]) -> bool {
        let mut inner = self.lock();
        let Some(client_id) = inner.state.alarming_client() else {
            return false;
        };

        let still_alarming = devices
            .iter()
            .any(|d| d.id == client_id && d.is_alarming());
        if still_alarming {
            return false;
        }

        info!(%client_id, "device no longer alarming, stopping alarm");
        inner.audio.stop();
        self.transition(&mut inner, AlarmState::Idle);
        true
    }

    /// Start or stop the test preview of `sound`.
    ///
    /// Starts non-looping playback when nothing is audible; otherwise stops
    /// whatever is playing, alarm included, and returns to Idle. An active
    /// alarm counts as audible even when its playback failed, so a preview
    /// never replaces an alarm session.
    pub fn toggle_test(&self, sound: &str) -> AlarmState {
        let mut inner = self.lock();

        if inner.audio.is_playing() || inner.state.alarming_client().is_some() {
            inner.audio.stop();
            self.transition(&mut inner, AlarmState::Idle);
            return AlarmState::Idle;
        }

        let sound = self.library.resolve(sound).clone();
        if let Err(e) = inner.audio.preempt(&sound, false) {
            warn!(error = %e, "test playback failed");
        }
        let next = AlarmState::TestPlaying { sound: sound.name };
        self.transition(&mut inner, next.clone());
        next
    }

    /// Return to Idle once a test preview has run out.
    pub fn poll_playback(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, AlarmState::TestPlaying { .. }) && !inner.audio.is_playing() {
            self.transition(&mut inner, AlarmState::Idle);
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("alarm lock poisoned")
    }

    fn transition(&self, inner: &mut Inner, next: AlarmState) {
        if inner.state != next {
            info!(from = ?inner.state, to = ?next, "alarm state");
        }
        inner.state = next.clone();
        self.state_tx.send_replace(next);
    }
}
