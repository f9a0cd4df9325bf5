use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::sounds::Sound;

/// Failure of the audio output. Never fatal to the console.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),

    #[error("Cannot play {sound}: {reason}")]
    Playback { sound: String, reason: String },
}

/// The single exclusive audio output.
///
/// Exactly one sound plays at a time. `preempt` stops whatever is audible
/// before starting the new sound; there is no queue.
pub trait AudioChannel: Send {
    fn preempt(&mut self, sound: &Sound, looping: bool) -> Result<(), AudioError>;

    fn stop(&mut self);

    /// `true` while a sound is audible. A finished non-looping sound
    /// reports `false`.
    fn is_playing(&self) -> bool;
}

/// What a [`SilentAudio`] channel is "playing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    pub sound: String,
    pub looping: bool,
}

#[derive(Debug, Default)]
struct SilentState {
    current: Option<Playback>,
    history: Vec<Playback>,
}

/// Audio channel that tracks playback without producing sound.
///
/// Used when no output device is compiled in. Clones share state, so a
/// clone kept aside can observe what the orchestrator asked for.
#[derive(Debug, Clone, Default)]
pub struct SilentAudio {
    state: Arc<Mutex<SilentState>>,
}

impl SilentAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_playing(&self) -> Option<Playback> {
        self.lock().current.clone()
    }

    /// Every sound started so far, oldest first.
    pub fn history(&self) -> Vec<Playback> {
        self.lock().history.clone()
    }

    /// End the current sound as if a non-looping clip ran out.
    pub fn finish(&self) {
        let mut state = self.lock();
        if state.current.as_ref().is_some_and(|p| !p.looping) {
            state.current = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SilentState> {
        self.state.lock().expect("silent audio lock poisoned")
    }
}

impl AudioChannel for SilentAudio {
    fn preempt(&mut self, sound: &Sound, looping: bool) -> Result<(), AudioError> {
        let playback = Playback {
            sound: sound.name.clone(),
            looping,
        };
        let mut state = self.lock();
        state.history.push(playback.clone());
        state.current = Some(playback);
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().current = None;
    }

    fn is_playing(&self) -> bool {
        self.lock().current.is_some()
    }
}
