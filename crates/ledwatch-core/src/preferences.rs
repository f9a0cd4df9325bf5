// ── Durable console preferences ──
//
// A small key-value surface that survives restarts. The storage backend
// is injected; ledwatch-config provides a file-backed one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::config::DEFAULT_SOUND;
use crate::error::CoreError;

pub const GLOBAL_SOUND_KEY: &str = "global_alarm_sound";

/// Durable string key-value storage.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, CoreError>;

    fn store(&self, key: &str, value: &str) -> Result<(), CoreError>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .values
            .lock()
            .expect("preferences lock poisoned")
            .get(key)
            .cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.values
            .lock()
            .expect("preferences lock poisoned")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Typed access to the console's preferences.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// The global alarm sound, or `"beep.mp3"` if never written.
    ///
    /// A storage failure is logged and treated as "never written".
    pub fn global_sound(&self) -> String {
        match self.store.load(GLOBAL_SOUND_KEY) {
            Ok(Some(sound)) if !sound.trim().is_empty() => sound,
            Ok(_) => DEFAULT_SOUND.to_owned(),
            Err(e) => {
                warn!(error = %e, "cannot read global sound preference");
                DEFAULT_SOUND.to_owned()
            }
        }
    }

    pub fn set_global_sound(&self, sound: &str) -> Result<(), CoreError> {
        self.store.store(GLOBAL_SOUND_KEY, sound)
    }
}
