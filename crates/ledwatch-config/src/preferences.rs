// ── File-backed preferences ──
//
// A flat TOML table of string values, rewritten whole on every store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ledwatch_core::{CoreError, PreferenceStore};

use crate::ConfigError;

const PREFERENCES_FILE: &str = "preferences.toml";

/// Preferences persisted as `preferences.toml`.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store in the platform data directory.
    pub fn in_data_dir() -> Self {
        Self::new(crate::data_dir().join(PREFERENCES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(values)?)?;
        Ok(())
    }
}

fn storage_error(err: &ConfigError) -> CoreError {
    CoreError::Preferences {
        message: err.to_string(),
    }
}

impl PreferenceStore for FilePreferences {
    fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        let values = self.read_all().map_err(|e| storage_error(&e))?;
        Ok(values.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().expect("preferences lock poisoned");
        let mut values = self.read_all().map_err(|e| storage_error(&e))?;
        values.insert(key.to_owned(), value.to_owned());
        self.write_all(&values).map_err(|e| storage_error(&e))?;
        tracing::debug!(key, path = %self.path.display(), "preference saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use ledwatch_core::{GLOBAL_SOUND_KEY, Preferences};

    use super::*;

    #[test]
    fn survives_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(PREFERENCES_FILE);

        let prefs = Preferences::new(Arc::new(FilePreferences::new(&path)));
        assert_eq!(prefs.global_sound(), "beep.mp3");
        prefs.set_global_sound("horn.mp3").unwrap();

        let reopened = Preferences::new(Arc::new(FilePreferences::new(&path)));
        assert_eq!(reopened.global_sound(), "horn.mp3");
    }

    #[test]
    fn keeps_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferences::new(dir.path().join(PREFERENCES_FILE));

        store.store("theme", "dark").unwrap();
        store.store(GLOBAL_SOUND_KEY, "siren.mp3").unwrap();

        assert_eq!(store.load("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(
            store.load(GLOBAL_SOUND_KEY).unwrap().as_deref(),
            Some("siren.mp3")
        );
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "not = [valid").unwrap();

        let store = FilePreferences::new(&path);
        assert!(matches!(
            store.load(GLOBAL_SOUND_KEY),
            Err(CoreError::Preferences { .. })
        ));
        // Falls back to the default rather than failing.
        assert_eq!(Preferences::new(Arc::new(store)).global_sound(), "beep.mp3");
    }
}
