use std::io;
use std::path::{Path, PathBuf};

const SOUND_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

/// A playable sound, identified by file name (e.g. `"siren.mp3"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sound {
    pub name: String,
    /// Where the audio backend finds the file. `None` for sounds known only
    /// by name.
    pub path: Option<PathBuf>,
}

impl Sound {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }
}

/// The set of sounds the console recognizes.
///
/// Sorted by name. Always contains the default sound, which every unknown
/// identifier resolves to.
#[derive(Debug, Clone)]
pub struct SoundLibrary {
    sounds: Vec<Sound>,
    default_index: usize,
}

impl SoundLibrary {
    /// Build from a fixed list of names.
    pub fn from_names<I, S>(names: I, default: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sounds = names.into_iter().map(Sound::named).collect();
        Self::build(sounds, Sound::named(default))
    }

    /// Scan `dir` for audio files.
    ///
    /// The default sound is listed even if no file for it exists; playing
    /// it then fails in the backend, which is logged, not fatal.
    pub fn scan(dir: &Path, default: &str) -> io::Result<Self> {
        let mut sounds = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_audio = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOUND_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if !is_audio || !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                sounds.push(Sound {
                    name: name.to_owned(),
                    path: Some(path.clone()),
                });
            }
        }
        tracing::debug!(dir = %dir.display(), count = sounds.len(), "scanned sound library");

        let fallback = Sound {
            name: default.to_owned(),
            path: Some(dir.join(default)),
        };
        Ok(Self::build(sounds, fallback))
    }

    fn build(mut sounds: Vec<Sound>, fallback: Sound) -> Self {
        if !sounds.iter().any(|s| s.name == fallback.name) {
            sounds.push(fallback.clone());
        }
        sounds.sort_by(|a, b| a.name.cmp(&b.name));
        sounds.dedup_by(|a, b| a.name == b.name);
        let default_index = sounds
            .iter()
            .position(|s| s.name == fallback.name)
            .unwrap_or_default();
        Self {
            sounds,
            default_index,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sounds.iter().any(|s| s.name == name)
    }

    /// Look up `name`, falling back to the default sound.
    pub fn resolve(&self, name: &str) -> &Sound {
        self.sounds
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| {
                tracing::debug!(requested = name, "unknown sound, using default");
                self.default_sound()
            })
    }

    pub fn default_sound(&self) -> &Sound {
        &self.sounds[self.default_index]
    }

    /// The sound after `name` in library order, wrapping around.
    pub fn next_after(&self, name: &str) -> &Sound {
        let next = self
            .sounds
            .iter()
            .position(|s| s.name == name)
            .map_or(self.default_index, |i| (i + 1) % self.sounds.len());
        &self.sounds[next]
    }

    /// Whether at least one sound is backed by a file on disk. A library
    /// built from names alone can never be heard.
    pub fn has_playable_file(&self) -> bool {
        self.sounds
            .iter()
            .any(|s| s.path.as_deref().is_some_and(Path::is_file))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sounds.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_resolve_to_default() {
        let library = SoundLibrary::from_names(["siren.mp3", "horn.mp3"], "beep.mp3");
        assert_eq!(library.len(), 3);
        assert_eq!(library.resolve("siren.mp3").name, "siren.mp3");
        assert_eq!(library.resolve("nope.mp3").name, "beep.mp3");
        assert_eq!(library.default_sound().name, "beep.mp3");
    }

    #[test]
    fn next_after_cycles_in_name_order() {
        let library = SoundLibrary::from_names(["siren.mp3", "horn.mp3"], "beep.mp3");
        let names: Vec<_> = library.names().collect();
        assert_eq!(names, ["beep.mp3", "horn.mp3", "siren.mp3"]);

        assert_eq!(library.next_after("beep.mp3").name, "horn.mp3");
        assert_eq!(library.next_after("siren.mp3").name, "beep.mp3");
        assert_eq!(library.next_after("missing").name, "beep.mp3");
    }

    #[test]
    fn scan_picks_audio_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("siren.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("Chime.WAV"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let library = SoundLibrary::scan(dir.path(), "beep.mp3").unwrap();
        let names: Vec<_> = library.names().collect();
        assert_eq!(names, ["Chime.WAV", "beep.mp3", "siren.mp3"]);
        assert_eq!(
            library.resolve("siren.mp3").path.as_deref(),
            Some(dir.path().join("siren.mp3").as_path())
        );
        // Listed even though the file is missing.
        assert_eq!(
            library.default_sound().path.as_deref(),
            Some(dir.path().join("beep.mp3").as_path())
        );
    }

    #[test]
    fn playable_only_with_files_on_disk() {
        let named = SoundLibrary::from_names(["siren.mp3"], "beep.mp3");
        assert!(!named.has_playable_file());

        let dir = tempfile::tempdir().unwrap();
        let empty = SoundLibrary::scan(dir.path(), "beep.mp3").unwrap();
        assert!(!empty.has_playable_file());

        std::fs::write(dir.path().join("siren.mp3"), b"").unwrap();
        let scanned = SoundLibrary::scan(dir.path(), "beep.mp3").unwrap();
        assert!(scanned.has_playable_file());
    }

    #[test]
    fn scan_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SoundLibrary::scan(&dir.path().join("absent"), "beep.mp3").is_err());
    }
}
