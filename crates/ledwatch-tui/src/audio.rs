//! Speaker output through `rodio`.
//!
//! The output stream lives on a dedicated thread; [`RodioAudio`] talks to
//! it over a channel and reads a shared "audible" flag the thread refreshes
//! while it waits for commands.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use ledwatch_core::{AudioChannel, AudioError, Sound};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

const IDLE_POLL: Duration = Duration::from_millis(100);

enum AudioCommand {
    Play {
        path: PathBuf,
        looping: bool,
        reply: mpsc::Sender<Result<(), String>>,
    },
    Stop,
}

pub struct RodioAudio {
    commands: mpsc::Sender<AudioCommand>,
    audible: Arc<AtomicBool>,
}

impl RodioAudio {
    /// Open the default output device.
    pub fn open() -> Result<Self, AudioError> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let audible = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&audible);
        std::thread::Builder::new()
            .name("ledwatch-audio".into())
            .spawn(move || audio_thread(&rx, &ready_tx, &flag))
            .map_err(|e| AudioError::Unavailable(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Unavailable("audio thread exited".into()))?
            .map_err(AudioError::Unavailable)?;

        Ok(Self { commands, audible })
    }
}

impl AudioChannel for RodioAudio {
    fn preempt(&mut self, sound: &Sound, looping: bool) -> Result<(), AudioError> {
        let playback_error = |reason: String| AudioError::Playback {
            sound: sound.name.clone(),
            reason,
        };
        let path = sound
            .path
            .clone()
            .ok_or_else(|| playback_error("no audio file".into()))?;

        let (reply, reply_rx) = mpsc::channel();
        self.commands
            .send(AudioCommand::Play {
                path,
                looping,
                reply,
            })
            .map_err(|_| AudioError::Unavailable("audio thread exited".into()))?;

        reply_rx
            .recv()
            .map_err(|_| AudioError::Unavailable("audio thread exited".into()))?
            .map_err(playback_error)
    }

    fn stop(&mut self) {
        self.audible.store(false, Ordering::Release);
        let _ = self.commands.send(AudioCommand::Stop);
    }

    fn is_playing(&self) -> bool {
        self.audible.load(Ordering::Acquire)
    }
}

fn audio_thread(
    rx: &mpsc::Receiver<AudioCommand>,
    ready: &mpsc::Sender<Result<(), String>>,
    audible: &AtomicBool,
) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    // Dropping the stream would otherwise print to the terminal.
    stream.log_on_drop(false);
    let _ = ready.send(Ok(()));

    let mut sink: Option<Sink> = None;
    loop {
        match rx.recv_timeout(IDLE_POLL) {
            Ok(AudioCommand::Play {
                path,
                looping,
                reply,
            }) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                let outcome = start(&stream, &path, looping).map(|started| {
                    sink = Some(started);
                });
                if let Err(reason) = &outcome {
                    warn!(path = %path.display(), %reason, "playback failed");
                }
                refresh(audible, sink.as_ref());
                let _ = reply.send(outcome);
            }
            Ok(AudioCommand::Stop) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        refresh(audible, sink.as_ref());
    }
    debug!("audio thread stopped");
}

fn start(stream: &OutputStream, path: &Path, looping: bool) -> Result<Sink, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;

    let sink = Sink::connect_new(stream.mixer());
    if looping {
        sink.append(source.repeat_infinite());
    } else {
        sink.append(source);
    }
    sink.play();
    debug!(path = %path.display(), looping, "playback started");
    Ok(sink)
}

fn refresh(audible: &AtomicBool, sink: Option<&Sink>) {
    audible.store(sink.is_some_and(|s| !s.empty()), Ordering::Release);
}
