//! Audio playback for interval completion sounds.

use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Tone played when an interval completes.
pub const COMPLETION_FREQUENCY_HZ: f32 = 660.0;
const CHIME_LENGTH: Duration = Duration::from_millis(150);

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
}

pub struct AudioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioPlayer {
    /// Opens the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Plays a short sine tone at `volume` (0.0 to 1.0) in the background.
    pub fn play_tone(&self, frequency: f32, volume: f32) -> Result<(), AudioError> {
        let sink = Sink::try_new(&self.handle)?;

        let tone = SineWave::new(frequency)
            .take_duration(CHIME_LENGTH)
            .fade_in(Duration::from_millis(5))
            .amplify(volume);

        sink.append(tone);
        sink.detach(); // Play in background
        Ok(())
    }
}

/// Owns the audio output, opening it on first use.
///
/// The output device is the only process-wide audio resource. It lives here
/// rather than in a global so its lifetime is explicit: `ensure` creates it,
/// `shutdown` releases it. A failed open marks the engine unavailable and
/// every later call becomes a no-op.
#[derive(Default)]
pub struct SoundEngine {
    player: Option<AudioPlayer>,
    unavailable: bool,
}

impl SoundEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the output device if that has not been tried yet.
    pub fn ensure(&mut self) -> Option<&AudioPlayer> {
        if self.player.is_none() && !self.unavailable {
            match AudioPlayer::new() {
                Ok(player) => {
                    debug!("audio output opened");
                    self.player = Some(player);
                }
                Err(e) => {
                    warn!(error = %e, "audio output unavailable, sounds disabled");
                    self.unavailable = true;
                }
            }
        }
        self.player.as_ref()
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.player.is_some()
    }

    /// Plays the completion chime if sound is enabled and audible.
    /// Returns true if a tone was queued.
    pub fn play_chime(&mut self, enabled: bool, volume: f32) -> bool {
        if !enabled || volume <= 0.0 {
            return false;
        }
        let Some(player) = self.ensure() else {
            return false;
        };
        match player.play_tone(COMPLETION_FREQUENCY_HZ, volume.min(1.0)) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to play chime");
                false
            }
        }
    }

    /// Releases the output device.
    pub fn shutdown(&mut self) {
        if self.player.take().is_some() {
            debug!("audio output released");
        }
    }
}
