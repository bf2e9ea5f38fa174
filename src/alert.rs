//! Alert playback boundary.
//!
//! The controller drives alerts through the `AlertSink` trait so tests can
//! observe transitions without an audio device. The real sink loops either a
//! synthesized tone or a decoded sound file through rodio.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use thiserror::Error;

const TONE_FREQ_HZ: f32 = 880.0;
const TONE_GAIN: f32 = 0.25;

/// Capability interface the session controller consumes.
///
/// All three operations are idempotent from the controller's point of view;
/// the controller only calls them on playing-state transitions.
pub trait AlertSink {
    /// Start or resume looped playback.
    fn play(&mut self);
    /// Pause playback, keeping the current position.
    fn pause(&mut self);
    /// Rewind to the beginning, leaving playback paused.
    fn reset(&mut self);
}

/// Errors raised while constructing the audio-backed sink.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Failed to open audio output: {0}")]
    OpenOutput(String),
    #[error("Failed to load alert sound {path}: {reason}")]
    LoadSound { path: PathBuf, reason: String },
}

enum AlertSource {
    Tone,
    Clip(Arc<[u8]>),
}

/// Looping alert backed by a rodio output stream.
pub struct ToneAlert {
    stream: OutputStream,
    sink: Sink,
    source: AlertSource,
    volume: f32,
}

impl ToneAlert {
    /// Alert that loops a synthesized tone.
    pub fn tone(volume: f32) -> Result<Self, AlertError> {
        Self::build(AlertSource::Tone, volume)
    }

    /// Alert that loops a decoded sound file.
    pub fn from_file(path: &Path, volume: f32) -> Result<Self, AlertError> {
        let bytes: Arc<[u8]> = std::fs::read(path)
            .map_err(|err| AlertError::LoadSound {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?
            .into();
        Decoder::new(Cursor::new(bytes.clone())).map_err(|err| AlertError::LoadSound {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Self::build(AlertSource::Clip(bytes), volume)
    }

    fn build(source: AlertSource, volume: f32) -> Result<Self, AlertError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|err| AlertError::OpenOutput(err.to_string()))?;
        let volume = volume.clamp(0.0, 1.0);
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(volume);
        sink.pause();
        let mut alert = Self {
            stream,
            sink,
            source,
            volume,
        };
        alert.enqueue();
        Ok(alert)
    }

    fn enqueue(&mut self) {
        match &self.source {
            AlertSource::Tone => {
                self.sink.append(SineWave::new(TONE_FREQ_HZ).amplify(TONE_GAIN));
            }
            AlertSource::Clip(bytes) => match Decoder::new(Cursor::new(bytes.clone())) {
                Ok(decoder) => self.sink.append(decoder.repeat_infinite()),
                Err(err) => tracing::error!("failed to decode alert sound: {err}"),
            },
        }
    }
}

impl AlertSink for ToneAlert {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn reset(&mut self) {
        // Replacing the sink stops the old queue and rewinds to the start.
        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(self.volume);
        sink.pause();
        self.sink = sink;
        self.enqueue();
    }
}

/// No-op sink used when no audio output is available.
pub struct NullAlert;

impl AlertSink for NullAlert {
    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_alert_survives_a_full_transition_cycle() {
        // Skip silently on machines without an audio output device.
        let Ok(mut alert) = ToneAlert::tone(0.2) else {
            return;
        };
        alert.play();
        alert.pause();
        alert.reset();
        alert.play();
    }

    #[test]
    fn missing_sound_file_is_a_load_error() {
        let err = ToneAlert::from_file(Path::new("/no/such/alert.mp3"), 1.0).unwrap_err();
        assert!(matches!(err, AlertError::LoadSound { .. }));
    }
}
