use std::path::PathBuf;
use thiserror::Error;

pub const AUDIO_INIT_REMEDIATION: &str = "playdeck could not open an audio output device.\n\
     Check that a sound server (PipeWire, PulseAudio or ALSA on Linux, CoreAudio on macOS, \
     WASAPI on Windows) is running and that an output device is connected and enabled, \
     then start playdeck again.";

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The audio subsystem could not be brought up; the UI must not start.
    #[error("audio backend unavailable: {reason}")]
    FatalInit { reason: String },

    #[error("cannot load {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },

    #[error("{operation} failed: {reason}")]
    TransientControl {
        operation: &'static str,
        reason: String,
    },

    #[error("settings file {} is unusable: {reason}", path.display())]
    ConfigCorruption { path: PathBuf, reason: String },
}

impl PlayerError {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::LoadFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn transient(operation: &'static str, err: &anyhow::Error) -> Self {
        Self::TransientControl {
            operation,
            reason: format!("{err:#}"),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInit { .. })
    }

    /// Text shown to the user before the process exits.
    pub fn remediation(&self) -> Option<&'static str> {
        self.is_fatal().then_some(AUDIO_INIT_REMEDIATION)
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
