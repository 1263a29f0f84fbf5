use std::path::{Path, PathBuf};

pub const DEFAULT_VOLUME: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
    Playing,
    Paused,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "No file",
            Self::Loaded => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn classify(path: &Path, video_extensions: &[String]) -> Self {
        if has_extension_in(path, video_extensions) {
            Self::Video
        } else {
            Self::Audio
        }
    }
}

/// In-memory record of what is loaded and how far along it is.
///
/// Positions and durations are seconds; a duration of `0.0` means the length
/// is not known.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub current_file: Option<PathBuf>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub position: f64,
    pub duration: f64,
    pub volume: f32,
}

impl PlaybackSession {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.current_file, self.is_playing, self.is_paused) {
            (None, _, _) => SessionState::Empty,
            (Some(_), true, true) => SessionState::Paused,
            (Some(_), true, false) => SessionState::Playing,
            (Some(_), false, _) => SessionState::Loaded,
        }
    }

    pub fn current_name(&self) -> Option<String> {
        self.current_file.as_deref().map(display_name)
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_file: None,
            is_playing: false,
            is_paused: false,
            position: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
        }
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// `extensions` are stored lowercase with a leading dot, e.g. `".mp3"`.
pub fn has_extension_in(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    extensions.iter().any(|supported| {
        supported
            .strip_prefix('.')
            .unwrap_or(supported)
            .eq_ignore_ascii_case(ext)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_derived_from_flags() {
        let mut session = PlaybackSession::default();
        assert_eq!(session.state(), SessionState::Empty);

        session.current_file = Some(PathBuf::from("a.mp3"));
        assert_eq!(session.state(), SessionState::Loaded);

        session.is_playing = true;
        assert_eq!(session.state(), SessionState::Playing);

        session.is_paused = true;
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn extension_match_ignores_case_and_dot() {
        let formats = vec![String::from(".mp3"), String::from("wav")];
        assert!(has_extension_in(Path::new("LOUD.MP3"), &formats));
        assert!(has_extension_in(Path::new("x.Wav"), &formats));
        assert!(!has_extension_in(Path::new("notes.txt"), &formats));
        assert!(!has_extension_in(Path::new("mp3"), &formats));
    }

    #[test]
    fn video_files_are_classified_by_extension() {
        let video = vec![String::from(".mkv")];
        assert_eq!(
            MediaKind::classify(Path::new("clip.MKV"), &video),
            MediaKind::Video
        );
        assert_eq!(
            MediaKind::classify(Path::new("song.flac"), &video),
            MediaKind::Audio
        );
    }

    #[test]
    fn default_session_starts_at_seventy_percent_volume() {
        let session = PlaybackSession::default();
        assert_eq!(session.volume, 0.7);
        assert_eq!(session.current_name(), None);
        assert_eq!(PlaybackSession::with_volume(3.0).volume, 1.0);
    }
}
