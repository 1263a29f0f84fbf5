use crate::config::Config;
use crate::engine::PlaybackEngine;
use crate::library;
use crate::model::{MediaKind, SessionState, display_name};
use crate::playlist::Playlist;
use std::path::Path;
use tracing::{info, warn};

pub const SEEK_STEP_SECONDS: f64 = 10.0;
pub const VOLUME_STEP: f32 = 0.1;

/// Session state machine: validates user intents against the current state
/// and drives the engine and playlist accordingly.
pub struct PlayerCore {
    engine: PlaybackEngine,
    playlist: Playlist,
    formats: Vec<String>,
    video_formats: Vec<String>,
    dragging: bool,
    pub fullscreen: bool,
    pub dirty: bool,
    pub status: String,
}

impl PlayerCore {
    pub fn new(engine: PlaybackEngine, config: &Config) -> Self {
        Self {
            engine,
            playlist: Playlist::default(),
            formats: config.supported_formats(),
            video_formats: config.video_formats(),
            dragging: false,
            fullscreen: false,
            dirty: true,
            status: String::from("Open a file with :open <path> or a folder with :folder <path>"),
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    pub fn current_name(&self) -> Option<String> {
        self.engine.session().current_name()
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        let path = self.engine.session().current_file.as_deref()?;
        Some(MediaKind::classify(path, &self.video_formats))
    }

    pub fn open_file(&mut self, path: &Path) -> bool {
        if !self.load(path) {
            return false;
        }
        self.playlist = Playlist::single(path);
        self.start_playback();
        true
    }

    /// Replaces the playlist with the media files in `dir` and starts the
    /// first one. A folder without media leaves everything as it was.
    pub fn open_folder(&mut self, dir: &Path) -> bool {
        let files = library::scan_folder(dir, &self.formats);
        if files.is_empty() {
            self.set_status(&format!("No media files in {}", dir.display()));
            return false;
        }

        let count = files.len();
        self.playlist = Playlist::new(files);
        info!(dir = %dir.display(), count, "playlist replaced");
        if let Some(first) = self.playlist.current().map(Path::to_path_buf)
            && self.load(&first)
        {
            self.start_playback();
        }
        true
    }

    pub fn next(&mut self) {
        if let Some(path) = self.playlist.next() {
            self.load_and_play(&path);
        }
    }

    pub fn previous(&mut self) {
        if let Some(path) = self.playlist.previous() {
            self.load_and_play(&path);
        }
    }

    pub fn select(&mut self, index: usize) {
        if let Some(path) = self.playlist.select(index) {
            self.load_and_play(&path);
        }
    }

    pub fn toggle_play_pause(&mut self) {
        match self.state() {
            SessionState::Empty => {}
            SessionState::Loaded => self.start_playback(),
            SessionState::Playing => {
                self.engine.pause();
                self.refresh_status();
            }
            SessionState::Paused => {
                self.engine.resume();
                self.refresh_status();
            }
        }
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.refresh_status();
    }

    pub fn seek(&mut self, seconds: f64) {
        if self.state() == SessionState::Empty {
            return;
        }
        self.engine.seek(seconds);
        self.dirty = true;
    }

    /// Seeks to `value` percent of the track. Ignored while the progress
    /// control is being dragged or the length is unknown.
    pub fn seek_percent(&mut self, value: f64) {
        let duration = self.engine.get_duration();
        if self.dragging || duration <= 0.0 {
            return;
        }
        self.seek(value.clamp(0.0, 100.0) / 100.0 * duration);
    }

    pub fn seek_by(&mut self, delta: f64) {
        let base = match self.state() {
            SessionState::Playing | SessionState::Paused => self.engine.get_position(),
            SessionState::Loaded => self.engine.session().position,
            SessionState::Empty => return,
        };
        self.seek(base + delta);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.engine.set_volume(volume);
        self.set_status(&format!(
            "Volume: {}%",
            (self.engine.get_volume() * 100.0).round() as u16
        ));
    }

    pub fn volume_step(&mut self, delta: f32) {
        self.set_volume(self.engine.get_volume() + delta);
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    /// Lowers the drag guard and seeks to where the control was released.
    pub fn finish_drag(&mut self, value: f64) {
        self.dragging = false;
        self.seek_percent(value);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
        self.dirty = true;
    }

    pub fn exit_fullscreen(&mut self) {
        if self.fullscreen {
            self.fullscreen = false;
            self.dirty = true;
        }
    }

    /// Moves on when the backend ran out of audio: next entry if there is
    /// one, otherwise back to stopped.
    pub fn handle_track_end(&mut self) {
        if !self.engine.is_finished() {
            return;
        }

        if let Some(path) = self.playlist.next() {
            self.load_and_play(&path);
        } else {
            self.engine.stop();
            self.set_status("Reached end of playlist");
        }
    }

    /// Stops the engine before the surface goes away. Idempotent.
    pub fn shutdown(&mut self) {
        self.engine.stop();
        info!("session shut down");
    }

    fn load_and_play(&mut self, path: &Path) {
        if self.load(path) {
            self.start_playback();
        }
    }

    fn load(&mut self, path: &Path) -> bool {
        match self.engine.load(path) {
            Ok(()) => {
                self.refresh_status();
                true
            }
            Err(err) => {
                self.set_status(&format!("Error: {err}"));
                false
            }
        }
    }

    fn start_playback(&mut self) {
        if self.engine.play() {
            self.refresh_status();
        } else {
            warn!("play request did not start playback");
            self.set_status("Playback could not start");
        }
    }

    fn refresh_status(&mut self) {
        let name = self
            .engine
            .session()
            .current_file
            .as_deref()
            .map(display_name)
            .unwrap_or_default();
        let message = match self.state() {
            SessionState::Empty => String::from("No file loaded"),
            state => format!("{}: {name}", state.label()),
        };
        self.set_status(&message);
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}
