use crate::audio::AudioBackend;
use crate::error::{PlayerError, Result};
use crate::library;
use crate::model::{PlaybackSession, SessionState};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Uniform playback contract over one [`AudioBackend`].
///
/// Every backend failure stops here: it is logged and turned into a `false`
/// or an `Err`, and the session record is only touched once the backend call
/// has succeeded.
pub struct PlaybackEngine {
    backend: Box<dyn AudioBackend>,
    session: PlaybackSession,
}

impl PlaybackEngine {
    pub fn new(mut backend: Box<dyn AudioBackend>, volume: f32) -> Self {
        let session = PlaybackSession::with_volume(volume);
        backend.set_volume(session.volume);
        Self { backend, session }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn output_name(&self) -> String {
        self.backend.output_name()
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            warn!(path = %path.display(), "load rejected: no such file");
            return Err(PlayerError::load(path, "file does not exist"));
        }

        let reported = self.backend.probe(path).map_err(|err| {
            warn!(path = %path.display(), "backend cannot open file: {err:#}");
            PlayerError::load(path, format!("{err:#}"))
        })?;
        let duration = reported
            .filter(|duration| !duration.is_zero())
            .or_else(|| library::probe_duration(path))
            .unwrap_or_default();

        self.stop();
        self.session.current_file = Some(path.to_path_buf());
        self.session.position = 0.0;
        self.session.duration = duration.as_secs_f64();
        info!(path = %path.display(), duration = self.session.duration, "loaded");
        Ok(())
    }

    pub fn play(&mut self) -> bool {
        let Some(path) = self.session.current_file.clone() else {
            debug!("play ignored: nothing loaded");
            return false;
        };

        let from = Duration::from_secs_f64(self.session.position);
        if let Err(err) = self.backend.start(&path, from) {
            warn!(path = %path.display(), "playback failed to start: {err:#}");
            return false;
        }
        self.backend.set_volume(self.session.volume);
        self.session.is_playing = true;
        self.session.is_paused = false;
        true
    }

    pub fn pause(&mut self) {
        if !self.session.is_playing || self.session.is_paused {
            return;
        }

        let position = self.get_position();
        let duration = self.get_duration();
        if let Err(err) = self.backend.pause() {
            warn!("{}", PlayerError::transient("pause", &err));
            return;
        }
        self.session.is_paused = true;
        self.session.position = position;
        self.session.duration = duration;
    }

    pub fn resume(&mut self) {
        if !self.session.is_paused {
            return;
        }

        if let Err(err) = self.backend.resume() {
            warn!("{}", PlayerError::transient("resume", &err));
            return;
        }
        self.session.is_paused = false;
    }

    /// Safe to call in any state, any number of times. Keeps the best-known
    /// duration, since halting drops whatever the backend reported.
    pub fn stop(&mut self) {
        if self.session.current_file.is_some() {
            self.session.duration = self.get_duration();
        }
        self.backend.halt();
        self.session.is_playing = false;
        self.session.is_paused = false;
        self.session.position = 0.0;
    }

    /// Moves to `target` seconds, clamped to the known duration. Does nothing
    /// while the duration is unknown.
    pub fn seek(&mut self, target: f64) {
        let duration = self.get_duration();
        if duration <= 0.0 || target.is_nan() {
            return;
        }
        let target = target.clamp(0.0, duration);

        if self.session.is_playing {
            let at = Duration::from_secs_f64(target);
            let native = if self.backend.supports_native_seek() {
                self.backend.seek_to(at).map_err(|err| {
                    debug!("native seek refused, restarting instead: {err:#}");
                })
            } else {
                Err(())
            };

            if native.is_err()
                && let Err(err) = self.restart_at(at)
            {
                warn!("{}", PlayerError::transient("seek", &err));
                self.stop();
                return;
            }
        }

        self.session.position = target;
        self.session.duration = duration;
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.session.volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.session.volume);
    }

    pub fn get_volume(&self) -> f32 {
        self.session.volume
    }

    /// Elapsed seconds as the backend reports them; `0.0` unless playing.
    pub fn get_position(&self) -> f64 {
        if !self.session.is_playing {
            return 0.0;
        }
        let elapsed = self.backend.elapsed().as_secs_f64();
        let duration = self.get_duration();
        if duration > 0.0 {
            elapsed.min(duration)
        } else {
            elapsed
        }
    }

    /// Best-known duration. A non-zero length reported by the running
    /// backend wins over the value captured at load time.
    pub fn get_duration(&self) -> f64 {
        if self.session.current_file.is_none() {
            return 0.0;
        }
        self.backend
            .reported_duration()
            .filter(|duration| !duration.is_zero())
            .map_or(self.session.duration, |duration| duration.as_secs_f64())
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_playing && !self.session.is_paused && self.backend.is_finished()
    }

    // Stop + play at `at` for backends that cannot seek in place.
    fn restart_at(&mut self, at: Duration) -> anyhow::Result<()> {
        let Some(path) = self.session.current_file.clone() else {
            anyhow::bail!("no file loaded");
        };
        self.backend.start(&path, at)?;
        self.backend.set_volume(self.session.volume);
        if self.session.is_paused {
            self.backend.pause()?;
        }
        Ok(())
    }
}
