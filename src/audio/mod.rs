use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::time::Instant;

/// Raw seam to the library that decodes and mixes. Calls are synchronous and
/// must come from the UI thread.
pub trait AudioBackend {
    /// Checks that `path` can be decoded and returns the length the decoder
    /// reports, if any. Does not touch the current playback.
    fn probe(&mut self, path: &Path) -> Result<Option<Duration>>;
    /// Replaces whatever is playing with `path`, starting at `from`.
    fn start(&mut self, path: &Path, from: Duration) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn halt(&mut self);
    fn supports_native_seek(&self) -> bool;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn set_volume(&mut self, volume: f32);
    fn elapsed(&self) -> Duration;
    /// Length of the started track as currently known to the decoder.
    fn reported_duration(&self) -> Option<Duration>;
    fn is_finished(&self) -> bool;
    fn output_name(&self) -> String;
}

pub struct RodioBackend {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    // Added to the sink clock when a start position had to be skipped to
    // instead of seeked to.
    skipped: Duration,
    volume: f32,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let (stream, sink) = Self::open_output_stream()?;

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            skipped: Duration::ZERO,
            volume: 1.0,
        })
    }

    fn decode(path: &Path) -> Result<Decoder<std::io::BufReader<File>>> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Decoder::try_from(file).with_context(|| format!("failed to decode {}", path.display()))
    }

    fn open_output_stream() -> Result<(OutputStream, Sink)> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => Self::open_any_output_stream().with_context(|| {
                    format!("unable to start any audio output stream after default failed: {default_err:#}")
                }),
            }
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }

    fn open_any_output_stream() -> Result<OutputStream> {
        let host = rodio::cpal::default_host();
        let mut candidates: Vec<String> = host
            .output_devices()
            .context("failed to enumerate output devices")?
            .filter_map(|device| device.name().ok())
            .collect();
        candidates.sort_by_cached_key(|name| {
            let lower = name.to_ascii_lowercase();
            let rank = if lower.contains("pulse") {
                0_u8
            } else if lower.contains("pipewire") {
                1_u8
            } else if lower.contains("default") {
                2_u8
            } else {
                3_u8
            };
            (rank, lower)
        });
        candidates.dedup();

        for candidate in candidates {
            let Some(device) = host.output_devices().ok().into_iter().flatten().find(|entry| {
                entry.name().ok().as_deref() == Some(candidate.as_str())
            }) else {
                continue;
            };
            let opened = OutputStreamBuilder::from_device(device)
                .context("failed to open fallback output device")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start fallback output stream")
                });
            if let Ok(stream) = opened {
                return Ok(stream);
            }
        }

        anyhow::bail!("no output device accepted a stream")
    }
}

impl AudioBackend for RodioBackend {
    fn probe(&mut self, path: &Path) -> Result<Option<Duration>> {
        let source = Self::decode(path)?;
        Ok(source.total_duration())
    }

    fn start(&mut self, path: &Path, from: Duration) -> Result<()> {
        self.halt();
        self.sink = Sink::connect_new(self.stream.mixer());

        let source = Self::decode(path)?;
        self.track_duration = source.total_duration();
        self.sink.append(source);
        self.sink.set_volume(self.volume);

        if !from.is_zero() && self.sink.try_seek(from).is_err() {
            // Decoder cannot seek; rebuild the queue with the lead-in skipped.
            self.sink.stop();
            self.sink = Sink::connect_new(self.stream.mixer());
            self.sink.append(Self::decode(path)?.skip_duration(from));
            self.sink.set_volume(self.volume);
            self.skipped = from;
        }

        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no active track");
        }
        self.sink.pause();
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no active track");
        }
        self.sink.play();
        Ok(())
    }

    fn halt(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
        self.skipped = Duration::ZERO;
    }

    fn supports_native_seek(&self) -> bool {
        self.skipped.is_zero()
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no active track");
        }

        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn elapsed(&self) -> Duration {
        if self.current.is_none() {
            return Duration::ZERO;
        }
        self.skipped.saturating_add(self.sink.get_pos())
    }

    fn reported_duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }

    fn output_name(&self) -> String {
        format!(
            "System default output ({} ch)",
            self.stream.config().channel_count()
        )
    }
}

/// Points fd 2 at `/dev/null` until dropped. ALSA and JACK print probe noise
/// there while the output device opens, which would tear the alternate screen.
#[cfg(unix)]
struct StderrSilencer {
    saved: Option<libc::c_int>,
}

#[cfg(unix)]
impl StderrSilencer {
    fn engage() -> Self {
        let Ok(devnull) = CString::new("/dev/null") else {
            return Self { saved: None };
        };
        // SAFETY: plain descriptor calls on fds owned by this guard.
        unsafe {
            let sink = libc::open(devnull.as_ptr(), libc::O_WRONLY);
            if sink < 0 {
                return Self { saved: None };
            }
            let saved = libc::dup(libc::STDERR_FILENO);
            if saved >= 0 && libc::dup2(sink, libc::STDERR_FILENO) < 0 {
                libc::close(saved);
                libc::close(sink);
                return Self { saved: None };
            }
            libc::close(sink);
            Self {
                saved: (saved >= 0).then_some(saved),
            }
        }
    }
}

#[cfg(unix)]
impl Drop for StderrSilencer {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            // SAFETY: `saved` was duplicated in `engage` and is closed once.
            unsafe {
                libc::dup2(saved, libc::STDERR_FILENO);
                libc::close(saved);
            }
        }
    }
}

#[cfg(not(unix))]
struct StderrSilencer;

#[cfg(not(unix))]
impl StderrSilencer {
    fn engage() -> Self {
        Self
    }
}

fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let _quiet = StderrSilencer::engage();
    operation()
}

/// Where the fake transport clock stands.
#[derive(Debug, Clone, Copy)]
enum Transport {
    Idle,
    Running { since: Instant, from: Duration },
    Held(Duration),
}

/// Wall-clock backend with no audio device, used by tests and the fuzz
/// harness. Seeks are always native and volume is ignored.
#[derive(Debug)]
pub struct NullBackend {
    transport: Transport,
    track: Option<(PathBuf, Option<Duration>)>,
    fixed_duration: Option<Duration>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            transport: Transport::Idle,
            track: None,
            fixed_duration: None,
        }
    }

    /// Reports `duration` for every file instead of decoding it.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.fixed_duration = Some(duration);
        self
    }

    fn length_of(&self, path: &Path) -> Option<Duration> {
        self.fixed_duration.or_else(|| {
            let source = Decoder::try_from(File::open(path).ok()?).ok()?;
            source.total_duration().filter(|length| !length.is_zero())
        })
    }

    fn length(&self) -> Option<Duration> {
        self.track.as_ref().and_then(|(_, length)| *length)
    }

    fn clamp(&self, position: Duration) -> Duration {
        self.length().map_or(position, |length| position.min(length))
    }

    fn position(&self) -> Duration {
        match self.transport {
            Transport::Idle => Duration::ZERO,
            Transport::Held(at) => at,
            Transport::Running { since, from } => self.clamp(from.saturating_add(since.elapsed())),
        }
    }

    fn require_track(&self) -> Result<()> {
        if self.track.is_none() {
            anyhow::bail!("no active track");
        }
        Ok(())
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn probe(&mut self, path: &Path) -> Result<Option<Duration>> {
        Ok(self.length_of(path))
    }

    fn start(&mut self, path: &Path, from: Duration) -> Result<()> {
        self.track = Some((path.to_path_buf(), self.length_of(path)));
        self.transport = Transport::Running {
            since: Instant::now(),
            from: self.clamp(from),
        };
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.require_track()?;
        self.transport = Transport::Held(self.position());
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.require_track()?;
        if let Transport::Held(at) = self.transport {
            self.transport = Transport::Running {
                since: Instant::now(),
                from: at,
            };
        }
        Ok(())
    }

    fn halt(&mut self) {
        self.track = None;
        self.transport = Transport::Idle;
    }

    fn supports_native_seek(&self) -> bool {
        true
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        self.require_track()?;
        let target = self.clamp(position);
        self.transport = match self.transport {
            Transport::Running { .. } => Transport::Running {
                since: Instant::now(),
                from: target,
            },
            Transport::Held(_) | Transport::Idle => Transport::Held(target),
        };
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn elapsed(&self) -> Duration {
        self.position()
    }

    fn reported_duration(&self) -> Option<Duration> {
        self.length()
    }

    fn is_finished(&self) -> bool {
        matches!(self.transport, Transport::Running { .. })
            && self.length().is_some_and(|length| self.position() >= length)
    }

    fn output_name(&self) -> String {
        String::from("Null audio backend")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{AudioBackend, NullBackend};
    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    pub(crate) fn write_test_wav(path: &Path, duration_ms: u32) {
        let sample_rate: u32 = 44_100;
        let channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let bytes_per_sample = u32::from(bits_per_sample / 8);
        let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
        let data_size = total_samples * u32::from(channels) * bytes_per_sample;
        let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
        let block_align = channels * (bits_per_sample / 8);
        let riff_chunk_size = 36_u32.saturating_add(data_size);

        let mut bytes = Vec::with_capacity((44_u32 + data_size) as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&riff_chunk_size.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.resize((44_u32 + data_size) as usize, 0_u8);

        fs::write(path, bytes).expect("wav fixture should be written");
    }

    fn started(duration: Option<u64>, from_secs: u64) -> Box<dyn AudioBackend> {
        let backend = match duration {
            Some(secs) => NullBackend::new().with_duration(Duration::from_secs(secs)),
            None => NullBackend::new(),
        };
        let mut backend: Box<dyn AudioBackend> = Box::new(backend);
        backend
            .start(Path::new("missing.flac"), Duration::from_secs(from_secs))
            .expect("start needs no decodable file");
        backend
    }

    #[test]
    fn clock_runs_only_between_start_and_pause() {
        let mut backend = started(None, 0);
        thread::sleep(Duration::from_millis(20));
        backend.pause().expect("pause");
        let held = backend.elapsed();
        assert!(held >= Duration::from_millis(20));

        thread::sleep(Duration::from_millis(20));
        assert_eq!(backend.elapsed(), held);

        backend.resume().expect("resume");
        thread::sleep(Duration::from_millis(20));
        assert!(backend.elapsed() > held);
    }

    #[test]
    fn start_offset_is_clamped_to_track_length() {
        let backend = started(Some(60), 12);
        assert!(backend.elapsed() >= Duration::from_secs(12));

        let backend = started(Some(60), 600);
        assert_eq!(backend.elapsed(), Duration::from_secs(60));
        assert!(backend.is_finished());
    }

    #[test]
    fn seek_while_held_stays_held() {
        let mut backend = started(Some(90), 0);
        backend.pause().expect("pause");
        backend.seek_to(Duration::from_secs(40)).expect("seek");
        thread::sleep(Duration::from_millis(10));
        assert_eq!(backend.elapsed(), Duration::from_secs(40));
        assert!(!backend.is_finished());

        backend.seek_to(Duration::from_secs(500)).expect("seek past end");
        assert_eq!(backend.elapsed(), Duration::from_secs(90));
        assert!(!backend.is_finished(), "a held track never reports the end");
    }

    #[test]
    fn controls_without_a_track_fail_and_halt_resets() {
        let mut backend: Box<dyn AudioBackend> = Box::new(NullBackend::new());
        assert!(backend.seek_to(Duration::from_secs(3)).is_err());
        assert!(backend.pause().is_err());
        assert!(backend.resume().is_err());

        let mut backend = started(Some(30), 10);
        backend.halt();
        assert_eq!(backend.elapsed(), Duration::ZERO);
        assert_eq!(backend.reported_duration(), None);
        assert!(!backend.is_finished());
    }

    #[test]
    fn decodes_length_when_none_is_fixed() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 80);

        let mut backend: Box<dyn AudioBackend> = Box::new(NullBackend::new());
        let length = backend
            .probe(&track)
            .expect("probe")
            .expect("wav length should be readable");
        assert!(length >= Duration::from_millis(70));
        assert_eq!(backend.probe(Path::new("missing.flac")).expect("probe"), None);
    }

    #[test]
    fn finishes_only_with_a_known_length() {
        let mut short = NullBackend::new().with_duration(Duration::from_millis(40));
        short.start(Path::new("short.wav"), Duration::ZERO).expect("start");
        let open_ended = started(None, 0);

        thread::sleep(Duration::from_millis(80));
        assert!(short.is_finished());
        assert!(!open_ended.is_finished());
    }

    #[cfg(unix)]
    #[test]
    fn silencer_restores_stderr_on_drop() {
        fn identity(fd: libc::c_int) -> (u64, u64) {
            // SAFETY: fstat writes into a zeroed, properly sized struct.
            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            assert_eq!(unsafe { libc::fstat(fd, &mut stat) }, 0);
            (stat.st_dev as u64, stat.st_ino as u64)
        }

        let before = identity(libc::STDERR_FILENO);
        let inside = super::with_silenced_stderr(|| identity(libc::STDERR_FILENO));
        let null = fs::File::open("/dev/null").expect("open /dev/null");
        let null_identity = identity(std::os::unix::io::AsRawFd::as_raw_fd(&null));

        assert_eq!(inside, null_identity);
        assert_eq!(identity(libc::STDERR_FILENO), before);
    }
}
