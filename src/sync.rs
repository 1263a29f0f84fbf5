use crate::engine::PlaybackEngine;
use std::time::{Duration, Instant};

pub const SYNC_INTERVAL: Duration = Duration::from_millis(100);

pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// What the transport shows: slider value in `0..=100` and the time label.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub progress: f64,
    pub label: String,
}

impl Default for Readout {
    fn default() -> Self {
        Self {
            progress: 0.0,
            label: String::from("00:00 / 00:00"),
        }
    }
}

/// Fixed-interval observer of the engine clock. It only reads from the
/// engine and never blocks; the surface loop calls [`SyncLoop::tick`] and
/// waits at most [`SyncLoop::until_next_tick`] for input in between.
#[derive(Debug)]
pub struct SyncLoop {
    interval: Duration,
    next_tick: Instant,
    readout: Readout,
}

impl SyncLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: Instant::now(),
            readout: Readout::default(),
        }
    }

    pub fn readout(&self) -> &Readout {
        &self.readout
    }

    pub fn until_next_tick(&self, now: Instant) -> Duration {
        self.next_tick.saturating_duration_since(now)
    }

    /// Runs one observation if the interval has elapsed and reschedules.
    /// Returns whether the readout changed.
    pub fn tick(&mut self, now: Instant, engine: &PlaybackEngine, dragging: bool) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.next_tick = now + self.interval;

        let next = observe(engine, dragging, &self.readout);
        let changed = next != self.readout;
        self.readout = next;
        changed
    }
}

/// Computes the next readout from the engine. While the user drags the
/// progress control the previous readout is kept as is.
pub fn observe(engine: &PlaybackEngine, dragging: bool, previous: &Readout) -> Readout {
    if dragging || engine.session().current_file.is_none() {
        return previous.clone();
    }

    let position = engine.get_position();
    let duration = engine.get_duration();
    let progress = if duration > 0.0 {
        (position * 100.0 / duration).clamp(0.0, 100.0)
    } else {
        previous.progress
    };

    Readout {
        progress,
        label: format!("{} / {}", format_time(position), format_time(duration)),
    }
}
