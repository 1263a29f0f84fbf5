#![no_main]

use libfuzzer_sys::fuzz_target;
use playdeck::audio::NullBackend;
use playdeck::config::Config;
use playdeck::core::PlayerCore;
use playdeck::engine::PlaybackEngine;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

fn media_dir() -> &'static PathBuf {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join("playdeck-fuzz-media");
        let _ = std::fs::create_dir_all(&dir);
        for name in ["a.mp3", "b.flac", "c.mkv"] {
            let _ = std::fs::write(dir.join(name), b"x");
        }
        dir
    })
}

fuzz_target!(|data: &[u8]| {
    let dir = media_dir();
    let backend = NullBackend::new().with_duration(Duration::from_secs(120));
    let engine = PlaybackEngine::new(Box::new(backend), 0.7);
    let mut core = PlayerCore::new(engine, &Config::in_memory());

    for pair in data.chunks(2) {
        let value = f64::from(pair.get(1).copied().unwrap_or_default());
        match pair[0] % 12 {
            0 => {
                core.open_folder(dir);
            }
            1 => {
                core.open_file(&dir.join("b.flac"));
            }
            2 => core.toggle_play_pause(),
            3 => core.stop(),
            4 => core.next(),
            5 => core.previous(),
            6 => core.seek(value - 64.0),
            7 => core.seek_percent(value),
            8 => core.seek_by(value - 128.0),
            9 => core.set_volume(value as f32 / 200.0),
            10 => core.select(usize::from(pair[0] / 12)),
            _ => core.handle_track_end(),
        }

        let session = core.engine().session();
        assert!(!session.is_paused || session.is_playing);
        assert!((0.0..=120.0).contains(&session.position));
        assert!((0.0..=1.0).contains(&session.volume));
    }
});
