use crate::model::has_extension_in;
use lofty::file::AudioFile;
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;
use tracing::debug;
use walkdir::WalkDir;

/// Media files directly inside `dir` (no recursion), sorted by path.
pub fn scan_folder(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| crate::config::strip_windows_verbatim_prefix(entry.path()))
        .filter(|path| has_extension_in(path, extensions))
        .collect();

    files.sort();
    files
}

/// Metadata-only length lookup used when the decoder cannot tell. Tries the
/// container tags first, then the codec frame count.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    let stripped = crate::config::strip_windows_verbatim_prefix(path);
    let found = tagged_duration(&stripped).or_else(|| codec_duration(&stripped));
    debug!(path = %stripped.display(), ?found, "metadata duration probe");
    found.filter(|duration| !duration.is_zero())
}

fn tagged_duration(path: &Path) -> Option<Duration> {
    let tagged = Probe::open(path).ok()?.read().ok()?;
    Some(tagged.properties().duration())
}

fn codec_duration(path: &Path) -> Option<Duration> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed.format.default_track()?;
    let params = &track.codec_params;

    if let (Some(time_base), Some(frame_count)) = (params.time_base, params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }

    params
        .n_frames
        .zip(params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
        .map(|(frames, sample_rate)| Duration::from_secs_f64(frames as f64 / f64::from(sample_rate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::write_test_wav;
    use std::fs;
    use tempfile::tempdir;

    fn formats() -> Vec<String> {
        [".mp3", ".wav", ".mkv"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scan_filters_and_sorts_media_files() {
        let dir = tempdir().expect("tempdir");
        for name in ["b.mp3", "a.mp3", "c.wav", "notes.txt", "D.MKV"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }

        let names: Vec<String> = scan_folder(dir.path(), &formats())
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["D.MKV", "a.mp3", "b.mp3", "c.wav"]);
    }

    #[test]
    fn scan_does_not_descend_into_subfolders() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("disc2")).expect("mkdir");
        fs::write(dir.path().join("disc2").join("deep.mp3"), b"x").expect("write");
        fs::write(dir.path().join("top.mp3"), b"x").expect("write");

        let found = scan_folder(dir.path(), &formats());
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("top.mp3"));
    }

    #[test]
    fn scan_of_missing_folder_is_empty() {
        assert!(scan_folder(Path::new("definitely/not/here"), &formats()).is_empty());
    }

    #[test]
    fn probe_reads_wav_length() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("tone.wav");
        write_test_wav(&track, 1_500);

        let duration = probe_duration(&track).expect("duration");
        assert!(duration >= Duration::from_millis(1_400));
        assert!(duration <= Duration::from_millis(1_600));
    }

    #[test]
    fn probe_yields_nothing_for_garbage() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("broken.mp3");
        fs::write(&track, b"not really audio").expect("write");

        assert_eq!(probe_duration(&track), None);
        assert_eq!(probe_duration(Path::new("missing.mp3")), None);
    }
}
