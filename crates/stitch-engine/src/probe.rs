//! ffprobe helpers for inspecting produced files.

use std::path::Path;
use std::process::Command;

use serde::Serialize;

/// Stream structure of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MediaProbe {
    /// Decoded frames of the first video stream.
    pub video_frames: u64,
    /// Number of audio streams.
    pub audio_streams: usize,
    /// Container duration in seconds.
    pub duration_secs: f64,
}

/// Probe `path` with ffprobe. Returns `None` if ffprobe is missing or fails.
pub fn probe_media(path: &Path) -> Option<MediaProbe> {
    let frames = ffprobe_lines(
        path,
        &[
            "-select_streams",
            "v:0",
            "-count_frames",
            "-show_entries",
            "stream=nb_read_frames",
        ],
    )?;
    let video_frames = frames.first()?.trim().parse::<u64>().ok()?;

    let audio_streams = ffprobe_lines(
        path,
        &["-select_streams", "a", "-show_entries", "stream=index"],
    )?
    .len();

    let duration_secs = ffprobe_lines(path, &["-show_entries", "format=duration"])?
        .first()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(MediaProbe {
        video_frames,
        audio_streams,
        duration_secs,
    })
}

fn ffprobe_lines(path: &Path, selection: &[&str]) -> Option<Vec<String>> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(selection)
        .args(["-of", "csv=p=0"])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::debug!(path = %path.display(), "ffprobe failed");
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    Some(
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
