//! Show stream structure of a media file.

use std::path::PathBuf;

use framestitch_engine::probe_media;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }

    let probe = probe_media(&path)
        .ok_or_else(|| anyhow::anyhow!("ffprobe could not read {}", path.display()))?;

    println!("File: {}", path.display());
    println!("  Video frames: {}", probe.video_frames);
    println!("  Audio streams: {}", probe.audio_streams);
    println!("  Duration: {:.3}s", probe.duration_secs);
    Ok(())
}
