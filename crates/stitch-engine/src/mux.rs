//! Audio muxing and promotion of the finished file to its destination.

use std::path::{Path, PathBuf};

use framestitch_common::error::{StitchError, StitchResult};

use crate::backend::{EncoderBackend, MuxRequest};
use crate::segment::confirm_written;
use crate::staging::StagingArea;

/// Mux `audio_source` with the stitched `video` and move the result to
/// `destination`, replacing whatever is there.
pub fn mux_audio(
    backend: &dyn EncoderBackend,
    staging: &StagingArea,
    audio_source: &Path,
    video: &Path,
    destination: &Path,
    frame_rate: u32,
    quality: u8,
) -> StitchResult<PathBuf> {
    if !audio_source.is_file() {
        return Err(StitchError::AudioSourceNotFound {
            path: audio_source.to_path_buf(),
        });
    }

    let request = MuxRequest {
        audio_source: audio_source.to_path_buf(),
        video_source: video.to_path_buf(),
        frame_rate,
        quality,
        output: staging.muxed_path(destination),
    };
    tracing::info!(audio = %audio_source.display(), "Muxing audio");
    backend
        .mux(&request)
        .and_then(|()| confirm_written(&request.output))
        .map_err(|failure| StitchError::Muxing { failure })?;

    promote(&request.output, destination)?;
    Ok(destination.to_path_buf())
}

/// Move a finished file into place so the destination never holds a
/// half-written result. Falls back to copy-then-rename across filesystems.
fn promote(source: &Path, destination: &Path) -> StitchResult<()> {
    let promotion_error = |e| StitchError::Promotion {
        path: destination.to_path_buf(),
        source: e,
    };

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(promotion_error)?;
    }

    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let partial = destination.with_file_name(format!(".{file_name}.partial"));

    let copied = std::fs::copy(source, &partial)
        .and_then(|_| std::fs::rename(&partial, destination));
    if let Err(e) = copied {
        std::fs::remove_file(&partial).ok();
        return Err(promotion_error(e));
    }
    Ok(())
}
