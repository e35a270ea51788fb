//! Lossless concatenation of encoded segments.

use std::path::PathBuf;

use framestitch_common::error::{StitchError, StitchResult};
use framestitch_sequence_model::manifest::ConcatManifest;

use crate::backend::EncoderBackend;
use crate::segment::confirm_written;
use crate::staging::StagingArea;

/// Join every segment in `mov_parts/` into the silent stitched video.
///
/// `expected` is the number of batches that were encoded; a segment
/// directory that disagrees with it is treated as an inconsistency.
pub fn concatenate_segments(
    backend: &dyn EncoderBackend,
    staging: &StagingArea,
    expected: usize,
) -> StitchResult<PathBuf> {
    let manifest = ConcatManifest::from_segment_dir(&staging.segments_dir())?;
    if manifest.is_empty() || manifest.len() != expected {
        return Err(StitchError::NoSegments {
            expected,
            found: manifest.len(),
        });
    }

    let manifest_path = staging.manifest_path();
    manifest.write(&manifest_path)?;

    let output = staging.stitched_path();
    tracing::info!(
        segments = manifest.len(),
        manifest = %manifest_path.display(),
        "Concatenating segments"
    );
    backend
        .concat(&manifest_path, &output)
        .and_then(|()| confirm_written(&output))
        .map_err(|failure| StitchError::Concatenation { failure })?;

    Ok(output)
}
