//! Segment encoding: stage each batch under sequential names, encode it,
//! then drop the staged copies.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use framestitch_common::error::{ProcessFailure, StitchError, StitchResult};
use framestitch_sequence_model::batch::{
    padding_width, segment_file_name, staging_frame_name, staging_frame_pattern, Batch,
};
use framestitch_sequence_model::frame::FrameSequence;

use crate::backend::{EncodeRequest, EncoderBackend};
use crate::staging::StagingArea;

/// Encoder settings shared by every batch of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSettings {
    pub frame_rate: u32,
    pub quality: u8,
    pub image_suffix: String,
    /// Batches encoded concurrently (1 = strictly sequential).
    pub workers: usize,
}

/// Encode every batch into `mov_parts/`, returning segment paths in batch order.
///
/// Batches run in waves of `settings.workers`. A failed wave is fully joined
/// before the error is returned, and no later wave is started; the reported
/// error is the failing batch with the lowest index.
pub fn encode_batches(
    backend: &dyn EncoderBackend,
    staging: &StagingArea,
    frames: &FrameSequence,
    batches: &[Batch],
    settings: &SegmentSettings,
    cancel: &AtomicBool,
    on_batch_done: &mut dyn FnMut(&Batch),
) -> StitchResult<Vec<PathBuf>> {
    let width = padding_width(batches.len());
    let workers = settings.workers.max(1);
    let mut segments = Vec::with_capacity(batches.len());

    for wave in batches.chunks(workers) {
        if cancel.load(Ordering::SeqCst) {
            return Err(StitchError::Cancelled { stage: "encode" });
        }

        let results: Vec<StitchResult<PathBuf>> = if wave.len() == 1 {
            vec![encode_one_batch(backend, staging, frames, &wave[0], width, settings)]
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> = wave
                    .iter()
                    .map(|batch| {
                        scope.spawn(move || {
                            encode_one_batch(backend, staging, frames, batch, width, settings)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .zip(wave)
                    .map(|(handle, batch)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(StitchError::staging(batch.index, "encoder worker panicked"))
                        })
                    })
                    .collect()
            })
        };

        for (batch, result) in wave.iter().zip(results) {
            match result {
                Ok(segment) => {
                    on_batch_done(batch);
                    segments.push(segment);
                }
                Err(_) if cancel.load(Ordering::SeqCst) => {
                    return Err(StitchError::Cancelled { stage: "encode" });
                }
                Err(err) => return Err(err),
            }
        }
    }

    Ok(segments)
}

/// Stage, encode and unstage one batch.
pub fn encode_one_batch(
    backend: &dyn EncoderBackend,
    staging: &StagingArea,
    frames: &FrameSequence,
    batch: &Batch,
    width: usize,
    settings: &SegmentSettings,
) -> StitchResult<PathBuf> {
    let batch_dir = staging.batch_dir(batch.index, width);
    let output = staging
        .segments_dir()
        .join(segment_file_name(batch.index, width));

    let staged = stage_frames(frames, batch, &batch_dir, &settings.image_suffix);
    if let Err(err) = staged {
        std::fs::remove_dir_all(&batch_dir).ok();
        return Err(err);
    }

    tracing::debug!(
        batch = batch.index,
        frames = batch.len(),
        output = %output.display(),
        "Encoding batch"
    );

    let request = EncodeRequest {
        frame_rate: settings.frame_rate,
        input_pattern: batch_dir.join(staging_frame_pattern(&settings.image_suffix)),
        output: output.clone(),
        quality: settings.quality,
    };
    let encoded = backend
        .encode(&request)
        .and_then(|()| confirm_written(&output));

    if let Err(e) = std::fs::remove_dir_all(&batch_dir) {
        tracing::warn!(batch = batch.index, error = %e, "Failed to remove batch staging dir");
    }

    if let Err(failure) = encoded {
        std::fs::remove_file(&output).ok();
        tracing::error!(batch = batch.index, %failure, "Batch encode failed");
        return Err(StitchError::Encoding {
            batch: batch.index,
            failure,
        });
    }

    tracing::info!(batch = batch.index, frames = batch.len(), "Segment encoded");
    Ok(output)
}

fn stage_frames(
    frames: &FrameSequence,
    batch: &Batch,
    batch_dir: &std::path::Path,
    suffix: &str,
) -> StitchResult<()> {
    std::fs::create_dir(batch_dir).map_err(|e| {
        StitchError::staging(
            batch.index,
            format!("failed to create {}: {e}", batch_dir.display()),
        )
    })?;

    for (position, source) in frames.slice(batch.range()).iter().enumerate() {
        let target = batch_dir.join(staging_frame_name(position, suffix));
        std::fs::copy(source, &target).map_err(|e| {
            StitchError::staging(
                batch.index,
                format!("failed to copy {}: {e}", source.display()),
            )
        })?;
    }
    Ok(())
}

/// A zero exit status is not enough; the output file must exist and be non-empty.
pub(crate) fn confirm_written(path: &std::path::Path) -> Result<(), ProcessFailure> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ProcessFailure::exited(
            Some(0),
            format!("no output written to {}", path.display()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct CountingBackend {
        encodes: std::sync::atomic::AtomicUsize,
    }

    impl EncoderBackend for CountingBackend {
        fn encode(&self, request: &EncodeRequest) -> Result<(), ProcessFailure> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            std::fs::write(&request.output, b"segment")
                .map_err(|e| ProcessFailure::spawn(e.to_string()))
        }

        fn concat(&self, _manifest: &Path, _output: &Path) -> Result<(), ProcessFailure> {
            unreachable!("segment tests never concatenate")
        }

        fn mux(&self, _request: &crate::backend::MuxRequest) -> Result<(), ProcessFailure> {
            unreachable!("segment tests never mux")
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn settings() -> SegmentSettings {
        SegmentSettings {
            frame_rate: 24,
            quality: 23,
            image_suffix: "png".to_string(),
            workers: 1,
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "framestitch_test_segment_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_source_frame_abandons_batch() {
        let dir = scratch("missing");
        std::fs::write(dir.join("a.png"), b"a").unwrap();
        let frames = FrameSequence::from_paths(vec![dir.join("a.png"), dir.join("b.png")]);
        let staging = StagingArea::create(&dir.join("staging")).unwrap();
        let backend = CountingBackend {
            encodes: Default::default(),
        };
        let batch = Batch {
            index: 0,
            start: 0,
            end: 2,
        };

        let err =
            encode_one_batch(&backend, &staging, &frames, &batch, 1, &settings()).unwrap_err();
        assert!(matches!(err, StitchError::Staging { batch: 0, .. }));
        assert_eq!(backend.encodes.load(Ordering::SeqCst), 0);
        assert!(!staging.batch_dir(0, 1).exists());

        staging.cleanup().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_batch_dir_removed_after_encode() {
        let dir = scratch("unstage");
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = dir.join(format!("{i}.png"));
            std::fs::write(&path, [i as u8]).unwrap();
            paths.push(path);
        }
        let frames = FrameSequence::from_paths(paths);
        let staging = StagingArea::create(&dir.join("staging")).unwrap();
        let backend = CountingBackend {
            encodes: Default::default(),
        };
        let batches = framestitch_sequence_model::batch::partition(3, 2).unwrap();
        let cancel = AtomicBool::new(false);
        let mut done = Vec::new();

        let segments = encode_batches(
            &backend,
            &staging,
            &frames,
            &batches,
            &settings(),
            &cancel,
            &mut |batch| done.push(batch.index),
        )
        .unwrap();

        assert_eq!(done, vec![0, 1]);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].ends_with("mov_parts/0.mp4"));
        assert!(!staging.batch_dir(0, 1).exists());
        assert!(!staging.batch_dir(1, 1).exists());

        staging.cleanup().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }
}
