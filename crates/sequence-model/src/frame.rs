//! Frame enumeration.
//!
//! The frame order established here is the only thing that decides the
//! order of frames in the final video.

use std::path::{Path, PathBuf};

use framestitch_common::error::{StitchError, StitchResult};

/// An ordered, deduplicated list of frame files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<PathBuf>,
}

impl FrameSequence {
    /// Enumerate every regular file directly inside `dir`, sorted by path.
    ///
    /// Subdirectories are skipped, not descended into. An empty directory is
    /// a valid, empty sequence.
    pub fn from_dir(dir: &Path) -> StitchResult<Self> {
        if !dir.is_dir() {
            return Err(StitchError::InputNotFound {
                path: dir.to_path_buf(),
            });
        }

        let listing_error = |source| StitchError::FrameListing {
            path: dir.to_path_buf(),
            source,
        };
        let root = dir.canonicalize().map_err(listing_error)?;
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(listing_error)? {
            let path = entry.map_err(listing_error)?.path();
            if path.is_file() {
                frames.push(path);
            }
        }

        tracing::debug!(dir = %root.display(), frames = frames.len(), "Enumerated frames");
        Ok(Self::from_paths(frames))
    }

    /// Build a sequence from an arbitrary list of paths.
    pub fn from_paths(mut frames: Vec<PathBuf>) -> Self {
        frames.sort();
        frames.dedup();
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    /// Frames covered by `range`, in sequence order.
    pub fn slice(&self, range: std::ops::Range<usize>) -> &[PathBuf] {
        &self.frames[range]
    }
}
