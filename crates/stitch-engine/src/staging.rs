//! Staging area for one stitch run.
//!
//! ```text
//! <root>/
//!   <batch padded>/          staged frames of one in-flight batch
//!   mov_parts/               one segment per batch
//!   inputs.txt               concat manifest
//!   stitched_no_audio.mp4    concatenated silent video
//!   output.<ext>             muxed result before promotion
//! ```

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use framestitch_common::error::{StitchError, StitchResult};
use framestitch_sequence_model::batch::{padded_index, SEGMENT_EXTENSION};

const ROOT_PREFIX: &str = "framestitch-";
const SEGMENTS_DIR: &str = "mov_parts";

/// Owner of the transient directory tree of one run.
///
/// Dropping it removes the tree; [`StagingArea::cleanup`] does the same but
/// reports failures.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh, uniquely named staging root under `parent`.
    pub fn create(parent: &Path) -> StitchResult<Self> {
        let dir = std::fs::create_dir_all(parent)
            .and_then(|_| tempfile::Builder::new().prefix(ROOT_PREFIX).tempdir_in(parent))
            .map_err(|source| StitchError::StagingInit {
                path: parent.to_path_buf(),
                source,
            })?;
        Self::with_layout(dir)
    }

    /// Lay out the fixed subdirectories. On error `dir` is dropped, which
    /// removes the half-built root.
    fn with_layout(dir: TempDir) -> StitchResult<Self> {
        let segments = dir.path().join(SEGMENTS_DIR);
        std::fs::create_dir(&segments).map_err(|source| StitchError::StagingInit {
            path: segments,
            source,
        })?;

        tracing::debug!(root = %dir.path().display(), "Created staging root");
        Ok(Self { dir })
    }

    /// Create the staging root under the system temp directory.
    pub fn create_in_temp() -> StitchResult<Self> {
        Self::create(&std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Per-batch frame directory (not created).
    pub fn batch_dir(&self, index: usize, width: usize) -> PathBuf {
        self.root().join(padded_index(index, width))
    }

    /// Directory holding the encoded segments.
    pub fn segments_dir(&self) -> PathBuf {
        self.root().join(SEGMENTS_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("inputs.txt")
    }

    pub fn stitched_path(&self) -> PathBuf {
        self.root().join(format!("stitched_no_audio.{SEGMENT_EXTENSION}"))
    }

    /// Where the muxer writes before the result is moved to `destination`.
    ///
    /// Keeps the destination's extension so the container matches.
    pub fn muxed_path(&self, destination: &Path) -> PathBuf {
        let ext = destination
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| SEGMENT_EXTENSION.to_string());
        self.root().join(format!("output.{ext}"))
    }

    /// Recursively remove the staging root.
    pub fn cleanup(self) -> std::io::Result<()> {
        match self.dir.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "framestitch_test_staging_{name}_{}",
            std::process::id()
        ))
    }

    #[test]
    fn test_create_and_cleanup() {
        let parent = parent("lifecycle");
        let staging = StagingArea::create(&parent).unwrap();
        let root = staging.root().to_path_buf();
        assert!(root.is_dir());
        assert!(staging.segments_dir().is_dir());
        assert_eq!(staging.batch_dir(3, 2), root.join("03"));
        assert_eq!(
            staging.muxed_path(Path::new("/out/movie.mkv")),
            root.join("output.mkv")
        );

        std::fs::write(root.join("inputs.txt"), "x").unwrap();
        staging.cleanup().unwrap();
        assert!(!root.exists());
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_roots_are_unique() {
        let parent = parent("unique");
        let a = StagingArea::create(&parent).unwrap();
        let b = StagingArea::create(&parent).unwrap();
        assert_ne!(a.root(), b.root());
        a.cleanup().unwrap();
        b.cleanup().unwrap();
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_drop_removes_root() {
        let parent = parent("drop");
        let root = {
            let staging = StagingArea::create(&parent).unwrap();
            staging.root().to_path_buf()
        };
        assert!(!root.exists());
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_root_is_prefixed() {
        let parent = parent("prefix");
        let staging = StagingArea::create(&parent).unwrap();
        let name = staging.root().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(ROOT_PREFIX));
        staging.cleanup().unwrap();
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_failed_layout_removes_root() {
        let parent = parent("layout");
        std::fs::create_dir_all(&parent).unwrap();
        let dir = tempfile::Builder::new()
            .prefix(ROOT_PREFIX)
            .tempdir_in(&parent)
            .unwrap();
        let root = dir.path().to_path_buf();
        // A file where the segment directory belongs makes the layout step fail.
        std::fs::write(root.join(SEGMENTS_DIR), "blocked").unwrap();

        let err = StagingArea::with_layout(dir).unwrap_err();
        assert!(matches!(err, StitchError::StagingInit { .. }));
        assert!(!root.exists());
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_cleanup_tolerates_missing_root() {
        let parent = parent("gone");
        let staging = StagingArea::create(&parent).unwrap();
        std::fs::remove_dir_all(staging.root()).unwrap();
        staging.cleanup().unwrap();
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_create_fails_when_parent_is_a_file() {
        let file = parent("file");
        std::fs::write(&file, "not a dir").unwrap();
        let err = StagingArea::create(&file).unwrap_err();
        assert!(matches!(err, StitchError::StagingInit { .. }));
        std::fs::remove_file(&file).ok();
    }
}
