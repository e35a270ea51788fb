//! Concat manifest in the ffmpeg concat demuxer format.

use std::path::{Path, PathBuf};

use framestitch_common::error::{StitchError, StitchResult};

use crate::batch::SEGMENT_EXTENSION;

/// Ordered list of segment files to be joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcatManifest {
    entries: Vec<PathBuf>,
}

impl ConcatManifest {
    /// Collect every segment file in `dir`, ordered by file name.
    pub fn from_segment_dir(dir: &Path) -> StitchResult<Self> {
        let manifest_error = |source| StitchError::Manifest {
            path: dir.to_path_buf(),
            source,
        };
        let root = dir.canonicalize().map_err(manifest_error)?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(manifest_error)? {
            let path = entry.map_err(manifest_error)?.path();
            let is_segment = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SEGMENT_EXTENSION));
            if is_segment && path.is_file() {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(Self { entries })
    }

    /// Manifest listing `entries` in the given order.
    pub fn from_entries(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `file '<path>'` line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str("file '");
            out.push_str(&quote_path(entry));
            out.push_str("'\n");
        }
        out
    }

    pub fn write(&self, path: &Path) -> StitchResult<()> {
        std::fs::write(path, self.render()).map_err(|source| StitchError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Escape single quotes the way the concat demuxer expects (`'\''`).
fn quote_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
