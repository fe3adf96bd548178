//! Patch emission and exit status

use crate::error::PipelineError;
use start_artifact::Patch;
use std::path::{Path, PathBuf};

/// Process exit status of a pipeline command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// At least one patch written, or validation consistent
    Success,
    /// Search finished without a patch, or validation mismatched
    NoPatch,
    /// A stage aborted
    Error,
}

impl ExitStatus {
    /// Numeric exit code
    #[inline]
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NoPatch => 1,
            Self::Error => 2,
        }
    }

    /// Status for a finished search
    #[inline]
    #[must_use]
    pub fn from_patch_count(written: usize) -> Self {
        if written > 0 {
            Self::Success
        } else {
            Self::NoPatch
        }
    }
}

/// Writes accepted patches as `{index}.diff`
#[derive(Debug, Clone)]
pub struct PatchEmitter {
    dir: PathBuf,
}

impl PatchEmitter {
    /// Create emitter for a directory
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write patches in order
    ///
    /// Creates the directory if needed. Stops at the first failure, keeping
    /// the files already written.
    ///
    /// # Errors
    /// Returns `PipelineError::PatchWrite` on the first failed write
    pub fn emit(&self, patches: &[Patch]) -> Result<Vec<PathBuf>, PipelineError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PipelineError::PatchWrite {
            index: patches.first().map_or(0, |p| p.index),
            path: self.dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(patches.len());
        for patch in patches {
            let path = self.dir.join(patch.file_name());
            std::fs::write(&path, &patch.diff).map_err(|source| PipelineError::PatchWrite {
                index: patch.index,
                path: path.clone(),
                source,
            })?;
            tracing::info!(index = patch.index, path = %path.display(), "wrote patch");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use start_artifact::Candidate;

    fn patch(index: usize) -> Patch {
        Patch {
            index,
            diff: format!("--- a\n+++ b\n@@ {index} @@\n"),
            candidate: Candidate::default(),
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::NoPatch.code(), 1);
        assert_eq!(ExitStatus::Error.code(), 2);
        assert_eq!(ExitStatus::from_patch_count(0), ExitStatus::NoPatch);
        assert_eq!(ExitStatus::from_patch_count(3), ExitStatus::Success);
    }

    #[test]
    fn writes_indexed_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("patches");
        let written = PatchEmitter::new(&out).emit(&[patch(0), patch(1), patch(2)]).unwrap();
        assert_eq!(written.len(), 3);

        let mut names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["0.diff", "1.diff", "2.diff"]);
        assert_eq!(std::fs::read_to_string(out.join("1.diff")).unwrap(), patch(1).diff);
    }

    #[test]
    fn existing_directory_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = PatchEmitter::new(dir.path());
        emitter.emit(&[]).unwrap();
        emitter.emit(&[patch(0)]).unwrap();
        assert!(dir.path().join("0.diff").exists());
    }

    #[test]
    fn failure_keeps_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where 1.diff should go makes the second write fail
        std::fs::create_dir(dir.path().join("1.diff")).unwrap();

        let err = PatchEmitter::new(dir.path())
            .emit(&[patch(0), patch(1), patch(2)])
            .unwrap_err();
        assert!(matches!(err, PipelineError::PatchWrite { index: 1, .. }));
        assert!(dir.path().join("0.diff").is_file());
        assert!(!dir.path().join("2.diff").exists());
    }
}
