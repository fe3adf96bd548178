//! Canonical file representation
//!
//! Every artifact is stored as a single JSON document. Reading validates the
//! artifact's invariants so a file that parses but is inconsistent is rejected
//! at the boundary rather than deep inside a later stage.

use crate::artifact::{ArtifactError, ArtifactId, ArtifactKind};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Errors reading or writing artifact files
#[derive(Debug, thiserror::Error)]
pub enum ArtifactFileError {
    /// IO error during read or write
    #[error("io error on {artifact} file {path}: {source}")]
    Io {
        /// Artifact being read or written
        artifact: ArtifactId,
        /// File path
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON for this artifact
    #[error("malformed {artifact} file {path}: {source}")]
    Malformed {
        /// Artifact being read or written
        artifact: ArtifactId,
        /// File path
        path: PathBuf,
        /// Underlying parse failure
        #[source]
        source: serde_json::Error,
    },

    /// File parsed but violates artifact invariants
    #[error("invalid {artifact} file {path}: {source}")]
    Invalid {
        /// Artifact being read or written
        artifact: ArtifactId,
        /// File path
        path: PathBuf,
        /// Violated invariant
        #[source]
        source: ArtifactError,
    },
}

impl ArtifactFileError {
    /// Path of the offending file
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Malformed { path, .. } | Self::Invalid { path, .. } => {
                path
            }
        }
    }
}

/// Read an artifact from its JSON file
///
/// # Errors
/// - `ArtifactFileError::Io` if the file cannot be opened
/// - `ArtifactFileError::Malformed` if it is not valid JSON for `K`
/// - `ArtifactFileError::Invalid` if the value violates `K`'s invariants
pub fn read_artifact<K: ArtifactKind>(path: impl AsRef<Path>) -> Result<K::Value, ArtifactFileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ArtifactFileError::Io {
        artifact: K::ID,
        path: path.to_path_buf(),
        source,
    })?;

    let value: K::Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ArtifactFileError::Malformed {
                artifact: K::ID,
                path: path.to_path_buf(),
                source,
            }
        })?;

    K::validate(&value).map_err(|source| ArtifactFileError::Invalid {
        artifact: K::ID,
        path: path.to_path_buf(),
        source,
    })?;

    Ok(value)
}

/// Write an artifact to a JSON file
///
/// Missing parent directories are created.
///
/// # Errors
/// Returns `ArtifactFileError::Io` if the file cannot be written, or
/// `ArtifactFileError::Malformed` if the value cannot be encoded.
pub fn write_artifact<K: ArtifactKind>(
    value: &K::Value,
    path: impl AsRef<Path>,
) -> Result<(), ArtifactFileError> {
    let path = path.as_ref();
    let io_error = |source: std::io::Error| ArtifactFileError::Io {
        artifact: K::ID,
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
        ArtifactFileError::Malformed {
            artifact: K::ID,
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.write_all(b"\n").map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}
