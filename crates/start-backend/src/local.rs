//! Scratch-directory sandbox

use start_core::{ExecutionConfig, ProvisionError, SandboxHandle, SandboxProvider, Scenario};
use std::path::{Path, PathBuf};

/// Sandbox backed by a fresh directory on the host
///
/// The handle id is the directory path. Release removes it.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    /// Create provider placing sandboxes under `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Parent directory of the sandboxes
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for LocalSandbox {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("start-sandboxes"))
    }
}

impl SandboxProvider for LocalSandbox {
    fn name(&self) -> &str {
        "local"
    }

    fn acquire(
        &self,
        scenario: &Scenario,
        _config: &ExecutionConfig,
    ) -> Result<SandboxHandle, ProvisionError> {
        require_file("binary", scenario.binary())?;
        require_file("mission", scenario.mission())?;

        let dir = self
            .root
            .join(format!("{}-{}", dir_label(scenario.name()), uuid::Uuid::new_v4()));
        crate::blocking(|| std::fs::create_dir_all(&dir))?;
        tracing::debug!(dir = %dir.display(), "created sandbox directory");
        Ok(SandboxHandle::new(dir.to_string_lossy()))
    }

    fn release(&self, handle: &SandboxHandle) -> Result<(), ProvisionError> {
        let dir = Path::new(&handle.id);
        if dir.parent() != Some(self.root.as_path()) {
            return Err(ProvisionError::Backend(format!(
                "sandbox {} is not under {}",
                handle.id,
                self.root.display()
            )));
        }
        match crate::blocking(|| std::fs::remove_dir_all(dir)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// scenario names are free text; keep one path component
fn dir_label(name: &str) -> String {
    let label: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if label.trim_matches('_').is_empty() {
        "scenario".to_string()
    } else {
        label
    }
}

pub(crate) fn require_file(what: &'static str, path: &Path) -> Result<(), ProvisionError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ProvisionError::Unavailable {
            what,
            path: path.to_path_buf(),
        })
    }
}
