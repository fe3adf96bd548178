//! Snapshots and their sandbox lifecycle
//!
//! A [`Snapshot`] binds a scenario and an execution configuration to a
//! sandbox. The sandbox is owned by a [`SnapshotGuard`], which releases it
//! exactly once: explicitly through [`SnapshotGuard::release`], or on drop
//! when the pipeline exits any other way (error, early return, cancelled
//! future).

use crate::error::{PipelineError, ProvisionError};
use crate::scenario::Scenario;
use crate::types::ExecutionConfig;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Opaque handle to an acquired sandbox
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxHandle {
    /// Provider-specific id (container id, scratch directory)
    pub id: String,
}

impl SandboxHandle {
    /// Create handle
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Display for SandboxHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Source of sandboxed environments
///
/// Implementations must tolerate `release` being called for a handle whose
/// backing resources are already gone.
pub trait SandboxProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Create a sandbox able to run the scenario
    ///
    /// # Errors
    /// Returns error if the sandbox cannot be created or the scenario's
    /// binary is unavailable
    fn acquire(&self, scenario: &Scenario, config: &ExecutionConfig)
        -> Result<SandboxHandle, ProvisionError>;

    /// Tear a sandbox down
    ///
    /// # Errors
    /// Returns error if teardown fails
    fn release(&self, handle: &SandboxHandle) -> Result<(), ProvisionError>;
}

/// Content fingerprint of a snapshot
///
/// Hex BLAKE3 digest over (scenario, config). Equal fingerprints mean the
/// snapshots are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute fingerprint
    #[must_use]
    pub fn compute(scenario: &Scenario, config: &ExecutionConfig) -> Self {
        #[derive(Serialize)]
        struct Key<'a> {
            scenario: &'a Scenario,
            config: &'a ExecutionConfig,
        }

        let mut hasher = blake3::Hasher::new();
        // plain data, serializing into a Vec cannot fail
        let bytes = serde_json::to_vec(&Key { scenario, config }).unwrap_or_default();
        hasher.update(&bytes);
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    /// Full hex digest
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits for logs
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable scenario + configuration bound to a sandbox
#[derive(Debug, Clone)]
pub struct Snapshot {
    scenario: Arc<Scenario>,
    config: ExecutionConfig,
    sandbox: SandboxHandle,
    fingerprint: Fingerprint,
}

impl Snapshot {
    /// Scenario
    #[inline]
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Execution configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Sandbox the snapshot runs in
    #[inline]
    #[must_use]
    pub fn sandbox(&self) -> &SandboxHandle {
        &self.sandbox
    }

    /// Content fingerprint
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Builds snapshots from a sandbox provider
#[derive(Clone)]
pub struct SnapshotBuilder {
    provider: Arc<dyn SandboxProvider>,
}

impl SnapshotBuilder {
    /// Create builder over a provider
    #[inline]
    #[must_use]
    pub fn new(provider: Arc<dyn SandboxProvider>) -> Self {
        Self { provider }
    }

    /// Acquire a sandbox and build a snapshot
    ///
    /// # Errors
    /// Returns `PipelineError::EnvironmentProvision` if the provider fails
    pub fn build(
        &self,
        scenario: Arc<Scenario>,
        config: ExecutionConfig,
    ) -> Result<SnapshotGuard, PipelineError> {
        let sandbox = self
            .provider
            .acquire(&scenario, &config)
            .map_err(|source| PipelineError::provision(scenario.name(), source))?;
        let fingerprint = Fingerprint::compute(&scenario, &config);
        tracing::info!(
            scenario = scenario.name(),
            provider = self.provider.name(),
            sandbox = %sandbox,
            fingerprint = fingerprint.short(),
            "built snapshot"
        );

        Ok(SnapshotGuard {
            snapshot: Snapshot {
                scenario,
                config,
                sandbox,
                fingerprint,
            },
            provider: Arc::clone(&self.provider),
            released: false,
        })
    }
}

impl fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Owns a snapshot's sandbox until released
#[must_use = "dropping the guard releases the sandbox immediately"]
pub struct SnapshotGuard {
    snapshot: Snapshot,
    provider: Arc<dyn SandboxProvider>,
    released: bool,
}

impl SnapshotGuard {
    /// Release the sandbox
    ///
    /// # Errors
    /// Returns `PipelineError::EnvironmentProvision` if teardown fails. The
    /// guard counts as released either way.
    pub fn release(mut self) -> Result<(), PipelineError> {
        self.released = true;
        self.provider
            .release(&self.snapshot.sandbox)
            .map_err(|source| PipelineError::provision(self.snapshot.scenario.name(), source))?;
        tracing::debug!(sandbox = %self.snapshot.sandbox, "released snapshot");
        Ok(())
    }
}

impl Deref for SnapshotGuard {
    type Target = Snapshot;

    fn deref(&self) -> &Self::Target {
        &self.snapshot
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.provider.release(&self.snapshot.sandbox) {
            Ok(()) => tracing::debug!(sandbox = %self.snapshot.sandbox, "released snapshot on drop"),
            Err(e) => tracing::warn!(
                sandbox = %self.snapshot.sandbox,
                error = %e,
                "failed to release snapshot"
            ),
        }
    }
}

impl fmt::Debug for SnapshotGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotGuard")
            .field("snapshot", &self.snapshot)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        acquired: AtomicUsize,
        released: AtomicUsize,
        refuse: bool,
    }

    impl SandboxProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn acquire(&self, _: &Scenario, _: &ExecutionConfig) -> Result<SandboxHandle, ProvisionError> {
            if self.refuse {
                return Err(ProvisionError::Backend("refused".into()));
            }
            let n = self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(SandboxHandle::new(format!("sb-{n}")))
        }

        fn release(&self, _: &SandboxHandle) -> Result<(), ProvisionError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scenario() -> Arc<Scenario> {
        Arc::new(
            Scenario::parse("mission: m\nbinary: b\n", Path::new("s.yml"), Path::new("/s"), "s").unwrap(),
        )
    }

    #[test]
    fn explicit_release_happens_once() {
        let provider = Arc::new(Counting::default());
        let builder = SnapshotBuilder::new(provider.clone());
        let guard = builder.build(scenario(), ExecutionConfig::default()).unwrap();
        guard.release().unwrap();
        assert_eq!(provider.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let provider = Arc::new(Counting::default());
        let builder = SnapshotBuilder::new(provider.clone());
        {
            let _guard = builder.build(scenario(), ExecutionConfig::default()).unwrap();
        }
        assert_eq!(provider.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refused_acquire_is_provision_error() {
        let provider = Arc::new(Counting {
            refuse: true,
            ..Counting::default()
        });
        let err = SnapshotBuilder::new(provider.clone())
            .build(scenario(), ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::EnvironmentProvision { .. }));
        assert_eq!(provider.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fingerprint_ignores_sandbox() {
        let provider = Arc::new(Counting::default());
        let builder = SnapshotBuilder::new(provider);
        let a = builder.build(scenario(), ExecutionConfig::default()).unwrap();
        let b = builder.build(scenario(), ExecutionConfig::default()).unwrap();
        assert_ne!(a.sandbox(), b.sandbox());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 64);
    }

    #[test]
    fn fingerprint_tracks_config() {
        let s = scenario();
        let a = Fingerprint::compute(&s, &ExecutionConfig::default());
        let b = Fingerprint::compute(&s, &ExecutionConfig::default().with_speedup(1));
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 12);
    }
}
