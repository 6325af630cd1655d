//! Fake engine fixture.

use std::path::{Path, PathBuf};
use std::time::Duration;

use helio_bridge::{Candidate, Capability, CommandRegistry, EngineBridge};
use tempfile::TempDir;

/// Version line reported by the fake interpreter probe.
pub const FAKE_ENGINE_VERSION: &str = "fake-engine 1.0";

/// A temporary engine root plus scratch directory.
///
/// Both directories are removed when the fixture is dropped.
#[derive(Debug)]
pub struct FakeEngine {
    _dir: TempDir,
    root: PathBuf,
    scratch: PathBuf,
}

impl FakeEngine {
    /// Create an empty engine root.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directories cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().join("engine");
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&root).expect("create engine root");
        Self {
            _dir: dir,
            root,
            scratch,
        }
    }

    /// The engine root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The scratch directory. Created by the bridge on first use.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    /// Write a script under the engine root.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, body).expect("write fake engine script");
        path
    }

    /// Files currently in the scratch directory.
    #[must_use]
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.scratch)
            .map(|entries| entries.filter_map(Result::ok).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Read a file a script wrote next to itself (e.g. `engine.pid`).
    #[must_use]
    pub fn read_marker(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(name))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// The interpreter capability for fake engines: `sh`.
    #[must_use]
    pub fn shell_capability() -> Capability {
        Capability::new("fake-engine", vec![Candidate::new("sh")])
            .with_probe_args(["-c", "echo fake-engine 1.0"])
            .with_probe_timeout(Duration::from_secs(5))
    }

    /// A bridge over the built-in commands running scripts with `sh`.
    #[must_use]
    pub fn bridge(&self) -> EngineBridge {
        EngineBridge::new(&self.root)
            .with_capability(Self::shell_capability())
            .with_scratch_dir(&self.scratch)
    }

    /// A bridge over a custom registry.
    #[must_use]
    pub fn bridge_with(&self, registry: CommandRegistry) -> EngineBridge {
        self.bridge().with_registry(registry)
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}
