//! Mock implementations for testing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use helio_bridge::{Candidate, Capability, ProbeSuccess, Prober};

/// Prober that accepts every candidate after a delay and counts calls.
///
/// The delay widens the window in which concurrent resolutions overlap.
#[derive(Debug)]
pub struct CountingProber {
    delay: Duration,
    version: String,
    executable: Option<PathBuf>,
    probes: AtomicUsize,
}

impl CountingProber {
    /// Accept candidates after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            version: "mock 1.0".to_string(),
            executable: None,
            probes: AtomicUsize::new(0),
        }
    }

    /// Report `path` as the executable of every candidate instead of the
    /// candidate's program name.
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Number of probes run so far.
    #[must_use]
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl Default for CountingProber {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl Prober for CountingProber {
    async fn probe(
        &self,
        _capability: &Capability,
        candidate: &Candidate,
    ) -> Result<ProbeSuccess, String> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(ProbeSuccess {
            executable: self
                .executable
                .clone()
                .unwrap_or_else(|| PathBuf::from(&candidate.program)),
            version: self.version.clone(),
        })
    }
}
