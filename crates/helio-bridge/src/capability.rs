//! Capability resolution: find a working executable among ordered
//! candidates, once per capability.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult, CandidateAttempt};
use crate::invoker::{ExitState, Invocation, invoke};

/// Default probe deadline per candidate.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One way to start an executable: a program plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Program name or path.
    pub program: String,
    /// Arguments always passed first (e.g. `-3` for `py -3`).
    pub args: Vec<String>,
}

impl Candidate {
    /// A bare program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add leading arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Parse a whitespace-separated candidate such as `py -3`.
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// An abstract resource with an ordered list of ways to provide it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Cache key.
    pub name: String,
    /// Candidates, tried in order.
    pub candidates: Vec<Candidate>,
    /// Arguments for the availability probe.
    pub probe_args: Vec<String>,
    /// Deadline for each probe.
    pub probe_timeout: Duration,
}

impl Capability {
    /// Name of the engine interpreter capability.
    pub const ENGINE_INTERPRETER: &'static str = "engine-interpreter";

    /// A capability probed with `--version`.
    #[must_use]
    pub fn new(name: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            name: name.into(),
            candidates,
            probe_args: vec!["--version".to_string()],
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// The engine interpreter with this platform's candidate order.
    #[must_use]
    pub fn engine_interpreter() -> Self {
        Self::new(Self::ENGINE_INTERPRETER, platform_interpreters())
    }

    /// Try `candidate` before every other candidate.
    #[must_use]
    pub fn with_preferred(mut self, candidate: Candidate) -> Self {
        self.candidates.retain(|c| *c != candidate);
        self.candidates.insert(0, candidate);
        self
    }

    /// Replace the probe arguments.
    #[must_use]
    pub fn with_probe_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the probe deadline.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

fn platform_interpreters() -> Vec<Candidate> {
    if cfg!(windows) {
        vec![Candidate::new("python"), Candidate::new("py").with_args(["-3"])]
    } else {
        vec![Candidate::new("python3"), Candidate::new("python")]
    }
}

/// A capability bound to a concrete executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCapability {
    /// Capability name.
    pub capability: String,
    /// The accepted candidate.
    pub candidate: Candidate,
    /// Full executable path.
    pub executable: PathBuf,
    /// Version text reported by the probe.
    pub version: String,
}

impl ResolvedCapability {
    /// Arguments to pass before anything else.
    #[must_use]
    pub fn leading_args(&self) -> &[String] {
        &self.candidate.args
    }
}

/// A successful probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSuccess {
    /// Full executable path.
    pub executable: PathBuf,
    /// Version text.
    pub version: String,
}

/// Checks whether one candidate can be started.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `candidate` for `capability`. The error string explains the
    /// rejection.
    async fn probe(&self, capability: &Capability, candidate: &Candidate)
    -> Result<ProbeSuccess, String>;
}

/// Probes by locating the program on `PATH` and running it with the probe
/// arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessProber;

#[async_trait]
impl Prober for ProcessProber {
    async fn probe(
        &self,
        capability: &Capability,
        candidate: &Candidate,
    ) -> Result<ProbeSuccess, String> {
        let executable =
            which::which(&candidate.program).map_err(|e| format!("not found: {e}"))?;

        let invocation = Invocation::new(&executable, capability.probe_timeout)
            .args(candidate.args.iter().cloned())
            .args(capability.probe_args.iter().cloned());
        let outcome = invoke(&invocation).await;

        match outcome.exit {
            ExitState::SpawnFailed { message } => Err(message),
            ExitState::TimedOut => Err(format!(
                "probe timed out after {:?}",
                capability.probe_timeout
            )),
            ExitState::Exited { .. } => {
                let stdout = String::from_utf8_lossy(&outcome.stdout);
                let version = if stdout.trim().is_empty() {
                    String::from_utf8_lossy(&outcome.stderr).trim().to_string()
                } else {
                    stdout.trim().to_string()
                };
                Ok(ProbeSuccess {
                    executable,
                    version,
                })
            },
        }
    }
}

type Resolution = BridgeResult<Arc<ResolvedCapability>>;

/// Resolves capabilities and caches the result for its own lifetime.
///
/// Concurrent first uses of one capability share a single probe run.
/// Failures are cached too.
pub struct CandidateResolver {
    prober: Arc<dyn Prober>,
    cache: Mutex<HashMap<String, Arc<OnceCell<Resolution>>>>,
}

impl fmt::Debug for CandidateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateResolver").finish_non_exhaustive()
    }
}

impl Default for CandidateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateResolver {
    /// A resolver that probes real processes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prober(Arc::new(ProcessProber))
    }

    /// A resolver using a custom prober.
    #[must_use]
    pub fn with_prober(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `capability`, probing only on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CapabilityUnavailable`] listing every
    /// candidate and its error if none could be started.
    pub async fn resolve(&self, capability: &Capability) -> Resolution {
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(capability.name.clone()).or_default())
        };
        cell.get_or_init(|| self.probe_candidates(capability))
            .await
            .clone()
    }

    /// The cached resolution for `name`, if one has completed.
    pub async fn cached(&self, name: &str) -> Option<Resolution> {
        let cache = self.cache.lock().await;
        cache.get(name).and_then(|cell| cell.get().cloned())
    }

    async fn probe_candidates(&self, capability: &Capability) -> Resolution {
        let mut attempts = Vec::with_capacity(capability.candidates.len());

        for candidate in &capability.candidates {
            debug!(capability = %capability.name, candidate = %candidate, "Probing candidate");
            match self.prober.probe(capability, candidate).await {
                Ok(found) => {
                    info!(
                        capability = %capability.name,
                        candidate = %candidate,
                        executable = %found.executable.display(),
                        version = %found.version,
                        "Resolved capability"
                    );
                    return Ok(Arc::new(ResolvedCapability {
                        capability: capability.name.clone(),
                        candidate: candidate.clone(),
                        executable: found.executable,
                        version: found.version,
                    }));
                },
                Err(error) => {
                    debug!(candidate = %candidate, error = %error, "Candidate rejected");
                    attempts.push(CandidateAttempt {
                        candidate: candidate.to_string(),
                        error,
                    });
                },
            }
        }

        warn!(
            capability = %capability.name,
            attempts = attempts.len(),
            "No candidate available"
        );
        Err(BridgeError::CapabilityUnavailable {
            capability: capability.name.clone(),
            attempts,
        })
    }
}
