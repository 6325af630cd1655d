//! The engine bridge: routes a command through resolution, marshaling,
//! invocation and classification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use helio_telemetry::RequestContext;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{Instrument, debug, info, warn};

use crate::capability::{CandidateResolver, Capability, ResolvedCapability};
use crate::classify::classify;
use crate::cleanup::ScratchDir;
use crate::envelope::ResultEnvelope;
use crate::error::{BridgeError, BridgeResult};
use crate::invoker::{Invocation, invoke};
use crate::marshal::{Marshaled, marshal};
use crate::registry::{CommandRegistry, CommandSpec, TimeoutClass};

/// Timeout budgets per class, with per-command overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Short lookups.
    pub interactive: Duration,
    /// Calculations.
    pub calculation: Duration,
    /// Document rendering.
    pub document: Duration,
    /// Overrides keyed by command name.
    pub overrides: HashMap<String, Duration>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        overrides.insert("calculate_live_pricing".to_string(), Duration::from_secs(30));
        Self {
            interactive: Duration::from_secs(8),
            calculation: Duration::from_secs(120),
            document: Duration::from_secs(60),
            overrides,
        }
    }
}

impl TimeoutPolicy {
    /// Override the timeout of one command.
    #[must_use]
    pub fn with_override(mut self, command: impl Into<String>, timeout: Duration) -> Self {
        self.overrides.insert(command.into(), timeout);
        self
    }

    /// The timeout `spec` runs under.
    #[must_use]
    pub fn for_command(&self, spec: &CommandSpec) -> Duration {
        if let Some(timeout) = self.overrides.get(&spec.name) {
            return *timeout;
        }
        match spec.timeout_class {
            TimeoutClass::Interactive => self.interactive,
            TimeoutClass::Calculation => self.calculation,
            TimeoutClass::Document => self.document,
        }
    }
}

/// Invokes engine commands as child processes.
///
/// Cheap to share behind an `Arc`; every call runs its own process and
/// only the capability cache is shared between calls.
#[derive(Debug)]
pub struct EngineBridge {
    engine_root: PathBuf,
    registry: CommandRegistry,
    resolver: Arc<CandidateResolver>,
    capability: Capability,
    scratch: ScratchDir,
    timeouts: TimeoutPolicy,
    env: Vec<(String, String)>,
}

impl EngineBridge {
    /// A bridge over the built-in commands with scripts under
    /// `engine_root`.
    #[must_use]
    pub fn new(engine_root: impl Into<PathBuf>) -> Self {
        Self {
            engine_root: engine_root.into(),
            registry: CommandRegistry::builtin(),
            resolver: Arc::new(CandidateResolver::new()),
            capability: Capability::engine_interpreter(),
            scratch: ScratchDir::system_default(),
            timeouts: TimeoutPolicy::default(),
            env: Vec::new(),
        }
    }

    /// Replace the command registry.
    #[must_use]
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share a resolver (and its cache) with other bridges.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<CandidateResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the interpreter capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    /// Write request files under `dir`.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch = ScratchDir::new(dir);
        self
    }

    /// Replace the timeout policy.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Pass an extra environment variable to every engine process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Directory holding the engine scripts.
    #[must_use]
    pub fn engine_root(&self) -> &Path {
        &self.engine_root
    }

    /// The command table.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The scratch directory.
    #[must_use]
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// The timeout policy.
    #[must_use]
    pub fn timeouts(&self) -> &TimeoutPolicy {
        &self.timeouts
    }

    /// Run `name` with `payload` and return the envelope.
    ///
    /// `timeout` overrides the configured budget for this call. Dropping
    /// the returned future kills the engine and removes its request file.
    pub async fn call_command(
        &self,
        name: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> ResultEnvelope {
        match self.run(name, &payload, timeout).await {
            Ok(data) => ResultEnvelope::success(data),
            Err(e) => e.into(),
        }
    }

    /// Run `name` with a typed payload and decode the result.
    ///
    /// # Errors
    ///
    /// Returns any bridge failure, `MarshalFailed` if `payload` does not
    /// serialize, or `MalformedResponse` if the result does not decode
    /// into `R`.
    pub async fn call<P, R>(&self, name: &str, payload: &P, timeout: Option<Duration>) -> BridgeResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)
            .map_err(|e| BridgeError::marshal(name, format!("cannot encode payload: {e}")))?;
        let data = self.run(name, &payload, timeout).await?;
        serde_json::from_value(data).map_err(|e| BridgeError::MalformedResponse {
            message: format!("unexpected result shape for '{name}': {e}"),
        })
    }

    /// Resolve the engine interpreter.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityUnavailable` if no candidate can be started.
    pub async fn resolve_engine(&self) -> BridgeResult<Arc<ResolvedCapability>> {
        self.resolver.resolve(&self.capability).await
    }

    /// Describe the resolved interpreter as an envelope.
    pub async fn engine_info(&self) -> ResultEnvelope {
        match self.resolve_engine().await {
            Ok(resolved) => ResultEnvelope::success(json!({
                "capability": resolved.capability,
                "candidate": resolved.candidate.to_string(),
                "executable": resolved.executable.display().to_string(),
                "version": resolved.version,
            })),
            Err(e) => e.into(),
        }
    }

    async fn run(&self, name: &str, payload: &Value, timeout: Option<Duration>) -> BridgeResult<Value> {
        let ctx = RequestContext::new("engine_bridge").with_operation(name);
        let span = ctx.span();

        async {
            let result = self.execute(name, payload, timeout).await;
            match &result {
                Ok(_) => info!(elapsed_ms = ctx.elapsed_ms(), "Engine command succeeded"),
                Err(e) => warn!(
                    elapsed_ms = ctx.elapsed_ms(),
                    kind = %e.kind(),
                    error = %e,
                    "Engine command failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, name: &str, payload: &Value, timeout: Option<Duration>) -> BridgeResult<Value> {
        let spec = self.registry.lookup(name)?;
        let timeout = timeout.unwrap_or_else(|| self.timeouts.for_command(spec));
        let resolved = self.resolve_engine().await?;

        let Marshaled {
            args,
            stdin,
            artifact,
        } = marshal(spec, payload, &self.scratch)?;

        let script = spec.script_path(&self.engine_root);
        let mut invocation = Invocation::new(&resolved.executable, timeout)
            .args(resolved.leading_args().iter().cloned())
            .arg(script.to_string_lossy())
            .args(args)
            .current_dir(&self.engine_root);
        for (key, value) in &self.env {
            invocation = invocation.env(key.clone(), value.clone());
        }
        if let Some(bytes) = stdin {
            invocation = invocation.stdin_bytes(bytes);
        }

        debug!(
            script = %script.display(),
            transport = ?spec.transport,
            timeout = ?timeout,
            "Invoking engine"
        );
        let outcome = invoke(&invocation).await;

        if let Some(artifact) = artifact {
            artifact.release();
        }

        classify(spec.response, &outcome, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Candidate;
    use crate::error::ErrorKind;
    use crate::registry::{CommandFamily, TransportMode};

    #[test]
    fn test_default_timeouts() {
        let registry = CommandRegistry::builtin();
        let policy = TimeoutPolicy::default();

        let t = |name: &str| policy.for_command(registry.lookup(name).unwrap());
        assert_eq!(t("get_pv_manufacturers"), Duration::from_secs(8));
        assert_eq!(t("perform_calculations"), Duration::from_secs(120));
        assert_eq!(t("calculate_live_pricing"), Duration::from_secs(30));
        assert_eq!(t("generate_offer_pdf"), Duration::from_secs(60));
    }

    #[test]
    fn test_timeout_override() {
        let spec = CommandSpec::new("x", CommandFamily::Catalog, "x.py", TransportMode::Argv);
        let policy = TimeoutPolicy::default().with_override("x", Duration::from_millis(250));
        assert_eq!(policy.for_command(&spec), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_unknown_command_before_resolution() {
        let bridge = EngineBridge::new("/nonexistent").with_capability(Capability::new(
            "never-probed",
            vec![Candidate::new("helio-definitely-not-installed")],
        ));

        let envelope = bridge.call_command("format_disk", Value::Null, None).await;
        assert_eq!(envelope.error_kind(), Some(ErrorKind::UnknownCommand));
        assert!(
            bridge
                .resolver
                .cached("never-probed")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_capability_unavailable_envelope() {
        let bridge = EngineBridge::new("/nonexistent").with_capability(Capability::new(
            "interp",
            vec![
                Candidate::new("helio-missing-a"),
                Candidate::new("helio-missing-b"),
            ],
        ));

        let envelope = bridge
            .call_command("get_pv_manufacturers", Value::Null, None)
            .await;
        assert_eq!(envelope.error_kind(), Some(ErrorKind::CapabilityUnavailable));
        let message = envelope.message().unwrap();
        assert!(message.contains("helio-missing-a"));
        assert!(message.contains("helio-missing-b"));

        let info = bridge.engine_info().await;
        assert_eq!(info.error_kind(), Some(ErrorKind::CapabilityUnavailable));
    }
}
