//! Bridge from `helio_config::Config` to bridge and telemetry types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use helio_bridge::{Candidate, Capability, EngineBridge, TimeoutPolicy};
use helio_config::Config;
use helio_telemetry::{LogConfig, LogFormat};

/// Log file prefix when `logging.file_dir` is set.
const LOG_FILE_PREFIX: &str = "helio-bridge";

/// Convert config to [`LogConfig`].
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);

    if let Some(dir) = &cfg.logging.file_dir {
        log_config = log_config.with_file_logging(dir, LOG_FILE_PREFIX);
    }

    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }

    log_config
}

/// Convert config to the interpreter [`Capability`].
///
/// A configured candidate list replaces the platform defaults; a configured
/// interpreter is tried before either.
pub(crate) fn to_capability(cfg: &Config) -> Result<Capability> {
    let mut capability = match &cfg.engine.candidates {
        Some(list) => {
            let candidates = list
                .iter()
                .map(|spec| {
                    Candidate::parse(spec)
                        .with_context(|| format!("invalid interpreter candidate '{spec}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            Capability::new(Capability::ENGINE_INTERPRETER, candidates)
        },
        None => Capability::engine_interpreter(),
    };

    if let Some(interpreter) = &cfg.engine.interpreter {
        capability = capability.with_preferred(Candidate::new(interpreter.trim()));
    }

    Ok(capability
        .with_probe_args(cfg.engine.probe_args.iter().cloned())
        .with_probe_timeout(Duration::from_millis(cfg.engine.probe_timeout_ms)))
}

/// Convert config to [`TimeoutPolicy`].
pub(crate) fn to_timeout_policy(cfg: &Config) -> TimeoutPolicy {
    let t = &cfg.timeouts;
    TimeoutPolicy {
        interactive: Duration::from_millis(t.interactive_ms),
        calculation: Duration::from_millis(t.calculation_ms),
        document: Duration::from_millis(t.document_ms),
        overrides: t
            .overrides
            .iter()
            .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
            .collect(),
    }
}

/// The engine root: the command-line value, then config, then `fallback`.
pub(crate) fn engine_root(cfg: &Config, cli_root: Option<&Path>, fallback: &Path) -> PathBuf {
    cli_root
        .map(Path::to_path_buf)
        .or_else(|| cfg.engine.root.clone())
        .unwrap_or_else(|| fallback.to_path_buf())
}

/// Build an [`EngineBridge`] rooted at `engine_root`.
pub(crate) fn to_bridge(cfg: &Config, engine_root: &Path) -> Result<EngineBridge> {
    let mut bridge = EngineBridge::new(engine_root)
        .with_capability(to_capability(cfg)?)
        .with_timeouts(to_timeout_policy(cfg));

    if let Some(dir) = &cfg.scratch.dir {
        bridge = bridge.with_scratch_dir(dir);
    }

    Ok(bridge)
}
