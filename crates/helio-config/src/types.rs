//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially written file still deserializes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine location and interpreter discovery.
    pub engine: EngineSection,
    /// Where request files are written.
    pub scratch: ScratchSection,
    /// Per-class and per-command timeouts.
    pub timeouts: TimeoutsSection,
    /// Logging.
    pub logging: LoggingSection,
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Directory holding the engine scripts.
    pub root: Option<PathBuf>,
    /// Interpreter tried before all other candidates (e.g. a venv python).
    pub interpreter: Option<String>,
    /// Replaces the platform candidate list. Entries may carry leading
    /// arguments, e.g. `"py -3"`.
    pub candidates: Option<Vec<String>>,
    /// Arguments for the availability probe.
    pub probe_args: Vec<String>,
    /// Probe deadline per candidate.
    pub probe_timeout_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            root: None,
            interpreter: None,
            candidates: None,
            probe_args: vec!["--version".to_owned()],
            probe_timeout_ms: 5_000,
        }
    }
}

/// `[scratch]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchSection {
    /// Scratch directory. Defaults to a directory under the system temp dir.
    pub dir: Option<PathBuf>,
}

/// `[timeouts]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    /// Catalog and product lookups.
    pub interactive_ms: u64,
    /// Calculations.
    pub calculation_ms: u64,
    /// Document generation.
    pub document_ms: u64,
    /// Per-command overrides.
    pub overrides: BTreeMap<String, u64>,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert("calculate_live_pricing".to_owned(), 30_000);
        Self {
            interactive_ms: 8_000,
            calculation_ms: 120_000,
            document_ms: 60_000,
            overrides,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base filter.
    pub level: String,
    /// `pretty`, `compact` or `json`.
    pub format: String,
    /// Extra per-target directives.
    pub directives: Vec<String>,
    /// Log to daily files in this directory instead of stderr.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
            file_dir: None,
        }
    }
}
