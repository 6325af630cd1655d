//! Environment variable fallbacks.
//!
//! Env vars only fill fields that no config file set; a value from any file
//! layer wins over the environment.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Environment variable naming an alternate user config directory.
pub const HELIO_HOME: &str = "HELIO_HOME";

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "HELIO_PYTHON",
        field_path: "engine.interpreter",
    },
    EnvMapping {
        var_name: "HELIO_ENGINE_ROOT",
        field_path: "engine.root",
    },
    EnvMapping {
        var_name: "HELIO_SCRATCH_DIR",
        field_path: "scratch.dir",
    },
    EnvMapping {
        var_name: "HELIO_LOG",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "HELIO_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Snapshot of the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Apply env var fallbacks to fields not set by a file layer.
///
/// Returns the number of env vars applied. Empty values are ignored.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        let Some(value) = env_vars.get(mapping.var_name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_string_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

/// Set a dotted `path` to a string, creating intermediate tables.
fn set_string_field(root: &mut toml::Value, path: &str, value: &str) {
    let mut current = root;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), toml::Value::String(value.to_owned()));
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}
