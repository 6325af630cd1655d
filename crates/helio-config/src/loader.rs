//! Config file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge the user config (`$HELIO_HOME/config.toml` or `~/.helio/config.toml`)
//! 3. Merge `{workspace}/.helio/config.toml`
//! 4. Merge an explicitly named file
//! 5. Apply env var fallbacks for fields no file set
//! 6. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{HELIO_HOME, apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Name of the per-user and per-workspace config directory.
const CONFIG_DIR: &str = ".helio";

/// Inputs for [`load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Project root; its `.helio/config.toml` is merged when present.
    pub workspace_root: Option<PathBuf>,
    /// Directory holding the user `config.toml`, bypassing `HELIO_HOME` and
    /// the home directory.
    pub home_override: Option<PathBuf>,
    /// A file merged above every other layer. Must exist.
    pub explicit_file: Option<PathBuf>,
    /// Environment to read instead of the process environment.
    pub env: Option<HashMap<String, String>>,
}

impl LoadOptions {
    /// Options with a workspace root.
    #[must_use]
    pub fn for_workspace(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Set the user config directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_override = Some(home.into());
        self
    }

    /// Merge `path` above every other layer.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    /// Read env fallbacks from `env` instead of the process environment.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }
}

/// A loaded configuration with the source of every field.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Files that were merged, lowest priority first.
    pub loaded_files: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// The layer that set `field`, if any.
    #[must_use]
    pub fn source_of(&self, field: &str) -> Option<&ConfigLayer> {
        self.field_sources.get(field)
    }
}

/// Load the configuration with layered precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file is unreadable, oversized or
/// malformed, if the explicit file does not exist, or if the merged
/// configuration fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    let env_vars = options.env.clone().unwrap_or_else(collect_env_vars);

    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut sources);

    let user_path = user_config_path(options.home_override.as_deref(), &env_vars)?;
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut sources);
        info!(path = %user_path.display(), "loaded user config");
        loaded_files.push(user_path);
    }

    if let Some(root) = &options.workspace_root {
        let ws_path = root.join(CONFIG_DIR).join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::Workspace,
                &mut sources,
            );
            info!(path = %ws_path.display(), "loaded workspace config");
            loaded_files.push(ws_path);
        }
    }

    if let Some(path) = &options.explicit_file {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit(path.clone()),
            &mut sources,
        );
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.clone());
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut sources, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources: sources,
        loaded_files,
    })
}

/// Load a single file on top of the defaults, without other layers or env
/// fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or the
/// result fails validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;

    let config: Config = overlay
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

fn user_config_path(
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<PathBuf> {
    if let Some(home) = home_override {
        return Ok(home.join("config.toml"));
    }
    if let Some(home) = env_vars.get(HELIO_HOME).filter(|h| !h.trim().is_empty()) {
        return Ok(PathBuf::from(home).join("config.toml"));
    }
    let base = directories::BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
    Ok(base.home_dir().join(CONFIG_DIR).join("config.toml"))
}

/// Read and parse a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dirs {
        _tmp: tempfile::TempDir,
        home: PathBuf,
        workspace: PathBuf,
    }

    fn dirs() -> Dirs {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("home");
        let workspace = tmp.path().join("ws");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(workspace.join(CONFIG_DIR)).unwrap();
        Dirs {
            _tmp: tmp,
            home,
            workspace,
        }
    }

    fn options(d: &Dirs) -> LoadOptions {
        LoadOptions::for_workspace(&d.workspace)
            .with_home(&d.home)
            .with_env(HashMap::new())
    }

    #[test]
    fn test_defaults_deserialize_to_default_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_defaults_only() {
        let d = dirs();
        let resolved = load(&options(&d)).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.source_of("timeouts.interactive_ms"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_layer_precedence() {
        let d = dirs();
        std::fs::write(
            d.home.join("config.toml"),
            "[timeouts]\ninteractive_ms = 1000\ncalculation_ms = 2000\n",
        )
        .unwrap();
        std::fs::write(
            d.workspace.join(CONFIG_DIR).join("config.toml"),
            "[timeouts]\ncalculation_ms = 3000\n[engine]\nroot = \"engine\"\n",
        )
        .unwrap();

        let resolved = load(&options(&d)).unwrap();
        let t = &resolved.config.timeouts;
        assert_eq!(t.interactive_ms, 1000);
        assert_eq!(t.calculation_ms, 3000);
        assert_eq!(t.document_ms, 60_000);
        assert_eq!(t.overrides.get("calculate_live_pricing"), Some(&30_000));
        assert_eq!(resolved.config.engine.root, Some(PathBuf::from("engine")));

        assert_eq!(
            resolved.source_of("timeouts.interactive_ms"),
            Some(&ConfigLayer::User)
        );
        assert_eq!(
            resolved.source_of("timeouts.calculation_ms"),
            Some(&ConfigLayer::Workspace)
        );
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn test_explicit_file_wins() {
        let d = dirs();
        std::fs::write(
            d.workspace.join(CONFIG_DIR).join("config.toml"),
            "[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();
        let explicit = d.home.join("ci.toml");
        std::fs::write(&explicit, "[logging]\nlevel = \"trace\"\n").unwrap();

        let resolved = load(&options(&d).with_file(&explicit)).unwrap();
        assert_eq!(resolved.config.logging.level, "trace");
        assert_eq!(
            resolved.source_of("logging.level"),
            Some(&ConfigLayer::Explicit(explicit))
        );
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let d = dirs();
        let result = load(&options(&d).with_file(d.home.join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_env_fallback_only_for_unset_fields() {
        let d = dirs();
        std::fs::write(
            d.home.join("config.toml"),
            "[engine]\ninterpreter = \"/usr/bin/python3.12\"\n",
        )
        .unwrap();

        let env: HashMap<String, String> = [
            ("HELIO_PYTHON", "/opt/venv/bin/python"),
            ("HELIO_ENGINE_ROOT", "/opt/helio/engine"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let resolved = load(&options(&d).with_env(env)).unwrap();
        assert_eq!(
            resolved.config.engine.interpreter.as_deref(),
            Some("/usr/bin/python3.12")
        );
        assert_eq!(
            resolved.config.engine.root,
            Some(PathBuf::from("/opt/helio/engine"))
        );
        assert_eq!(
            resolved.source_of("engine.root"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_helio_home_env_locates_user_config() {
        let d = dirs();
        let alt = d.home.join("alt");
        std::fs::create_dir_all(&alt).unwrap();
        std::fs::write(alt.join("config.toml"), "[logging]\nformat = \"json\"\n").unwrap();

        let mut env = HashMap::new();
        env.insert(HELIO_HOME.to_owned(), alt.display().to_string());
        let opts = LoadOptions::default().with_env(env);

        let resolved = load(&opts).unwrap();
        assert_eq!(resolved.config.logging.format, "json");
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let d = dirs();
        std::fs::write(d.home.join("config.toml"), "[timeouts]\ndocument_ms = 0\n").unwrap();
        let result = load(&options(&d));
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let d = dirs();
        std::fs::write(d.home.join("config.toml"), "[timeouts\n").unwrap();
        let result = load(&options(&d));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_file_single_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\ncandidates = [\"py -3\"]\n").unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.engine.candidates, Some(vec!["py -3".to_owned()]));
        assert_eq!(config.timeouts.interactive_ms, 8_000);
    }
}
