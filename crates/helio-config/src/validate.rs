//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Accepted values for `logging.format`.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_engine(config)?;
    validate_timeouts(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_engine(config: &Config) -> ConfigResult<()> {
    let e = &config.engine;

    if e.interpreter.as_deref().is_some_and(|i| i.trim().is_empty()) {
        return Err(invalid("engine.interpreter", "interpreter must not be empty"));
    }

    if let Some(candidates) = &e.candidates {
        if candidates.is_empty() {
            return Err(invalid(
                "engine.candidates",
                "candidate list must not be empty; remove the key to use the platform default",
            ));
        }
        if candidates.iter().any(|c| c.trim().is_empty()) {
            return Err(invalid("engine.candidates", "candidates must not be blank"));
        }
    }

    if e.probe_timeout_ms == 0 {
        return Err(invalid("engine.probe_timeout_ms", "must be greater than zero"));
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> ConfigResult<()> {
    let t = &config.timeouts;

    for (field, value) in [
        ("timeouts.interactive_ms", t.interactive_ms),
        ("timeouts.calculation_ms", t.calculation_ms),
        ("timeouts.document_ms", t.document_ms),
    ] {
        if value == 0 {
            return Err(invalid(field, "must be greater than zero"));
        }
    }

    if let Some((command, _)) = t.overrides.iter().find(|(_, ms)| **ms == 0) {
        return Err(invalid(
            format!("timeouts.overrides.{command}"),
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if l.level.trim().is_empty() {
        return Err(invalid("logging.level", "level must not be empty"));
    }

    if !LOG_FORMATS.contains(&l.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    Ok(())
}
