//! `call`: run one engine command and print its envelope.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use helio_bridge::{EngineBridge, ResultEnvelope};
use serde_json::Value;

use crate::theme::Theme;

/// Read the payload from `--payload` or `--payload-file`; `null` (no
/// payload) if neither was given.
pub(crate) fn read_payload(inline: Option<&str>, file: Option<&Path>) -> Result<Value> {
    let text = match (inline, file) {
        (Some(text), None) => text.to_owned(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload file {}", path.display()))?,
        (None, None) => return Ok(Value::Null),
        (Some(_), Some(_)) => anyhow::bail!("use either --payload or --payload-file, not both"),
    };

    serde_json::from_str(&text).context("payload is not valid JSON")
}

/// Run `command` and print the envelope to stdout.
///
/// Returns whether the call succeeded.
pub(crate) async fn run_call(
    bridge: &EngineBridge,
    command: &str,
    payload: Value,
    timeout_ms: Option<u64>,
) -> Result<bool> {
    let timeout = timeout_ms.map(Duration::from_millis);
    let envelope = bridge.call_command(command, payload, timeout).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if let ResultEnvelope::Failure { kind, message } = &envelope {
        eprintln!("{}", Theme::error(&format!("{command}: {kind}: {message}")));
    }

    Ok(envelope.is_success())
}
