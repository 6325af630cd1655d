//! Response classification: raw process outcome to result or error.

use std::time::Duration;

use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::invoker::{ExitState, Outcome};
use crate::registry::ResponseShape;

/// Diagnostic text is cut to this many bytes.
pub const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// Classify `outcome` for a command with the given response `shape`.
///
/// # Errors
///
/// Returns the failure kind matching the outcome: `EngineUnavailable` for
/// spawn failures, `Timeout`, `EngineError` for non-zero exits or engine
/// reported failures, and `MalformedResponse` for unparseable output.
pub fn classify(shape: ResponseShape, outcome: &Outcome, timeout: Duration) -> BridgeResult<Value> {
    let code = match &outcome.exit {
        ExitState::SpawnFailed { message } => {
            return Err(BridgeError::EngineUnavailable {
                message: message.clone(),
            });
        },
        ExitState::TimedOut => return Err(BridgeError::Timeout { timeout }),
        ExitState::Exited { code } => *code,
    };

    if code != Some(0) {
        let stderr = lossy_trimmed(&outcome.stderr);
        let message = if stderr.is_empty() {
            lossy_trimmed(&outcome.stdout)
        } else {
            stderr
        };
        let message = if message.is_empty() {
            "engine exited without diagnostics".to_string()
        } else {
            truncate_diagnostic(&message)
        };
        return Err(BridgeError::EngineError {
            exit_code: code,
            message,
        });
    }

    match shape {
        ResponseShape::Text => Ok(Value::String(lossy_trimmed(&outcome.stdout))),
        ResponseShape::Json => parse_json(&outcome.stdout),
        ResponseShape::Envelope => unwrap_envelope(parse_json(&outcome.stdout)?),
    }
}

fn parse_json(stdout: &[u8]) -> BridgeResult<Value> {
    serde_json::from_slice(stdout).map_err(|e| {
        let text = lossy_trimmed(stdout);
        BridgeError::MalformedResponse {
            message: if text.is_empty() {
                "engine produced no output".to_string()
            } else {
                format!("invalid JSON ({e}): {}", truncate_diagnostic(&text))
            },
        }
    })
}

fn unwrap_envelope(value: Value) -> BridgeResult<Value> {
    let Value::Object(mut fields) = value else {
        return Err(BridgeError::MalformedResponse {
            message: "expected a {success, ...} object".to_string(),
        });
    };

    match fields.get("success") {
        Some(Value::Bool(true)) => {
            if let Some(data) = fields.remove("data") {
                return Ok(data);
            }
            fields.remove("success");
            Ok(Value::Object(fields))
        },
        Some(Value::Bool(false)) => {
            let message = match fields.remove("error") {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => "engine reported failure".to_string(),
                Some(other) => other.to_string(),
            };
            Err(BridgeError::EngineError {
                exit_code: Some(0),
                message: truncate_diagnostic(&message),
            })
        },
        _ => Err(BridgeError::MalformedResponse {
            message: "response has no boolean 'success' field".to_string(),
        }),
    }
}

fn lossy_trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Cut `text` to [`MAX_DIAGNOSTIC_BYTES`] at a char boundary.
#[must_use]
pub fn truncate_diagnostic(text: &str) -> String {
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    format!("{}... [truncated]", text.get(..end).unwrap_or_default())
}
