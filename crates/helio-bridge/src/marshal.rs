//! Payload marshaling for the three transport modes.

use serde_json::{Map, Value};
use tracing::debug;

use crate::cleanup::{ScratchDir, TempArtifact};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{ArgStyle, CommandSpec, TransportMode};

/// A payload encoded for one invocation.
#[derive(Debug, Default)]
pub struct Marshaled {
    /// Arguments passed after the script path.
    pub args: Vec<String>,
    /// Bytes to write to the child's stdin, if the transport uses it.
    pub stdin: Option<Vec<u8>>,
    /// Request file that must outlive the child process.
    pub artifact: Option<TempArtifact>,
}

/// Encode `payload` for `spec`'s transport.
///
/// # Errors
///
/// Returns [`BridgeError::MarshalFailed`] if the payload cannot be
/// represented in the transport (a non-object for flag arguments, a NUL
/// byte in an argument, or an unwritable scratch directory).
pub fn marshal(spec: &CommandSpec, payload: &Value, scratch: &ScratchDir) -> BridgeResult<Marshaled> {
    let mut args: Vec<String> = spec.verb.iter().cloned().collect();

    let marshaled = match spec.transport {
        TransportMode::Argv => {
            match spec.arg_style {
                ArgStyle::Positional => args.extend(positional_args(payload)),
                ArgStyle::Flags => args.extend(flag_args(&spec.name, payload)?),
            }
            Marshaled {
                args,
                ..Marshaled::default()
            }
        },
        TransportMode::Stdin => Marshaled {
            args,
            stdin: Some(encode(spec, payload)?),
            artifact: None,
        },
        TransportMode::TempFile => {
            let bytes = encode(spec, payload)?;
            let artifact = scratch
                .create_artifact(spec.family, &bytes)
                .map_err(|e| {
                    BridgeError::marshal(
                        &spec.name,
                        format!(
                            "cannot write request file in {}: {e}",
                            scratch.path().display()
                        ),
                    )
                })?;
            args.push(artifact.path().to_string_lossy().into_owned());
            Marshaled {
                args,
                stdin: None,
                artifact: Some(artifact),
            }
        },
    };

    if let Some(bad) = marshaled.args.iter().find(|a| a.contains('\0')) {
        return Err(BridgeError::marshal(
            &spec.name,
            format!("argument contains a NUL byte: {bad:?}"),
        ));
    }

    debug!(
        command = %spec.name,
        transport = ?spec.transport,
        args = marshaled.args.len(),
        stdin_bytes = marshaled.stdin.as_ref().map_or(0, Vec::len),
        "Marshaled payload"
    );

    Ok(marshaled)
}

fn encode(spec: &CommandSpec, payload: &Value) -> BridgeResult<Vec<u8>> {
    let encoded = if spec.command_field {
        serde_json::to_vec(&with_command(&spec.name, payload))
    } else {
        serde_json::to_vec(payload)
    };
    encoded.map_err(|e| BridgeError::marshal(&spec.name, format!("cannot encode payload: {e}")))
}

/// `{"command": name, ...fields}` for objects, `{"command", "payload"}`
/// otherwise. The command name wins over a `command` field in the payload.
fn with_command(name: &str, payload: &Value) -> Value {
    let mut body = Map::new();
    body.insert("command".to_owned(), Value::String(name.to_owned()));
    match payload {
        Value::Null => {},
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "command" {
                    body.insert(key.clone(), value.clone());
                }
            }
        },
        other => {
            body.insert("payload".to_owned(), other.clone());
        },
    }
    Value::Object(body)
}

/// Strings pass through raw; everything else as JSON text.
fn arg_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn positional_args(payload: &Value) -> Vec<String> {
    match payload {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(arg_text).collect(),
        other => vec![arg_text(other)],
    }
}

fn flag_args(command: &str, payload: &Value) -> BridgeResult<Vec<String>> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Object(fields) => Ok(fields
            .iter()
            .map(|(key, value)| format!("--{key}={}", arg_text(value)))
            .collect()),
        other => Err(BridgeError::marshal(
            command,
            format!("flag arguments need an object payload, got {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
