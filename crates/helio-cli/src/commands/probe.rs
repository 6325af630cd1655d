//! `probe`: resolve the engine interpreter.

use anyhow::Result;
use helio_bridge::EngineBridge;

use crate::theme::Theme;

/// Resolve the interpreter and print the engine-info envelope.
///
/// Returns whether an interpreter was found.
pub(crate) async fn run_probe(bridge: &EngineBridge) -> Result<bool> {
    let envelope = bridge.engine_info().await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    match envelope.message() {
        None => eprintln!(
            "{}",
            Theme::success(&format!(
                "engine root {}",
                bridge.engine_root().display()
            ))
        ),
        Some(message) => eprintln!("{}", Theme::error(message)),
    }

    Ok(envelope.is_success())
}
