//! `commands`: list the command registry.

use helio_bridge::{CommandRegistry, CommandSpec, TimeoutPolicy};
use serde::Serialize;

use crate::theme::Theme;

/// The serde name of a registry enum (e.g. `temp_file`).
fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// One table row for `spec`.
pub(crate) fn format_row(spec: &CommandSpec, timeouts: &TimeoutPolicy) -> String {
    format!(
        "{:<32} {:<12} {:<10} {:<9} {:>7}s",
        spec.name,
        spec.family.as_str(),
        label(&spec.transport),
        label(&spec.response),
        timeouts.for_command(spec).as_secs()
    )
}

/// Print every registered command.
pub(crate) fn list_commands(registry: &CommandRegistry, timeouts: &TimeoutPolicy) {
    println!("\n{}", Theme::header("Engine Commands"));
    println!(
        "{}",
        Theme::dimmed(&format!(
            "{:<32} {:<12} {:<10} {:<9} {:>8}",
            "COMMAND", "FAMILY", "TRANSPORT", "RESPONSE", "TIMEOUT"
        ))
    );
    println!("{}", Theme::separator());

    for spec in registry.iter() {
        println!("{}", format_row(spec, timeouts));
    }

    println!("{}", Theme::separator());
    println!("{}", Theme::dimmed(&format!("{} commands", registry.len())));
}
