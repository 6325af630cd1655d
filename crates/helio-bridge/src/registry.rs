//! Command registry: maps logical command names to engine scripts and the
//! conventions used to talk to them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// How the payload reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Encoded into command-line arguments.
    Argv,
    /// JSON written to the child's standard input.
    Stdin,
    /// JSON written to a temporary file whose path is passed as an argument.
    TempFile,
}

/// Argument encoding for [`TransportMode::Argv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgStyle {
    /// Payload values as positional arguments.
    #[default]
    Positional,
    /// Object fields as `--key=value` flags.
    Flags,
}

/// What the engine writes on stdout when it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// One JSON document, taken as the result.
    Json,
    /// Plain text (e.g. a generated file path), taken trimmed.
    Text,
    /// A `{success, data, error}` wrapper produced by the engine itself.
    Envelope,
}

/// Group of related commands served by one engine script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFamily {
    /// Component catalog lookups and product edits.
    Catalog,
    /// Product database CRUD.
    Products,
    /// Project calculations and live pricing.
    Calculation,
    /// Offer document generation.
    Document,
}

impl CommandFamily {
    /// Lowercase name, also used as the temp-file prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Products => "products",
            Self::Calculation => "calculation",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which configured timeout budget a command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutClass {
    /// Short lookups.
    Interactive,
    /// Long-running calculations.
    Calculation,
    /// Document rendering.
    Document,
}

/// Everything the bridge needs to know to run one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Logical command name.
    pub name: String,
    /// Command family.
    pub family: CommandFamily,
    /// Engine script, relative to the engine root.
    pub script: PathBuf,
    /// Payload transport.
    pub transport: TransportMode,
    /// Argument encoding (only meaningful for `Argv`).
    pub arg_style: ArgStyle,
    /// Expected stdout shape.
    pub response: ResponseShape,
    /// Timeout budget.
    pub timeout_class: TimeoutClass,
    /// Leading verb argument, passed before the payload.
    pub verb: Option<String>,
    /// Carry the command name as a `command` field of the JSON request
    /// body (stdin and temp-file transports).
    #[serde(default)]
    pub command_field: bool,
}

impl CommandSpec {
    /// Create a spec with a JSON response and the interactive timeout.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        family: CommandFamily,
        script: impl Into<PathBuf>,
        transport: TransportMode,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            script: script.into(),
            transport,
            arg_style: ArgStyle::default(),
            response: ResponseShape::Json,
            timeout_class: TimeoutClass::Interactive,
            verb: None,
            command_field: false,
        }
    }

    /// Set the argument style.
    #[must_use]
    pub fn with_arg_style(mut self, style: ArgStyle) -> Self {
        self.arg_style = style;
        self
    }

    /// Set the response shape.
    #[must_use]
    pub fn with_response(mut self, response: ResponseShape) -> Self {
        self.response = response;
        self
    }

    /// Set the timeout class.
    #[must_use]
    pub fn with_timeout_class(mut self, class: TimeoutClass) -> Self {
        self.timeout_class = class;
        self
    }

    /// Pass the command name as the first argument.
    #[must_use]
    pub fn with_name_as_verb(mut self) -> Self {
        self.verb = Some(self.name.clone());
        self
    }

    /// Name the command inside the request body, for engines that serve
    /// several commands from one request file.
    #[must_use]
    pub fn with_command_field(mut self) -> Self {
        self.command_field = true;
        self
    }

    /// Absolute script path under `engine_root`.
    #[must_use]
    pub fn script_path(&self, engine_root: &Path) -> PathBuf {
        engine_root.join(&self.script)
    }
}

const CATALOG_SCRIPT: &str = "solar_calculator_bridge.py";
const PRODUCTS_SCRIPT: &str = "database_bridge.py";
const CALCULATION_SCRIPT: &str = "calculation_bridge.py";
const PROJECT_SCRIPT: &str = "calculations_cli.py";
const DOCUMENT_SCRIPT: &str = "pdf_generation_bridge.py";

const COMPONENT_KINDS: &[&str] = &[
    "pv",
    "inverter",
    "storage",
    "wallbox",
    "ems",
    "optimizer",
    "carport",
    "emergency_power",
    "animal_protection",
];

const CATALOG_EDITS: &[&str] = &[
    "save_config",
    "import_products_from_file",
    "add_product_single",
    "update_product_single",
    "products_list",
    "delete_product_single",
];

const PRODUCT_COMMANDS: &[&str] = &[
    "list_products",
    "add_product",
    "update_product",
    "delete_product",
    "get_product_by_id",
    "get_product_by_model",
    "list_categories",
    "list_manufacturers",
    "get_products_by_manufacturer",
    "list_brand_logos",
    "add_brand_logo",
    "get_brand_logo",
    "delete_brand_logo",
    "init_database",
];

/// Read-only table of known commands.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandRegistry {
    /// The built-in command table.
    #[must_use]
    pub fn builtin() -> Self {
        let catalog = |name: String| {
            CommandSpec::new(name, CommandFamily::Catalog, CATALOG_SCRIPT, TransportMode::Argv)
                .with_name_as_verb()
        };

        let mut specs = Vec::new();
        for kind in COMPONENT_KINDS {
            specs.push(catalog(format!("get_{kind}_manufacturers")));
            specs.push(catalog(format!("get_{kind}_models")));
        }
        specs.extend(CATALOG_EDITS.iter().map(|name| catalog((*name).to_string())));

        specs.extend(PRODUCT_COMMANDS.iter().map(|name| {
            CommandSpec::new(
                *name,
                CommandFamily::Products,
                PRODUCTS_SCRIPT,
                TransportMode::Argv,
            )
            .with_arg_style(ArgStyle::Flags)
            .with_response(ResponseShape::Envelope)
            .with_name_as_verb()
        }));

        for name in ["perform_calculations", "calculate_live_pricing"] {
            specs.push(
                CommandSpec::new(
                    name,
                    CommandFamily::Calculation,
                    CALCULATION_SCRIPT,
                    TransportMode::TempFile,
                )
                .with_timeout_class(TimeoutClass::Calculation)
                .with_command_field(),
            );
        }
        specs.push(
            CommandSpec::new(
                "calculate_project",
                CommandFamily::Calculation,
                PROJECT_SCRIPT,
                TransportMode::Stdin,
            )
            .with_timeout_class(TimeoutClass::Calculation),
        );
        specs.push(
            CommandSpec::new(
                "generate_offer_pdf",
                CommandFamily::Document,
                DOCUMENT_SCRIPT,
                TransportMode::TempFile,
            )
            .with_response(ResponseShape::Text)
            .with_timeout_class(TimeoutClass::Document),
        );

        Self::from_specs(specs)
    }

    /// Build a registry from explicit specs. Later duplicates replace
    /// earlier ones.
    #[must_use]
    pub fn from_specs(specs: impl IntoIterator<Item = CommandSpec>) -> Self {
        let commands = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { commands }
    }

    /// Look up a command by name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownCommand`] if the name is not registered.
    pub fn lookup(&self, name: &str) -> BridgeResult<&CommandSpec> {
        self.commands
            .get(name)
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))
    }

    /// Iterate over all commands in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
