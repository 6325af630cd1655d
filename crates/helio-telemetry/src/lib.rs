//! Helio Telemetry - Logging and request correlation for the engine bridge.
//!
//! This crate provides:
//! - Configurable logging setup (pretty, compact or JSON; stderr, stdout or
//!   a rolling file)
//! - Request context for correlating every log line of one bridge call
//!
//! # Example
//!
//! ```rust,no_run
//! use helio_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), helio_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("helio_bridge=debug");
//!
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("engine_bridge").with_operation("perform_calculations");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("calling engine");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
