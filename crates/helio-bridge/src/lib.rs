//! Helio Bridge - Invoke an external computation engine as a child process.
//!
//! The bridge turns a logical command name and a JSON payload into one run
//! of an engine script, and every way that run can end into a
//! [`ResultEnvelope`]:
//!
//! 1. the [`CommandRegistry`] maps the name to a script, transport and
//!    response shape;
//! 2. the [`CandidateResolver`] finds a working interpreter once and caches
//!    it;
//! 3. the payload is marshaled into arguments, stdin or a request file;
//! 4. the process runs under a hard timeout, its whole process group killed
//!    on expiry;
//! 5. the outcome is classified into data or an [`ErrorKind`], and any
//!    request file is deleted.
//!
//! # Example
//!
//! ```rust,no_run
//! use helio_bridge::EngineBridge;
//! use serde_json::json;
//!
//! # async fn example() {
//! let bridge = EngineBridge::new("/opt/helio/engine").with_scratch_dir("/tmp/helio");
//!
//! let envelope = bridge
//!     .call_command("perform_calculations", json!({"module_quantity": 20}), None)
//!     .await;
//!
//! if let Some(data) = envelope.data() {
//!     println!("{data}");
//! }
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod capability;
pub mod classify;
pub mod cleanup;
pub mod invoker;
pub mod marshal;
pub mod registry;

mod bridge;
mod envelope;
mod error;

pub use bridge::{EngineBridge, TimeoutPolicy};
pub use capability::{
    Candidate, CandidateResolver, Capability, ProbeSuccess, Prober, ProcessProber,
    ResolvedCapability,
};
pub use envelope::ResultEnvelope;
pub use error::{BridgeError, BridgeResult, CandidateAttempt, ErrorKind};
pub use registry::{
    ArgStyle, CommandFamily, CommandRegistry, CommandSpec, ResponseShape, TimeoutClass,
    TransportMode,
};
