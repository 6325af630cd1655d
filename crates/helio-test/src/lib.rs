//! Helio Test - Shared test utilities for the engine bridge.
//!
//! Fake engines are POSIX `sh` scripts written into a temporary engine
//! root; the bridge runs them through `sh` instead of a Python interpreter.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! helio-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use helio_test::{FakeEngine, scripts};
//!
//! #[tokio::test]
//! async fn test_failure() {
//!     let engine = FakeEngine::new();
//!     engine.write_script("calculation_bridge.py", scripts::FAIL_BOOM);
//!
//!     let envelope = engine
//!         .bridge()
//!         .call_command("perform_calculations", serde_json::json!({}), None)
//!         .await;
//!     assert!(!envelope.is_success());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;
pub mod scripts;

pub use fixtures::*;
pub use mocks::*;
