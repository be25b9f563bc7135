//! # kis-core
//!
//! Core crate for the KIS overseas-stock toolkit, providing:
//!
//! - **Types** (`types`): trading enums, order intents, response views
//! - **Configuration** (`config`): JSON config deserialization and validation
//! - **Error types** (`error`): domain-specific `KisError` via thiserror
//! - **Time utilities** (`time_util`): epoch clock and day/night session window
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
