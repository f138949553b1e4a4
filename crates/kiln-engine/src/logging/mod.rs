//! Logging setup.
//!
//! The engine logs through the `log` facade only; this module wires up
//! `env_logger` for binaries that want the default backend.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
