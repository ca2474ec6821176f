//! # HostBridge Config
//!
//! Configuration for the HostBridge server: listener address, pump cadence,
//! queue and result-store limits, broadcast back-pressure, task retention
//! and logging.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
