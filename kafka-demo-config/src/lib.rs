//! Configuration types and hierarchical loading for the kafka demo binaries.
//!
//! Both binaries load their settings through [`load_config`], which merges a base file, an
//! environment specific file and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config, load_config_from};
