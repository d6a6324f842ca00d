//! Configuration parsing for ledgerwatch
//!
//! This crate handles parsing the KDL configuration file that describes
//! which server to connect to and what the monitor worker should watch.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{expand_path, load_config, parse_config, parse_config_str, DEFAULT_CONFIG_PATH};
