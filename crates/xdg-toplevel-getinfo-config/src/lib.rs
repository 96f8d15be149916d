//! Configuration parsing for xdg-toplevel-getinfo
//!
//! This crate handles locating and parsing the optional KDL configuration
//! file. Every setting has a default matching the values phosh ships with,
//! so a missing file is the normal case.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{config_path, load_config, parse_config, parse_config_str, CONFIG_ENV};
