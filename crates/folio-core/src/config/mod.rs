//! Configuration loading for the play reader.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! defaults so conversion and browsing still work out of the box.

mod defaults;
mod io;
mod models;
mod tables;

pub use defaults::CORPUS_ASSET_PATH;
pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel};
