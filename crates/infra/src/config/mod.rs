//! Configuration loading.
//!
//! Environment variables take precedence; a `config.{json,toml}` or
//! `tidelink.{json,toml}` file is used when the required variables are
//! absent.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
