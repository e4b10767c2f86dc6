//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `TIDELINK_DATA_DIR`: Directory for deferred requests and the device id
//! - `TIDELINK_SIGNING_SECRET`: Shared HMAC secret
//!
//! Optional (defaults otherwise):
//! - `TIDELINK_DEVICE_ID`: Overrides the persisted device id
//! - `TIDELINK_BASE_URL`: Base URL for requests built without a URL
//! - `TIDELINK_SESSION_URL`: Duplex endpoint; no session without it
//! - `TIDELINK_SESSION_AUTO_CONNECT`: Connect the session on start (true/false)
//! - `TIDELINK_HEARTBEAT_SECS`: Base heartbeat interval in seconds
//! - `TIDELINK_MAX_CONCURRENT`: Scheduler execution slots
//! - `TIDELINK_POLL_SECS`: Connectivity poll interval in seconds
//! - `TIDELINK_PROBE_ADDRESS`: `host:port` dialled by the reachability probe
//! - `TIDELINK_LOG_LEVEL`: Default log filter directive
//! - `TIDELINK_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./tidelink.json` or `./tidelink.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tidelink_domain::{Config, Result, TidelinkError};
use url::Url;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `TidelinkError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The required variables must be present; everything else falls back to
/// [`Config::default`].
///
/// # Errors
/// Returns `TidelinkError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.data_dir = PathBuf::from(env_var("TIDELINK_DATA_DIR")?);
    config.signing.secret_key = env_var("TIDELINK_SIGNING_SECRET")?;
    config.signing.device_id = std::env::var("TIDELINK_DEVICE_ID").ok();

    config.http.base_url = std::env::var("TIDELINK_BASE_URL").ok();
    config.session.url = std::env::var("TIDELINK_SESSION_URL").ok();
    config.session.auto_connect = env_bool("TIDELINK_SESSION_AUTO_CONNECT", false);

    if let Some(secs) = env_parse::<u64>("TIDELINK_HEARTBEAT_SECS")? {
        config.session.heartbeat_base_secs = secs;
    }
    if let Some(slots) = env_parse::<usize>("TIDELINK_MAX_CONCURRENT")? {
        config.scheduler.max_concurrent = slots;
    }
    if let Some(secs) = env_parse::<u64>("TIDELINK_POLL_SECS")? {
        config.connectivity.poll_interval_secs = secs;
    }
    if let Ok(address) = std::env::var("TIDELINK_PROBE_ADDRESS") {
        config.connectivity.probe_address = address;
    }

    if let Ok(level) = std::env::var("TIDELINK_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("TIDELINK_LOG_JSON", false);

    check_endpoints(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TidelinkError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TidelinkError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TidelinkError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TidelinkError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `TidelinkError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: Config = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TidelinkError::Config(format!("Invalid TOML format: {e}")))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| TidelinkError::Config(format!("Invalid JSON format: {e}")))?,
        _ => return Err(TidelinkError::Config(format!("Unsupported config format: {extension}"))),
    };
    check_endpoints(&config)?;
    Ok(config)
}

/// Rejects endpoints that are not absolute URLs with a usable scheme.
fn check_endpoints(config: &Config) -> Result<()> {
    if let Some(base_url) = &config.http.base_url {
        check_scheme("http.base_url", base_url, &["http", "https"])?;
    }
    if let Some(session_url) = &config.session.url {
        check_scheme("session.url", session_url, &["ws", "wss"])?;
    }
    Ok(())
}

fn check_scheme(field: &str, raw: &str, allowed: &[&str]) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| TidelinkError::Config(format!("{field} is not a valid URL: {e}")))?;
    if !allowed.contains(&url.scheme()) {
        return Err(TidelinkError::Config(format!(
            "{field} must use one of {allowed:?}, got '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("tidelink.json"),
        dir.join("tidelink.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `TidelinkError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| TidelinkError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TidelinkError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
