use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "NeuroTriage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP bind address (loopback only).
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";

/// Default file names inside the models directory.
pub const GATE_MODEL_FILE: &str = "mri_nonmri_classifier.onnx";
pub const DIAGNOSIS_MODEL_FILE: &str = "alzheimer_stage_classifier.onnx";

/// Environment overrides.
pub const ENV_MODELS_DIR: &str = "NEUROTRIAGE_MODELS_DIR";
pub const ENV_GATE_MODEL: &str = "NEUROTRIAGE_GATE_MODEL";
pub const ENV_DIAGNOSIS_MODEL: &str = "NEUROTRIAGE_DIAGNOSIS_MODEL";
pub const ENV_BIND_ADDR: &str = "NEUROTRIAGE_BIND_ADDR";
pub const ENV_STRICT_CONTRACT: &str = "NEUROTRIAGE_STRICT_CONTRACT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid bind address '{value}': {reason}")]
    InvalidBindAddr { value: String, reason: String },

    #[error("Invalid value for {name}: '{value}' (expected true/false)")]
    InvalidFlag { name: &'static str, value: String },
}

/// Whether this is a debug build.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "neurotriage_lib=debug,neurotriage=debug,tower_http=debug,info"
    } else {
        "neurotriage_lib=info,neurotriage=info,warn"
    }
}

/// Get the application data directory
/// ~/NeuroTriage/ on all platforms; falls back to the working directory when
/// no home directory can be resolved (containers, service accounts).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the models directory (gate + diagnosis ONNX exports)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub models_dir: PathBuf,
    pub gate_model_path: PathBuf,
    pub diagnosis_model_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Treat model contract violations (gate score outside [0, 1], diagnosis
    /// distribution not summing to 1.0) as errors.
    pub strict_contract: bool,
}

impl Config {
    /// Defaults with both models expected under `dir`.
    pub fn with_models_dir(dir: &Path) -> Self {
        Self {
            models_dir: dir.to_path_buf(),
            gate_model_path: dir.join(GATE_MODEL_FILE),
            diagnosis_model_path: dir.join(DIAGNOSIS_MODEL_FILE),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
            strict_contract: false,
        }
    }

    /// Resolve from process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup (tests pass a map instead of the env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let models_dir = lookup(ENV_MODELS_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(models_dir);
        let mut config = Self::with_models_dir(&models_dir);

        if let Some(path) = lookup(ENV_GATE_MODEL) {
            config.gate_model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_DIAGNOSIS_MODEL) {
            config.diagnosis_model_path = PathBuf::from(path);
        }

        let bind = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        config.bind_addr = bind.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::InvalidBindAddr {
                value: bind.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(value) = lookup(ENV_STRICT_CONTRACT) {
            config.strict_contract = parse_flag(ENV_STRICT_CONTRACT, &value)?;
        }

        Ok(config)
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}
