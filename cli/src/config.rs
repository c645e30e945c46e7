//! Codec configuration for the CLI: defaults, then a TOML file, then
//! `BEEPWAVE_*` environment variables. Command-line flags are applied on top
//! by the caller.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use beepwave_core::CodecConfig;
use thiserror::Error;

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "beepwave.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Load the codec config. An explicit path must exist and parse; a
/// discovered file that fails to parse is skipped with a warning.
pub fn load(explicit: Option<&Path>) -> Result<CodecConfig, ConfigError> {
    let config = match explicit {
        Some(path) => load_file(path)?,
        None => discover().unwrap_or_default(),
    };
    Ok(apply_env(config, |name| std::env::var(name).ok()))
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        out.push(home.join(".config/beepwave/config.toml"));
    }
    out
}

fn discover() -> Option<CodecConfig> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    match load_file(&path) {
        Ok(config) => {
            tracing::info!("loaded config from {}", path.display());
            Some(config)
        }
        Err(e) => {
            tracing::warn!("{}; using defaults", e);
            None
        }
    }
}

pub fn load_file(path: &Path) -> Result<CodecConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `BEEPWAVE_*` overrides. Unparsable values are ignored.
pub fn apply_env<F>(mut config: CodecConfig, lookup: F) -> CodecConfig
where
    F: Fn(&str) -> Option<String>,
{
    override_from(&lookup, "BEEPWAVE_MIN_FREQUENCY", &mut config.min_frequency);
    override_from(&lookup, "BEEPWAVE_MAX_FREQUENCY", &mut config.max_frequency);
    override_from(&lookup, "BEEPWAVE_SEPARATOR_FREQUENCY", &mut config.separator_frequency);
    override_from(&lookup, "BEEPWAVE_SYMBOL_DURATION_MS", &mut config.symbol_duration_ms);
    override_from(&lookup, "BEEPWAVE_VOLUME", &mut config.volume);
    override_from(&lookup, "BEEPWAVE_WAVEFORM", &mut config.waveform);
    override_from(&lookup, "BEEPWAVE_USE_SEPARATOR", &mut config.use_separator);
    config
}

fn override_from<T, F>(lookup: &F, name: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("ignoring {}={:?}: not a valid value", name, raw),
    }
}
