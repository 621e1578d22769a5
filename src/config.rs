//! Completion command and runtime settings resolution.
//!
//! The LM command is resolved from, in order: the `--lm` flag, the
//! `TRIPCHAIN_LM_COMMAND` environment variable, and the user config file at
//! `<config_dir>/tripchain/config.json`. Timeout and retry budget follow the
//! same precedence, with built-in defaults at the bottom.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LM_COMMAND_ENV: &str = "TRIPCHAIN_LM_COMMAND";
const CONFIG_DIR_NAME: &str = "tripchain";
const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// On-disk user configuration. All fields optional; flags and the
/// environment override whatever is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub lm_command: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub lm_command: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

/// Resolve settings from flags, the environment, and the user config file.
pub fn resolve(
    lm_flag: Option<&str>,
    timeout_flag: Option<u64>,
    retries_flag: Option<u32>,
) -> Result<ResolvedConfig> {
    let env_command = std::env::var(LM_COMMAND_ENV).ok().filter(|v| !v.is_empty());
    let file = match config_path() {
        Some(path) => load_file_config_from(&path)?,
        None => None,
    };
    resolve_from_parts(lm_flag, env_command, file, timeout_flag, retries_flag)
}

/// Pure precedence logic, split out so it is testable without touching the
/// process environment.
fn resolve_from_parts(
    lm_flag: Option<&str>,
    env_command: Option<String>,
    file: Option<FileConfig>,
    timeout_flag: Option<u64>,
    retries_flag: Option<u32>,
) -> Result<ResolvedConfig> {
    let file = file.unwrap_or_default();

    let lm_command = lm_flag
        .map(str::to_string)
        .or(env_command)
        .or(file.lm_command)
        .ok_or_else(|| {
            anyhow!(
                "no LM command configured; pass --lm, set {LM_COMMAND_ENV}, or add \
                 lm_command to {CONFIG_DIR_NAME}/{CONFIG_FILE_NAME} in your config directory"
            )
        })?;

    let timeout_secs = timeout_flag
        .or(file.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_retries = retries_flag
        .or(file.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES)
        .max(1);

    Ok(ResolvedConfig {
        lm_command,
        timeout: Duration::from_secs(timeout_secs),
        max_retries,
    })
}

/// Location of the user config file, if the platform has a config dir.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load and parse the config file at `path`. A missing file is not an error.
fn load_file_config_from(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let config: FileConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parse config file {}", path.display()))?;
    Ok(Some(config))
}
