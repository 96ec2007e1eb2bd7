use crate::router::HostPlatform;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Delay before `clear`/`cls` empties the log, so the echoed line can paint first.
pub const DEFAULT_CLEAR_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub platform: HostPlatform,
    pub clear_delay: Duration,
    pub default_directory: Option<String>,
    pub command_log_file: Option<PathBuf>,
    pub command_log_max_size_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            platform: HostPlatform::detect(),
            clear_delay: DEFAULT_CLEAR_DELAY,
            default_directory: None,
            command_log_file: None,
            command_log_max_size_bytes: 10 * 1024 * 1024,
        }
    }
}

fn expand_tilde(path_str: &str) -> Result<PathBuf, anyhow::Error> {
    Ok(PathBuf::from(shellexpand::tilde(path_str).as_ref()))
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let platform_str = std::env::var("SHELL_PLATFORM").unwrap_or_else(|_| "auto".to_string());
        let platform = HostPlatform::from_str(&platform_str)?;

        let clear_delay_ms = std::env::var("CLEAR_DELAY_MS")
            .unwrap_or_else(|_| DEFAULT_CLEAR_DELAY.as_millis().to_string())
            .parse::<u64>()
            .context("Invalid CLEAR_DELAY_MS")?;

        let default_directory = non_empty_var("DEFAULT_DIRECTORY")
            .map(|s| expand_tilde(&s))
            .transpose()?
            .map(|p| p.to_string_lossy().to_string());

        let command_log_file = non_empty_var("COMMAND_LOG_FILE")
            .map(|s| expand_tilde(&s))
            .transpose()?;

        let command_log_max_size_bytes = std::env::var("COMMAND_LOG_MAX_SIZE_MB")
            .unwrap_or_else(|_| "10".to_string()) // Default 10 MB
            .parse::<u64>()
            .map(|mb| mb * 1024 * 1024)
            .context("Invalid COMMAND_LOG_MAX_SIZE_MB")?;

        Ok(Config {
            log_level,
            platform,
            clear_delay: Duration::from_millis(clear_delay_ms),
            default_directory,
            command_log_file,
            command_log_max_size_bytes,
        })
    }

    /// Directory a new tab shows before its real cwd is known.
    pub fn placeholder_directory(&self) -> String {
        self.default_directory
            .clone()
            .unwrap_or_else(|| self.platform.placeholder_directory().to_string())
    }
}
