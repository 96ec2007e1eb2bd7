use crate::config::Config;
use crate::session::SessionId;
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

/// Append-only record of dispatched command lines, rotated by size.
#[derive(Debug)]
pub struct CommandLogger {
    log_file_path: PathBuf,
    max_size_bytes: u64,
    // Held across rotate and append so concurrent sessions write one entry at a time.
    write_lock: Mutex<()>,
}

impl CommandLogger {
    /// Returns `None` unless `COMMAND_LOG_FILE` is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let log_file_path = config.command_log_file.clone()?;
        if let Some(parent_dir) = log_file_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                if let Err(e) = std::fs::create_dir_all(parent_dir) {
                    error!(path = %parent_dir.display(), error = %e, "Failed to create command log directory");
                }
            }
        }
        Some(Self {
            log_file_path,
            max_size_bytes: config.command_log_max_size_bytes,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_file_path
    }

    async fn rotate_log_if_needed(&self) -> Result<()> {
        if !self.log_file_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_file_path).await?;
        if metadata.len() >= self.max_size_bytes {
            let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
            let file_stem = self
                .log_file_path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy();
            let extension = self
                .log_file_path
                .extension()
                .unwrap_or_default()
                .to_string_lossy();

            let backup_file_name = format!("{}_{}.{}", file_stem, timestamp, extension);
            let backup_path = self.log_file_path.with_file_name(backup_file_name);

            fs::rename(&self.log_file_path, backup_path).await?;
        }
        Ok(())
    }

    pub async fn log_command(&self, session_id: SessionId, working_dir: &str, input: &str) {
        if let Err(e) = self.try_log_command(session_id, working_dir, input).await {
            error!(session_id = %session_id, error = %e, "Failed to write command log");
        }
    }

    async fn try_log_command(&self, session_id: SessionId, working_dir: &str, input: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.rotate_log_if_needed().await?;

        let timestamp = Utc::now().to_rfc3339();
        // One entry per line; the input itself is JSON-quoted so embedded newlines stay escaped.
        let log_entry = format!(
            "{} | {} | {} | {}\n",
            timestamp,
            session_id,
            working_dir,
            serde_json::to_string(input)?
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .await?;

        file.write_all(log_entry.as_bytes()).await?;
        Ok(())
    }
}
