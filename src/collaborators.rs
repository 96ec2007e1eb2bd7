use crate::error::AppError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio as StdProcessStdio;
use tokio::process::Command as TokioCommand;
use tracing::{debug, error, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChange {
    pub path: String,
    /// Informational line to show in the tab alongside the change, if any.
    pub message: Option<String>,
}

#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Runs `program` to completion in `working_dir` and returns its captured output.
    async fn execute(&self, program: &str, args: &[String], working_dir: &str) -> Result<String, AppError>;
}

#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    async fn current_directory(&self) -> Result<String, AppError>;

    /// Resolves `requested` against `context_cwd`, the requesting session's directory.
    async fn change_directory(&self, requested: &str, context_cwd: &str) -> Result<DirectoryChange, AppError>;
}

#[derive(Debug, Default, Clone)]
pub struct SystemExecutor;

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    #[instrument(skip(self, args), fields(argc = args.len()))]
    async fn execute(&self, program: &str, args: &[String], working_dir: &str) -> Result<String, AppError> {
        let mut command = TokioCommand::new(program);
        command.args(args);
        command.current_dir(working_dir);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command.stdin(StdProcessStdio::null());
        command.stdout(StdProcessStdio::piped());
        command.stderr(StdProcessStdio::piped());
        command.kill_on_drop(true);

        debug!(program = %program, working_dir = %working_dir, "Spawning command");
        let output = command.output().await.map_err(|e| {
            error!(error = %e, program = %program, "Failed to run command");
            AppError::ProcessSpawn(e.to_string())
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(exit_code = ?output.status.code(), stdout_len = stdout.len(), stderr_len = stderr.len(), "Command finished");

        Ok(combine_output(&stdout, &stderr))
    }
}

fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) if stdout.ends_with('\n') => format!("{}{}", stdout, stderr),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}

/// Resolves directories against the real filesystem without touching the
/// process-wide working directory, so each tab keeps its own.
#[derive(Debug, Default, Clone)]
pub struct FsDirectoryResolver;

#[async_trait]
impl DirectoryResolver for FsDirectoryResolver {
    async fn current_directory(&self) -> Result<String, AppError> {
        let cwd = std::env::current_dir().map_err(|e| AppError::DirectoryResolution(e.to_string()))?;
        Ok(cwd.to_string_lossy().to_string())
    }

    #[instrument(skip(self))]
    async fn change_directory(&self, requested: &str, context_cwd: &str) -> Result<DirectoryChange, AppError> {
        let target = resolve_requested(requested, Path::new(context_cwd))?;

        let canonical = match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => dunce::canonicalize(&target).unwrap_or(target),
            Ok(_) => {
                return Err(AppError::DirectoryChange(format!(
                    "{} is not a directory",
                    target.display()
                )))
            }
            Err(e) => {
                return Err(AppError::DirectoryChange(format!("{}: {}", target.display(), e)));
            }
        };

        debug!(path = %canonical.display(), "Directory change resolved");
        Ok(DirectoryChange {
            path: canonical.to_string_lossy().to_string(),
            message: None,
        })
    }
}

fn is_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() > 1 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn resolve_requested(requested: &str, context_cwd: &Path) -> Result<PathBuf, AppError> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Err(AppError::InvalidInputArgument("empty directory".to_string()));
    }

    let expanded = shellexpand::tilde(requested);
    let expanded_path = PathBuf::from(expanded.as_ref());

    let absolute = if expanded_path.is_absolute() || expanded.starts_with('/') || is_drive_path(&expanded) {
        expanded_path
    } else {
        context_cwd.join(expanded_path)
    };

    Ok(normalize_lexically(&absolute))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
                // `..` above the root stays at the root.
            }
            _ => components.push(component),
        }
    }
    components.iter().collect()
}
