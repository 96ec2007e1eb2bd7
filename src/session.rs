use crate::collaborators::DirectoryChange;
use crate::directory::{DirectorySource, DirectoryTracker};
use crate::error::AppError;
use crate::history::HistoryNavigator;
use crate::router::{classify, Dispatch, HostPlatform};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type SessionId = Uuid;

const EXECUTE_FAILURE_PREFIX: &str = "Failed to execute command";
const CHANGE_DIRECTORY_FAILURE_PREFIX: &str = "Failed to change directory";

/// Work handed out by [`Session::submit`]; the caller runs it and feeds the
/// result back through [`Session::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDispatch {
    pub session_id: SessionId,
    pub input: String,
    pub working_dir: String,
    pub dispatch: Dispatch,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Cleared,
    DirectoryChanged(Result<DirectoryChange, AppError>),
    Executed(Result<String, AppError>),
}

/// One tab's state.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    directory: DirectoryTracker,
    output_log: Vec<String>,
    history: HistoryNavigator,
    pending_input: String,
    is_busy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub current_directory: String,
    pub directory_source: DirectorySource,
    pub output_log: Vec<String>,
    pub command_history: Vec<String>,
    pub history_index: isize,
    pub pending_input: String,
    pub is_busy: bool,
}

impl Session {
    pub fn new(placeholder_directory: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            directory: DirectoryTracker::placeholder(placeholder_directory),
            output_log: Vec::new(),
            history: HistoryNavigator::new(),
            pending_input: String::new(),
            is_busy: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn current_directory(&self) -> &str {
        self.directory.current()
    }

    pub fn output_log(&self) -> &[String] {
        &self.output_log
    }

    pub fn history(&self) -> &HistoryNavigator {
        &self.history
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    pub fn apply_initial_directory(&mut self, path: String) -> bool {
        self.directory.apply_initial(path)
    }

    /// Input edits are ignored while a dispatch is in flight; the line is
    /// cleared when it completes anyway.
    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        if self.is_busy {
            return;
        }
        self.pending_input = text.into();
    }

    pub fn history_up(&mut self) {
        if !self.is_busy {
            self.history.up(&mut self.pending_input);
        }
    }

    pub fn history_down(&mut self) {
        if !self.is_busy {
            self.history.down(&mut self.pending_input);
        }
    }

    /// Accepts `raw` for dispatch. Returns `None` without touching any state if
    /// the session is busy or the line is blank.
    pub fn submit(&mut self, raw: &str, platform: HostPlatform) -> Option<PendingDispatch> {
        let trimmed = raw.trim();
        if self.is_busy || trimmed.is_empty() {
            return None;
        }

        self.history.record(trimmed);
        self.output_log.push(format!("{}> {}", self.directory.current(), raw));
        self.is_busy = true;
        self.pending_input.clear();

        Some(PendingDispatch {
            session_id: self.id,
            input: raw.to_string(),
            working_dir: self.directory.current().to_string(),
            dispatch: classify(raw, platform),
        })
    }

    pub fn submit_pending(&mut self, platform: HostPlatform) -> Option<PendingDispatch> {
        let raw = self.pending_input.clone();
        self.submit(&raw, platform)
    }

    pub fn complete(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Cleared => self.output_log.clear(),
            DispatchOutcome::DirectoryChanged(Ok(change)) => {
                self.directory.apply_change(change.path);
                if let Some(message) = change.message.filter(|m| !m.trim().is_empty()) {
                    self.output_log.push(message);
                }
            }
            DispatchOutcome::DirectoryChanged(Err(e)) => {
                self.output_log
                    .push(format!("{}: {}", CHANGE_DIRECTORY_FAILURE_PREFIX, e.detail()));
            }
            DispatchOutcome::Executed(Ok(text)) => {
                if !text.trim().is_empty() {
                    self.output_log.push(text);
                }
            }
            DispatchOutcome::Executed(Err(e)) => {
                self.output_log.push(format!("{}: {}", EXECUTE_FAILURE_PREFIX, e.detail()));
            }
        }
        self.is_busy = false;
        self.pending_input.clear();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            current_directory: self.directory.current().to_string(),
            directory_source: self.directory.source(),
            output_log: self.output_log.clone(),
            command_history: self.history.entries().to_vec(),
            history_index: self.history.index(),
            pending_input: self.pending_input.clone(),
            is_busy: self.is_busy,
        }
    }
}
