use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectorySource {
    Placeholder,
    Resolved,
    Changed,
}

/// Last known working directory of one session.
#[derive(Debug, Clone)]
pub struct DirectoryTracker {
    current: String,
    source: DirectorySource,
}

impl DirectoryTracker {
    pub fn placeholder(path: impl Into<String>) -> Self {
        Self {
            current: path.into(),
            source: DirectorySource::Placeholder,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn source(&self) -> DirectorySource {
        self.source
    }

    /// Applies the bootstrap lookup. Ignored once a `cd` has already moved the
    /// session, so a slow lookup cannot undo it. Returns whether it was applied.
    pub fn apply_initial(&mut self, path: String) -> bool {
        if self.source != DirectorySource::Placeholder {
            return false;
        }
        self.current = path;
        self.source = DirectorySource::Resolved;
        true
    }

    pub fn apply_change(&mut self, path: String) {
        self.current = path;
        self.source = DirectorySource::Changed;
    }
}
