//! Up/down recall over the commands submitted in one session.
//!
//! Down past the newest entry gives back the line that was being typed when
//! recall started, which is empty unless the user had begun composing one.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Fresh line, nothing submitted since the session started or since Down
    /// walked off the newest entry. Reported as index -1.
    Fresh,
    /// Resting just past the newest entry after a submission. Reported as `len`.
    Resting,
    Recalling(usize),
}

#[derive(Debug, Clone)]
pub struct HistoryNavigator {
    entries: Vec<String>,
    cursor: Cursor,
    // Line being composed when recall started; given back when Down leaves recall.
    draft: String,
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: Cursor::Fresh,
            draft: String::new(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position in `[-1, len]`: -1 and `len` both mean editing, anything in
    /// between is the entry being recalled.
    pub fn index(&self) -> isize {
        match self.cursor {
            Cursor::Fresh => -1,
            Cursor::Resting => self.entries.len() as isize,
            Cursor::Recalling(i) => i as isize,
        }
    }

    pub fn is_recalling(&self) -> bool {
        matches!(self.cursor, Cursor::Recalling(_))
    }

    /// Records a submitted, already trimmed command. Consecutive duplicates are
    /// dropped. The cursor always ends up resting past the newest entry.
    pub fn record(&mut self, command: &str) {
        if self.entries.last().map(String::as_str) != Some(command) {
            self.entries.push(command.to_string());
        }
        self.cursor = Cursor::Resting;
        self.draft.clear();
    }

    pub fn up(&mut self, pending: &mut String) {
        let next = match self.cursor {
            Cursor::Fresh | Cursor::Resting => {
                if self.entries.is_empty() {
                    return;
                }
                self.draft = std::mem::take(pending);
                self.entries.len() - 1
            }
            Cursor::Recalling(0) => return,
            Cursor::Recalling(i) => i - 1,
        };
        self.cursor = Cursor::Recalling(next);
        *pending = self.entries[next].clone();
    }

    pub fn down(&mut self, pending: &mut String) {
        let Cursor::Recalling(i) = self.cursor else {
            return;
        };
        if i + 1 >= self.entries.len() {
            self.cursor = Cursor::Fresh;
            *pending = std::mem::take(&mut self.draft);
        } else {
            self.cursor = Cursor::Recalling(i + 1);
            *pending = self.entries[i + 1].clone();
        }
    }
}
