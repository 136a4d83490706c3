use std::collections::VecDeque;

/// Observations gathered during one run, shown back to the model as
/// "Recent notes" in the system message.
#[derive(Debug, Clone)]
pub struct Scratchpad {
    notes: VecDeque<String>,
    keep: usize,
    show: usize,
}

impl Scratchpad {
    pub const DEFAULT_KEEP: usize = 1000;
    pub const DEFAULT_SHOW: usize = 6;

    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_KEEP, Self::DEFAULT_SHOW)
    }

    pub fn with_limits(keep: usize, show: usize) -> Self {
        Self {
            notes: VecDeque::new(),
            keep: keep.max(1),
            show,
        }
    }

    pub fn add(&mut self, note: impl Into<String>) {
        self.notes.push_back(note.into());
        while self.notes.len() > self.keep {
            self.notes.pop_front();
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.notes.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The newest `show` notes, oldest first, separated by `---` lines.
    pub fn render(&self) -> String {
        if self.notes.is_empty() {
            return "(no prior observations)".into();
        }
        let skip = self.notes.len().saturating_sub(self.show);
        self.notes
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

impl Default for Scratchpad {
    fn default() -> Self {
        Self::new()
    }
}
