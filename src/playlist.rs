use std::path::{Path, PathBuf};

/// Ordered file list with a cursor. `cursor` is `None` exactly when the list
/// is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    entries: Vec<PathBuf>,
    cursor: Option<usize>,
}

impl Playlist {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        let cursor = (!entries.is_empty()).then_some(0);
        Self { entries, cursor }
    }

    pub fn single(path: &Path) -> Self {
        Self::new(vec![path.to_path_buf()])
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Path> {
        self.entries.get(self.cursor?).map(PathBuf::as_path)
    }

    /// Moves forward one entry; `None` at the last entry.
    pub fn next(&mut self) -> Option<PathBuf> {
        let target = self.cursor?.checked_add(1)?;
        self.select(target)
    }

    /// Moves back one entry; `None` at the first entry.
    pub fn previous(&mut self) -> Option<PathBuf> {
        let target = self.cursor?.checked_sub(1)?;
        self.select(target)
    }

    pub fn select(&mut self, index: usize) -> Option<PathBuf> {
        let path = self.entries.get(index)?.clone();
        self.cursor = Some(index);
        Some(path)
    }
}
