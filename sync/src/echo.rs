//! Single-shot suppression of the engine's own writes in two-way mode

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Table of destination paths the engine is about to write.
///
/// In two-way mode every mirrored write lands under a watched root and comes
/// back as a change event from the reciprocal watch. Marking the destination
/// before writing lets the engine recognise and drop that echo exactly once.
///
/// An external edit to the same destination that arrives between `mark` and
/// the echo is indistinguishable from the echo and is swallowed. Contents are
/// not compared.
#[derive(Debug, Default)]
pub struct EchoSuppressor {
    pending: HashSet<PathBuf>,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a destination path about to receive an engine-initiated write
    pub fn mark(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!("Suppressing next event for {}", path.display());
        self.pending.insert(path);
    }

    /// Remove the entry for `path`, returning whether it was present
    pub fn consume(&mut self, path: &Path) -> bool {
        self.pending.remove(path)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_is_consumed_once() {
        let mut suppressor = EchoSuppressor::new();
        let path = PathBuf::from("/b/x.txt");

        suppressor.mark(&path);
        assert!(suppressor.consume(&path));
        assert!(!suppressor.consume(&path));
        assert!(suppressor.is_empty());
    }

    #[test]
    fn test_unmarked_path_is_not_consumed() {
        let mut suppressor = EchoSuppressor::new();
        suppressor.mark("/b/x.txt");

        assert!(!suppressor.consume(Path::new("/a/x.txt")));
        assert_eq!(suppressor.len(), 1);
    }

    #[test]
    fn test_marking_twice_keeps_a_single_entry() {
        let mut suppressor = EchoSuppressor::new();
        suppressor.mark("/b/x.txt");
        suppressor.mark("/b/x.txt");

        assert!(suppressor.consume(Path::new("/b/x.txt")));
        assert!(!suppressor.consume(Path::new("/b/x.txt")));
    }

    #[test]
    fn test_clear() {
        let mut suppressor = EchoSuppressor::new();
        suppressor.mark("/b/one");
        suppressor.mark("/b/two");
        suppressor.clear();

        assert!(suppressor.is_empty());
        assert!(!suppressor.consume(Path::new("/b/one")));
    }
}
