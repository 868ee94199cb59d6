//! Run-scoped record of files that have already been extracted.

use std::path::Path;

use crate::source::PathSet;

/// Every file passes through the ledger before it reaches an extractor,
/// so no file is extracted twice in one run.
#[derive(Debug, Default)]
pub struct ExtractionLedger {
    files: PathSet,
}

impl ExtractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `file`. Returns false if it was already recorded.
    pub fn insert(&mut self, file: &Path) -> bool {
        self.files.insert(file.to_path_buf())
    }

    pub fn contains(&self, file: &Path) -> bool {
        self.files.contains(file)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Recorded files, in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_once_only() {
        let mut ledger = ExtractionLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.insert(Path::new("/repo/a.ts")));
        assert!(ledger.insert(Path::new("/repo/b.ts")));
        assert!(!ledger.insert(Path::new("/repo/a.ts")));

        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(Path::new("/repo/b.ts")));
        assert!(!ledger.contains(Path::new("/repo/c.ts")));
        let order: Vec<&Path> = ledger.iter().collect();
        assert_eq!(order, vec![Path::new("/repo/a.ts"), Path::new("/repo/b.ts")]);
    }
}
