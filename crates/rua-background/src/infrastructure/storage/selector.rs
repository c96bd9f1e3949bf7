//! File-backed selector cache.
//!
//! The hint is a single word, `sync` or `local`, in a plain text file.  A
//! missing or unreadable file means "no hint".  Write failures are logged:
//! the next successful save writes the hint again.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::application::persistent_store::{SelectorCache, StorageArea};

/// File name used inside the data directory.
pub const SELECTOR_FILE: &str = "selector";

/// A [`SelectorCache`] persisted as a one-line text file.
#[derive(Debug, Clone)]
pub struct FileSelector {
    path: PathBuf,
}

impl FileSelector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Selector stored at `<dir>/selector`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SELECTOR_FILE))
    }
}

impl SelectorCache for FileSelector {
    fn get(&self) -> Option<StorageArea> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        match text.parse() {
            Ok(area) => Some(area),
            Err(e) => {
                warn!("ignoring selector hint in {}: {e}", self.path.display());
                None
            }
        }
    }

    fn set(&self, area: StorageArea) {
        if let Some(dir) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("cannot create {}: {e}", dir.display());
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, area.as_str()) {
            warn!("cannot write selector hint {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_means_no_hint() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileSelector::in_dir(dir.path()).get(), None);
    }

    #[test]
    fn test_hint_survives_new_instance() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        FileSelector::in_dir(dir.path()).set(StorageArea::Sync);

        // Act
        let hint = FileSelector::in_dir(dir.path()).get();

        // Assert
        assert_eq!(hint, Some(StorageArea::Sync));
    }

    #[test]
    fn test_garbage_hint_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SELECTOR_FILE), "cloud").unwrap();
        assert_eq!(FileSelector::in_dir(dir.path()).get(), None);
    }
}
