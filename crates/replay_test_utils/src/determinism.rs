//! Output-tree determinism checks.
//!
//! A [`TreeSnapshot`] records every file under a dataset root with a content
//! hash and modification time. Comparing snapshots taken before and after a
//! second pipeline run shows whether anything was rewritten, and comparing
//! snapshots of two independent runs shows whether the output is
//! reproducible.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One file's fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    /// Hash of the file contents.
    pub hash: u64,
    /// Length in bytes.
    pub len: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Fingerprints of every file under a root, keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    files: BTreeMap<PathBuf, FileStamp>,
}

impl TreeSnapshot {
    /// Walk `root` and fingerprint every regular file.
    ///
    /// # Errors
    ///
    /// Returns any IO error hit while walking or reading.
    pub fn capture(root: &Path) -> io::Result<Self> {
        let mut files = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let meta = entry.metadata()?;
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let bytes = fs::read(&path)?;
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                files.insert(
                    relative,
                    FileStamp {
                        hash: compute_hash(&bytes),
                        len: meta.len(),
                        modified: meta.modified()?,
                    },
                );
            }
        }
        Ok(Self { files })
    }

    /// Relative paths of all files, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.files.keys().map(PathBuf::as_path).collect()
    }

    /// Fingerprint of one file.
    #[must_use]
    pub fn get(&self, relative: impl AsRef<Path>) -> Option<&FileStamp> {
        self.files.get(relative.as_ref())
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the tree holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files whose presence or contents differ between the snapshots.
    #[must_use]
    pub fn content_differences(&self, other: &Self) -> Vec<PathBuf> {
        let mut diffs: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(path, stamp)| {
                other
                    .files
                    .get(*path)
                    .map_or(true, |o| o.hash != stamp.hash || o.len != stamp.len)
            })
            .map(|(path, _)| path.clone())
            .collect();
        diffs.extend(
            other
                .files
                .keys()
                .filter(|path| !self.files.contains_key(*path))
                .cloned(),
        );
        diffs.sort();
        diffs
    }

    /// Assert both trees hold the same files with the same contents.
    ///
    /// # Panics
    ///
    /// Panics listing the differing files.
    pub fn assert_same_contents(&self, other: &Self) {
        let diffs = self.content_differences(other);
        assert!(
            diffs.is_empty(),
            "Output trees differ!\n\
             Files before: {}\n\
             Files after: {}\n\
             Differing: {:?}",
            self.files.len(),
            other.files.len(),
            diffs
        );
    }

    /// Assert `later` is this tree untouched: same files, contents and
    /// modification times.
    ///
    /// # Panics
    ///
    /// Panics listing the files that were added, removed or rewritten.
    pub fn assert_untouched(&self, later: &Self) {
        self.assert_same_contents(later);
        let rewritten: Vec<&PathBuf> = self
            .files
            .iter()
            .filter(|(path, stamp)| later.files.get(*path).map(|l| l.modified) != Some(stamp.modified))
            .map(|(path, _)| path)
            .collect();
        assert!(rewritten.is_empty(), "Files were rewritten: {rewritten:?}");
    }
}

/// Compute a hash of any hashable value.
#[must_use]
pub fn compute_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
