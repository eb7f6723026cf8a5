// src/store/mod.rs

//! Modification-time baselines for change detection.
//!
//! A [`ChangeStore`] remembers, per absolute path, the time the file was last
//! committed. A file is "new" when its current mtime is strictly greater than
//! that baseline. Baselines only move on [`ChangeStore::commit`], which the
//! session runs once after each invocation, so every group processed by one
//! invocation sees the same snapshot.

pub mod persist;

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{Result, TaskHelperError};
use crate::fs::{Clock, FileSystem};

pub use persist::{store_file_path, Records, DEFAULT_CACHE_DIR, STORE_FILE_PATH};

/// Grace period added to commit timestamps unless the first caller of a run
/// asks for something else.
pub const DEFAULT_MTIME_OFFSET: u64 = 3;

/// What [`ChangeStore::commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing queried the store this run; no I/O happened.
    Skipped,
    Committed {
        /// Entries written to disk.
        tracked: usize,
        /// Entries dropped because their file vanished.
        pruned: usize,
    },
}

/// Lazily loaded state of one run.
#[derive(Debug)]
struct Loaded {
    records: Records,
    offset: u64,
}

pub struct ChangeStore {
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    path: PathBuf,
    loaded: Option<Loaded>,
}

impl fmt::Debug for ChangeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStore")
            .field("path", &self.path)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl ChangeStore {
    pub fn new(fs: Arc<dyn FileSystem>, clock: Arc<dyn Clock>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            clock,
            path: path.into(),
            loaded: None,
        }
    }

    /// Location of the persisted JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether anything queried the store since the last commit.
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Offset fixed for the current run, if loaded.
    pub fn offset(&self) -> Option<u64> {
        self.loaded.as_ref().map(|l| l.offset)
    }

    /// Baseline currently held for `path`, without loading or inserting.
    pub fn baseline(&self, path: &Path) -> Option<u64> {
        let key = self.key(path);
        self.loaded.as_ref()?.records.get(&key).copied()
    }

    /// `true` iff the file's mtime is strictly greater than its baseline.
    ///
    /// The first query of a run loads the store and fixes the commit offset
    /// to `mtime_offset` (or [`DEFAULT_MTIME_OFFSET`]). Unknown paths are
    /// inserted with baseline 0, so any existing file is new the first time
    /// it is seen. Missing files have mtime 0 and are never new.
    pub fn is_new(&mut self, path: &Path, mtime_offset: Option<u64>) -> bool {
        let mtime = self.mtime_of(path);
        let baseline = self.query(path, mtime_offset);
        debug!(?path, mtime, baseline, "is_new");
        mtime > baseline
    }

    /// Order two files by their current mtimes. Missing files count as 0.
    ///
    /// Baselines are not consulted and the store is not loaded.
    pub fn compare(&self, a: &Path, b: &Path) -> Ordering {
        self.mtime_of(a).cmp(&self.mtime_of(b))
    }

    /// Stamp every tracked, still-existing path with `now + offset`, drop
    /// vanished paths, write the file and reset to "not loaded".
    ///
    /// A store that was never loaded this run is left untouched.
    pub fn commit(&mut self) -> Result<CommitOutcome> {
        let Some(loaded) = self.loaded.as_mut() else {
            debug!("change store not loaded this run; nothing to commit");
            return Ok(CommitOutcome::Skipped);
        };

        // The real mtime can't be used: files may still be rewritten later
        // in this run, which the offset absorbs.
        let stamp = self.clock.now_secs().saturating_add(loaded.offset);

        let before = loaded.records.len();
        let fs = &self.fs;
        loaded.records.retain(|path, _| fs.exists(Path::new(path)));
        for baseline in loaded.records.values_mut() {
            *baseline = stamp;
        }
        let tracked = loaded.records.len();
        let pruned = before - tracked;

        persist::save_records(self.fs.as_ref(), &self.path, &loaded.records).map_err(
            |source| TaskHelperError::StoreWrite {
                path: self.path.clone(),
                source,
            },
        )?;

        info!(path = ?self.path, tracked, pruned, stamp, "committed change store");
        self.loaded = None;
        Ok(CommitOutcome::Committed { tracked, pruned })
    }

    fn query(&mut self, path: &Path, mtime_offset: Option<u64>) -> u64 {
        let key = self.key(path);
        let loaded = self.loaded.get_or_insert_with(|| {
            let offset = mtime_offset.unwrap_or(DEFAULT_MTIME_OFFSET);
            let records = persist::load_records(self.fs.as_ref(), &self.path);
            debug!(offset, entries = records.len(), "change store loaded");
            Loaded { records, offset }
        });
        *loaded.records.entry(key).or_insert(0)
    }

    fn key(&self, path: &Path) -> String {
        self.fs.absolute(path).to_string_lossy().into_owned()
    }

    fn mtime_of(&self, path: &Path) -> u64 {
        if !self.fs.exists(path) {
            return 0;
        }
        self.fs.modified_secs(path).unwrap_or(0)
    }
}
