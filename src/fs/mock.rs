// src/fs/mock.rs

use super::{normalize, Clock, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Virtual time the mock starts at, so fresh files never have mtime 0.
pub const MOCK_EPOCH: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, mtime: u64 },
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    read_only: HashSet<PathBuf>,
    now: u64,
}

/// In-memory filesystem with a virtual clock.
///
/// Every write stamps the file with the current virtual time, so tests
/// drive mtimes with [`MockFileSystem::advance`] instead of sleeping. The
/// same value implements [`Clock`], which keeps commit timestamps and file
/// mtimes on one timeline.
///
/// Entries are keyed by their normalized path, so `/w/sub/../a.txt` and
/// `/w/a.txt` name the same file.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Ensure root exists
        entries.insert(PathBuf::from("."), MockEntry::Dir);
        entries.insert(PathBuf::from("/"), MockEntry::Dir);

        Self {
            state: Arc::new(Mutex::new(MockState {
                entries,
                read_only: HashSet::new(),
                now: MOCK_EPOCH,
            })),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        let mtime = state.now;
        Self::insert_file(&mut state, &normalize(path.as_ref()), content.into(), mtime);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        Self::ensure_dir_entry(&mut state.entries, &normalize(path.as_ref()));
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.entries.remove(&normalize(path.as_ref()));
    }

    /// Override a file's mtime. No-op for unknown paths and directories.
    pub fn set_mtime(&self, path: impl AsRef<Path>, secs: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(MockEntry::File { mtime, .. }) = state.entries.get_mut(&normalize(path.as_ref())) {
            *mtime = secs;
        }
    }

    pub fn mtime(&self, path: impl AsRef<Path>) -> Option<u64> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path.as_ref())) {
            Some(MockEntry::File { mtime, .. }) => Some(*mtime),
            _ => None,
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, secs: u64) {
        let mut state = self.state.lock().unwrap();
        state.now += secs;
    }

    /// Make every later write to `path` fail.
    pub fn deny_writes(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.read_only.insert(normalize(path.as_ref()));
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path.as_ref())) {
            Some(MockEntry::File { content, .. }) => {
                Some(String::from_utf8_lossy(content).into_owned())
            }
            _ => None,
        }
    }

    fn insert_file(state: &mut MockState, path: &Path, content: Vec<u8>, mtime: u64) {
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            Self::ensure_dir_entry(&mut state.entries, parent);
        }
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::File { content, mtime });
    }

    fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if entries.contains_key(path) {
            return;
        }
        entries.insert(path.to_path_buf(), MockEntry::Dir);
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            if parent != path {
                Self::ensure_dir_entry(entries, parent);
            }
        }
    }

    fn file_meta(&self, path: &Path) -> Result<(u64, u64)> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path)) {
            Some(MockEntry::File { content, mtime }) => Ok((content.len() as u64, *mtime)),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path)) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        if state.read_only.contains(&path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        if matches!(state.entries.get(&path), Some(MockEntry::Dir)) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        let mtime = state.now;
        Self::insert_file(&mut state, &path, contents.to_vec(), mtime);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.entries.contains_key(&normalize(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.entries.get(&normalize(path)), Some(MockEntry::File { .. }))
    }

    fn size(&self, path: &Path) -> Result<u64> {
        self.file_meta(path).map(|(size, _)| size)
    }

    fn modified_secs(&self, path: &Path) -> Result<u64> {
        self.file_meta(path).map(|(_, mtime)| mtime)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        // No working directory in the mock; relative paths stay relative.
        normalize(path)
    }
}

impl Clock for MockFileSystem {
    fn now_secs(&self) -> u64 {
        self.state.lock().unwrap().now
    }
}
