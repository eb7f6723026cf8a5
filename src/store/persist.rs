// src/store/persist.rs

//! On-disk form of the change store.
//!
//! The file is a flat JSON object mapping absolute path strings to baseline
//! timestamps in whole seconds:
//!
//! ```json
//! {"/work/src/a.js":1700000123,"/work/dist/out.js":1700000123}
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fs::FileSystem;

/// Default cache directory, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = ".taskhelper";

/// Relative path (from the cache directory) to the store file.
pub const STORE_FILE_PATH: &str = "task-helper/fileUpdates.json";

/// Baselines keyed by absolute path.
pub type Records = BTreeMap<String, u64>;

/// `<root>/<cache_dir>/task-helper/fileUpdates.json`
pub fn store_file_path(root: &Path, cache_dir: &Path) -> PathBuf {
    root.join(cache_dir).join(STORE_FILE_PATH)
}

/// Load all baselines. A missing or unparseable file yields an empty map.
pub fn load_records(fs: &dyn FileSystem, path: &Path) -> Records {
    if !fs.exists(path) {
        debug!(?path, "no change store on disk; starting empty");
        return Records::new();
    }

    let parsed = fs
        .read_to_string(path)
        .and_then(|raw| serde_json::from_str::<Records>(&raw).map_err(anyhow::Error::from));

    match parsed {
        Ok(records) => {
            debug!(?path, entries = records.len(), "loaded change store");
            records
        }
        Err(err) => {
            warn!(?path, "ignoring unreadable change store: {err:#}");
            Records::new()
        }
    }
}

/// Persist all baselines, replacing the previous file.
pub fn save_records(fs: &dyn FileSystem, path: &Path, records: &Records) -> Result<()> {
    let json = serde_json::to_string(records).context("serializing change store")?;
    fs.write(path, json.as_bytes())
}
