// src/engine/session.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::TargetConfig;
use crate::errors::Result;
use crate::fs::{normalize, Clock, FileSystem};
use crate::pipeline::{HandlerRegistry, InvocationReport, Pipeline};
use crate::store::{ChangeStore, CommitOutcome};
use crate::types::{FileGroup, ResultEntry};

/// Owns the change store for a run and drives pipeline invocations.
///
/// After every invocation the session commits the store, whatever the
/// invocation's outcome. The commit is a no-op when no handler consulted
/// the store, so the store is written exactly once per invocation that
/// touched it, and every group of one invocation sees the same baselines.
pub struct Session {
    fs: Arc<dyn FileSystem>,
    store: ChangeStore,
    registry: HandlerRegistry,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session with the built-in handlers registered.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        let store = ChangeStore::new(Arc::clone(&fs), clock, store_path);
        Self {
            fs,
            store,
            registry: HandlerRegistry::with_builtins(),
        }
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    pub fn store(&self) -> &ChangeStore {
        &self.store
    }

    /// Run `pipeline` over `groups`, then commit the store.
    ///
    /// A handler error wins over a commit error; the latter is only logged
    /// in that case.
    pub fn invoke(
        &mut self,
        pipeline: &Pipeline,
        groups: &[FileGroup],
        results: Option<&mut Vec<ResultEntry>>,
    ) -> Result<InvocationReport> {
        debug!(pipeline = %pipeline.name(), groups = groups.len(), "invocation started");
        let outcome = pipeline.run(self.fs.as_ref(), &mut self.store, groups, results);
        self.finalize(pipeline.name(), outcome)
    }

    /// Build and invoke the pipeline of a `[target.<name>]` section.
    ///
    /// Relative paths in the target's file groups are resolved against
    /// `root`. Results are collected when `files_array` is set.
    pub fn run_target(
        &mut self,
        name: &str,
        target: &TargetConfig,
        root: &Path,
    ) -> Result<InvocationReport> {
        let pipeline = Pipeline::from_target(name, target, &self.registry);
        let groups: Vec<FileGroup> = target
            .files
            .iter()
            .map(|group| resolve_group(root, group))
            .collect();

        let mut collected = Vec::new();
        let results = target.files_array.then_some(&mut collected);
        let report = self.invoke(&pipeline, &groups, results)?;

        if target.files_array {
            for entry in &collected {
                info!(target_name = %name, sources = ?entry.sources, dest = ?entry.dest, "processed group");
            }
        }
        Ok(report)
    }

    fn finalize(
        &mut self,
        name: &str,
        outcome: Result<InvocationReport>,
    ) -> Result<InvocationReport> {
        let committed = self.store.commit();
        if let Ok(CommitOutcome::Committed { tracked, pruned }) = &committed {
            debug!(pipeline = %name, tracked, pruned, "finalized change store");
        }

        match (outcome, committed) {
            (Ok(report), Ok(_)) => Ok(report),
            (Ok(_), Err(commit_err)) => Err(commit_err),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(commit_err)) => {
                error!(pipeline = %name, "{commit_err}");
                Err(err)
            }
        }
    }
}

/// Join relative paths of `group` onto `root` and collapse `.` and `..`.
pub fn resolve_group(root: &Path, group: &FileGroup) -> FileGroup {
    let resolve = |p: &str| -> String {
        let path = Path::new(p);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        normalize(&joined).to_string_lossy().into_owned()
    };
    FileGroup {
        sources: group.sources.iter().map(|s| resolve(s.as_str())).collect(),
        dest: group.dest.as_deref().map(resolve),
    }
}
