// src/pipeline/mod.rs

//! The five-stage handler pipeline.
//!
//! One [`Pipeline::run`] is one invocation of a target:
//!
//! 1. by-task handlers decide whether anything runs at all;
//! 2. for each group, in order:
//!    - missing sources are dropped, the rest pass through by-source handlers,
//!    - by-group handlers may drop the group or rewrite its destination,
//!    - surviving groups are recorded as [`ResultEntry`]s,
//!    - by-content handlers transform the joined sources before the write;
//! 3. by-all-groups handlers see every recorded entry.
//!
//! `Drop`/`Abort` results are control flow, not errors. A handler `Err`
//! stops the invocation with [`TaskHelperError::HandlerFailed`].
//!
//! Committing the change store is not the pipeline's job; see
//! [`crate::engine::Session`].

pub mod builtin;
pub mod content;
pub mod handler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{TargetConfig, TargetOptions};
use crate::errors::{Result, TaskHelperError};
use crate::fs::FileSystem;
use crate::store::ChangeStore;
use crate::types::{Decision, FileGroup, Gate, HandlerClass, ResultEntry};

pub use builtin::HandlerRegistry;
pub use handler::{
    AllGroupsHandler, ContentHandler, GroupHandler, HandlerContext, HandlerSet, HandlerSpec,
    HandlerSpecs, SourceHandler, TaskHandler,
};

/// How an invocation ended (errors aside).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Every stage ran.
    Completed,
    /// Only by-task handlers were configured and nobody wants results.
    NothingToDo,
    /// A by-task handler returned [`Gate::Abort`]; no group was processed.
    AbortedByTask,
    /// A by-all-groups handler returned [`Gate::Abort`].
    AbortedByAllGroups,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    pub outcome: InvocationOutcome,
    /// Groups that survived with at least one source.
    pub results: Vec<ResultEntry>,
    /// Destinations written, in order.
    pub written: Vec<PathBuf>,
}

impl InvocationReport {
    fn empty(outcome: InvocationOutcome) -> Self {
        Self {
            outcome,
            results: Vec::new(),
            written: Vec::new(),
        }
    }
}

/// Resolved handlers plus options for one target.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    options: TargetOptions,
    handlers: HandlerSet,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Build the pipeline described by a `[target.<name>]` section.
    pub fn from_target(name: &str, target: &TargetConfig, registry: &HandlerRegistry) -> Self {
        Self::builder(name)
            .options(target.options.clone())
            .specs(target.handler_specs())
            .build(registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &TargetOptions {
        &self.options
    }

    pub fn handlers(&self) -> &HandlerSet {
        &self.handlers
    }

    /// Run one invocation over `groups`.
    ///
    /// When `external` is given, every recorded [`ResultEntry`] is also
    /// appended to it.
    pub fn run(
        &self,
        fs: &dyn FileSystem,
        store: &mut ChangeStore,
        groups: &[FileGroup],
        mut external: Option<&mut Vec<ResultEntry>>,
    ) -> Result<InvocationReport> {
        // Handlers may observe an auto-detected separator, so each
        // invocation works on its own copy of the options.
        let mut options = self.options.clone();

        for handler in &self.handlers.by_task {
            let mut cx = self.context(&options, fs, store);
            let gate = self.guard(HandlerClass::ByTask, handler.handle(&mut cx))?;
            if gate == Gate::Abort {
                warn!(pipeline = %self.name, "task aborted by handler_by_task");
                return Ok(InvocationReport::empty(InvocationOutcome::AbortedByTask));
            }
        }

        if self.handlers.touches_no_files() && external.is_none() {
            debug!(pipeline = %self.name, "no file handlers configured; nothing to do");
            return Ok(InvocationReport::empty(InvocationOutcome::NothingToDo));
        }

        let mut report = InvocationReport::empty(InvocationOutcome::Completed);

        for group in groups {
            let sources = self.filter_sources(fs, store, &options, group)?;

            let Some(dest) = self.filter_group(fs, store, &options, &sources, group)? else {
                continue;
            };

            if !sources.is_empty() {
                let entry = ResultEntry {
                    sources: sources.clone(),
                    dest: dest.clone(),
                };
                if let Some(external) = external.as_deref_mut() {
                    external.push(entry.clone());
                }
                report.results.push(entry);
            }

            if let Some(path) =
                self.write_content(fs, store, &mut options, &sources, dest.as_deref())?
            {
                report.written.push(path);
            }
        }

        for handler in &self.handlers.by_all_groups {
            let mut cx = self.context(&options, fs, store);
            let gate = self.guard(
                HandlerClass::ByAllGroups,
                handler.handle(&mut cx, &report.results),
            )?;
            if gate == Gate::Abort {
                warn!(pipeline = %self.name, "aborted by handler_by_all_files");
                report.outcome = InvocationOutcome::AbortedByAllGroups;
                return Ok(report);
            }
        }

        Ok(report)
    }

    /// Existing sources after all by-source handlers, in declared order.
    fn filter_sources(
        &self,
        fs: &dyn FileSystem,
        store: &mut ChangeStore,
        options: &TargetOptions,
        group: &FileGroup,
    ) -> Result<Vec<String>> {
        let mut kept = Vec::with_capacity(group.sources.len());

        'sources: for declared in &group.sources {
            if !fs.exists(Path::new(declared)) {
                warn!(pipeline = %self.name, "source file {:?} not found", declared);
                continue;
            }

            let mut src = declared.clone();
            for handler in &self.handlers.by_source {
                let mut cx = self.context(options, fs, store);
                let decision = self.guard(
                    HandlerClass::BySource,
                    handler.handle(&mut cx, &src, group.dest.as_deref()),
                )?;
                match decision {
                    Decision::Keep => {}
                    Decision::Replace(next) => {
                        debug!(from = %src, to = %next, "source rewritten");
                        src = next;
                    }
                    Decision::Drop => {
                        debug!(%src, "source dropped by handler_by_file_src");
                        continue 'sources;
                    }
                }
            }
            kept.push(src);
        }

        Ok(kept)
    }

    /// The group's (possibly rewritten) destination, or `None` if a by-group
    /// handler dropped the group.
    fn filter_group(
        &self,
        fs: &dyn FileSystem,
        store: &mut ChangeStore,
        options: &TargetOptions,
        sources: &[String],
        group: &FileGroup,
    ) -> Result<Option<Option<String>>> {
        let mut dest = group.dest.clone();

        for handler in &self.handlers.by_group {
            let mut cx = self.context(options, fs, store);
            let decision = self.guard(
                HandlerClass::ByGroup,
                handler.handle(&mut cx, sources, dest.as_deref()),
            )?;
            match decision {
                Decision::Keep => {}
                Decision::Replace(next) => dest = Some(next),
                Decision::Drop => {
                    debug!(?sources, ?dest, "group dropped by handler_by_file");
                    return Ok(None);
                }
            }
        }

        Ok(Some(dest))
    }

    /// Join sources, run by-content handlers and write `dest`.
    ///
    /// Returns the written path, or `None` when the group has nothing to
    /// write or a by-content handler dropped it.
    fn write_content(
        &self,
        fs: &dyn FileSystem,
        store: &mut ChangeStore,
        options: &mut TargetOptions,
        sources: &[String],
        dest: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let Some(dest) = dest.filter(|d| !d.is_empty()) else {
            return Ok(None);
        };
        if sources.is_empty() || self.handlers.by_content.is_empty() {
            return Ok(None);
        }

        let dest_path = Path::new(dest);
        // Missing, or a regular file once symlinks are followed.
        if fs.exists(dest_path) && !fs.is_file(dest_path) {
            warn!(pipeline = %self.name, "destination {:?} is not a regular file; skipping", dest);
            return Ok(None);
        }

        // Invalid UTF-8 is replaced with U+FFFD rather than failing the target.
        let contents = sources
            .iter()
            .map(|src| {
                fs.read(Path::new(src))
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        // Detected once per invocation; later groups reuse it.
        let separator = options
            .separator
            .get_or_insert_with(|| content::resolve_separator(None, &contents))
            .clone();
        let mut payload = contents.join(separator.as_str());

        for handler in &self.handlers.by_content {
            let mut cx = self.context(options, fs, store);
            match self.guard(HandlerClass::ByContent, handler.handle(&mut cx, &payload))? {
                Decision::Keep => {}
                Decision::Replace(next) => payload = next,
                Decision::Drop => {
                    warn!(pipeline = %self.name, "write of {:?} aborted by handler_by_content", dest);
                    return Ok(None);
                }
            }
        }

        fs.write(dest_path, payload.as_bytes())?;
        info!("File {:?} created.", dest);
        Ok(Some(dest_path.to_path_buf()))
    }

    fn context<'a>(
        &'a self,
        options: &'a TargetOptions,
        fs: &'a dyn FileSystem,
        store: &'a mut ChangeStore,
    ) -> HandlerContext<'a> {
        HandlerContext {
            target: &self.name,
            options,
            fs,
            store,
        }
    }

    /// Log a handler error and turn it into a fatal invocation error.
    fn guard<T>(&self, class: HandlerClass, result: anyhow::Result<T>) -> Result<T> {
        result.map_err(|source| {
            error!(pipeline = %self.name, %class, "handler failed: {source:#}");
            TaskHelperError::HandlerFailed {
                class,
                target: self.name.clone(),
                source,
            }
        })
    }
}

/// Builds a [`Pipeline`]; names are resolved against a registry in
/// [`PipelineBuilder::build`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    options: TargetOptions,
    specs: HandlerSpecs,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: TargetOptions::default(),
            specs: HandlerSpecs::default(),
        }
    }

    pub fn options(mut self, options: TargetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn separator(mut self, separator: &str) -> Self {
        self.options.separator = Some(separator.to_string());
        self
    }

    pub fn mtime_offset(mut self, secs: u64) -> Self {
        self.options.mtime_offset = Some(secs);
        self
    }

    pub fn size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.options.min_size = min;
        self.options.max_size = max;
        self
    }

    /// Append specs for every class, after the ones already configured.
    pub fn specs(mut self, specs: HandlerSpecs) -> Self {
        self.specs.by_task.extend(specs.by_task);
        self.specs.by_source.extend(specs.by_source);
        self.specs.by_group.extend(specs.by_group);
        self.specs.by_content.extend(specs.by_content);
        self.specs.by_all_groups.extend(specs.by_all_groups);
        self
    }

    /// Append a built-in by name. Unknown names are dropped at build time.
    pub fn builtin(mut self, class: HandlerClass, name: &str) -> Self {
        let name = name.to_string();
        match class {
            HandlerClass::ByTask => self.specs.by_task.push(HandlerSpec::Builtin(name)),
            HandlerClass::BySource => self.specs.by_source.push(HandlerSpec::Builtin(name)),
            HandlerClass::ByGroup => self.specs.by_group.push(HandlerSpec::Builtin(name)),
            HandlerClass::ByContent => self.specs.by_content.push(HandlerSpec::Builtin(name)),
            HandlerClass::ByAllGroups => {
                self.specs.by_all_groups.push(HandlerSpec::Builtin(name))
            }
        }
        self
    }

    pub fn by_task<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> anyhow::Result<Gate> + 'static,
    {
        let handler: Arc<dyn TaskHandler> = Arc::new(f);
        self.specs.by_task.push(HandlerSpec::Custom(handler));
        self
    }

    pub fn by_source<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>, &str, Option<&str>) -> anyhow::Result<Decision> + 'static,
    {
        let handler: Arc<dyn SourceHandler> = Arc::new(f);
        self.specs.by_source.push(HandlerSpec::Custom(handler));
        self
    }

    pub fn by_group<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>, &[String], Option<&str>) -> anyhow::Result<Decision>
            + 'static,
    {
        let handler: Arc<dyn GroupHandler> = Arc::new(f);
        self.specs.by_group.push(HandlerSpec::Custom(handler));
        self
    }

    pub fn by_content<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>, &str) -> anyhow::Result<Decision> + 'static,
    {
        let handler: Arc<dyn ContentHandler> = Arc::new(f);
        self.specs.by_content.push(HandlerSpec::Custom(handler));
        self
    }

    pub fn by_all_groups<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>, &[ResultEntry]) -> anyhow::Result<Gate> + 'static,
    {
        let handler: Arc<dyn AllGroupsHandler> = Arc::new(f);
        self.specs.by_all_groups.push(HandlerSpec::Custom(handler));
        self
    }

    pub fn build(self, registry: &HandlerRegistry) -> Pipeline {
        Pipeline {
            name: self.name,
            options: self.options,
            handlers: registry.resolve(&self.specs),
        }
    }
}
