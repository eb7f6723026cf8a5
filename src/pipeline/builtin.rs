// src/pipeline/builtin.rs

//! Named built-in handlers and the registry that resolves names to them.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::pipeline::handler::{
    AllGroupsHandler, ContentHandler, GroupHandler, HandlerContext, HandlerSet, HandlerSpec,
    HandlerSpecs, SourceHandler, TaskHandler,
};
use crate::types::{Decision, HandlerClass};

/// Keeps a source only if its size is within `[min_size, max_size]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeFilter;

impl SourceHandler for SizeFilter {
    fn handle(
        &self,
        cx: &mut HandlerContext<'_>,
        src: &str,
        _dest: Option<&str>,
    ) -> Result<Decision> {
        let path = Path::new(src);
        if !cx.fs.exists(path) {
            return Ok(Decision::Drop);
        }
        let size = cx.fs.size(path)?;
        let min = cx.options.min_size;
        let max = cx.options.max_size;
        let within = min.is_none_or(|min| size >= min) && max.is_none_or(|max| size <= max);
        if !within {
            info!(src, size, ?min, ?max, "source size out of range; skipping");
        }
        Ok(Decision::keep_if(within))
    }
}

/// Keeps a group only if something in it changed.
///
/// | sources | dest | kept when |
/// |---|---|---|
/// | none | some | `dest` is new |
/// | none | none | never |
/// | any | none | any source is new |
/// | one, same file as `dest` | some | `dest` is new |
/// | one or more | some | any source is strictly newer than `dest` |
#[derive(Debug, Clone, Copy, Default)]
pub struct NewFile;

impl GroupHandler for NewFile {
    fn handle(
        &self,
        cx: &mut HandlerContext<'_>,
        sources: &[String],
        dest: Option<&str>,
    ) -> Result<Decision> {
        let offset = cx.options.mtime_offset;
        let keep = match (sources, dest) {
            ([], Some(dest)) => cx.store.is_new(Path::new(dest), offset),
            ([], None) => false,
            (_, None) => sources
                .iter()
                .any(|src| cx.store.is_new(Path::new(src), offset)),
            ([src], Some(dest)) if same_file(cx, src, dest) => {
                cx.store.is_new(Path::new(dest), offset)
            }
            (_, Some(dest)) => sources.iter().any(|src| {
                cx.store.compare(Path::new(src), Path::new(dest)) == Ordering::Greater
            }),
        };
        debug!(?sources, ?dest, keep, "newFile decision");
        Ok(Decision::keep_if(keep))
    }
}

fn same_file(cx: &HandlerContext<'_>, a: &str, b: &str) -> bool {
    cx.fs.absolute(Path::new(a)) == cx.fs.absolute(Path::new(b))
}

/// Passes content through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ContentHandler for Identity {
    fn handle(&self, _cx: &mut HandlerContext<'_>, _content: &str) -> Result<Decision> {
        Ok(Decision::Keep)
    }
}

/// Named handlers per class.
///
/// A name only resolves within its own class: `size` as a by-group handler
/// is treated like any other unknown name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_task: HashMap<String, Arc<dyn TaskHandler>>,
    by_source: HashMap<String, Arc<dyn SourceHandler>>,
    by_group: HashMap<String, Arc<dyn GroupHandler>>,
    by_content: HashMap<String, Arc<dyn ContentHandler>>,
    by_all_groups: HashMap<String, Arc<dyn AllGroupsHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("by_task", &self.by_task.keys().collect::<Vec<_>>())
            .field("by_source", &self.by_source.keys().collect::<Vec<_>>())
            .field("by_group", &self.by_group.keys().collect::<Vec<_>>())
            .field("by_content", &self.by_content.keys().collect::<Vec<_>>())
            .field("by_all_groups", &self.by_all_groups.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Empty registry with no built-ins.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `size`, `newFile` and `identity`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_source("size", SizeFilter);
        registry.register_group("newFile", NewFile);
        registry.register_content("identity", Identity);
        registry
    }

    pub fn register_task(&mut self, name: &str, handler: impl TaskHandler + 'static) {
        self.by_task.insert(name.to_string(), Arc::new(handler));
    }

    pub fn register_source(&mut self, name: &str, handler: impl SourceHandler + 'static) {
        self.by_source.insert(name.to_string(), Arc::new(handler));
    }

    pub fn register_group(&mut self, name: &str, handler: impl GroupHandler + 'static) {
        self.by_group.insert(name.to_string(), Arc::new(handler));
    }

    pub fn register_content(&mut self, name: &str, handler: impl ContentHandler + 'static) {
        self.by_content.insert(name.to_string(), Arc::new(handler));
    }

    pub fn register_all_groups(&mut self, name: &str, handler: impl AllGroupsHandler + 'static) {
        self.by_all_groups.insert(name.to_string(), Arc::new(handler));
    }

    /// Whether `name` is a built-in of `class`.
    pub fn contains(&self, class: HandlerClass, name: &str) -> bool {
        match class {
            HandlerClass::ByTask => self.by_task.contains_key(name),
            HandlerClass::BySource => self.by_source.contains_key(name),
            HandlerClass::ByGroup => self.by_group.contains_key(name),
            HandlerClass::ByContent => self.by_content.contains_key(name),
            HandlerClass::ByAllGroups => self.by_all_groups.contains_key(name),
        }
    }

    /// Turn configured specs into callables, dropping unknown names.
    pub fn resolve(&self, specs: &HandlerSpecs) -> HandlerSet {
        HandlerSet {
            by_task: resolve_class(HandlerClass::ByTask, &specs.by_task, &self.by_task),
            by_source: resolve_class(HandlerClass::BySource, &specs.by_source, &self.by_source),
            by_group: resolve_class(HandlerClass::ByGroup, &specs.by_group, &self.by_group),
            by_content: resolve_class(
                HandlerClass::ByContent,
                &specs.by_content,
                &self.by_content,
            ),
            by_all_groups: resolve_class(
                HandlerClass::ByAllGroups,
                &specs.by_all_groups,
                &self.by_all_groups,
            ),
        }
    }
}

fn resolve_class<H: ?Sized>(
    class: HandlerClass,
    specs: &[HandlerSpec<H>],
    builtins: &HashMap<String, Arc<H>>,
) -> Vec<Arc<H>> {
    specs
        .iter()
        .filter_map(|spec| match spec {
            HandlerSpec::Custom(handler) => Some(Arc::clone(handler)),
            HandlerSpec::Builtin(name) => {
                let found = builtins.get(name).cloned();
                if found.is_none() {
                    debug!(%class, name = %name, "ignoring unknown handler");
                }
                found
            }
        })
        .collect()
}
