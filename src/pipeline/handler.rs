// src/pipeline/handler.rs

//! Handler traits, one per class.
//!
//! Every trait has a blanket implementation for plain closures, so callers
//! can register `|cx, src, dest| Ok(Decision::Keep)` directly.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::config::TargetOptions;
use crate::fs::FileSystem;
use crate::store::ChangeStore;
use crate::types::{Decision, Gate, ResultEntry};

/// Everything a handler may look at or consult during an invocation.
pub struct HandlerContext<'a> {
    /// Name of the target being processed.
    pub target: &'a str,
    /// Effective options, including an auto-detected `separator`.
    pub options: &'a TargetOptions,
    pub fs: &'a dyn FileSystem,
    pub store: &'a mut ChangeStore,
}

impl fmt::Debug for HandlerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Decides whether the invocation runs at all.
pub trait TaskHandler {
    fn handle(&self, cx: &mut HandlerContext<'_>) -> Result<Gate>;
}

/// Filters or rewrites one source path.
pub trait SourceHandler {
    fn handle(&self, cx: &mut HandlerContext<'_>, src: &str, dest: Option<&str>)
        -> Result<Decision>;
}

/// Filters a whole group or rewrites its destination.
pub trait GroupHandler {
    fn handle(
        &self,
        cx: &mut HandlerContext<'_>,
        sources: &[String],
        dest: Option<&str>,
    ) -> Result<Decision>;
}

/// Transforms the concatenated content before it is written.
pub trait ContentHandler {
    fn handle(&self, cx: &mut HandlerContext<'_>, content: &str) -> Result<Decision>;
}

/// Reacts to the groups that were actually processed.
pub trait AllGroupsHandler {
    fn handle(&self, cx: &mut HandlerContext<'_>, results: &[ResultEntry]) -> Result<Gate>;
}

impl<F> TaskHandler for F
where
    F: Fn(&mut HandlerContext<'_>) -> Result<Gate>,
{
    fn handle(&self, cx: &mut HandlerContext<'_>) -> Result<Gate> {
        self(cx)
    }
}

impl<F> SourceHandler for F
where
    F: Fn(&mut HandlerContext<'_>, &str, Option<&str>) -> Result<Decision>,
{
    fn handle(
        &self,
        cx: &mut HandlerContext<'_>,
        src: &str,
        dest: Option<&str>,
    ) -> Result<Decision> {
        self(cx, src, dest)
    }
}

impl<F> GroupHandler for F
where
    F: Fn(&mut HandlerContext<'_>, &[String], Option<&str>) -> Result<Decision>,
{
    fn handle(
        &self,
        cx: &mut HandlerContext<'_>,
        sources: &[String],
        dest: Option<&str>,
    ) -> Result<Decision> {
        self(cx, sources, dest)
    }
}

impl<F> ContentHandler for F
where
    F: Fn(&mut HandlerContext<'_>, &str) -> Result<Decision>,
{
    fn handle(&self, cx: &mut HandlerContext<'_>, content: &str) -> Result<Decision> {
        self(cx, content)
    }
}

impl<F> AllGroupsHandler for F
where
    F: Fn(&mut HandlerContext<'_>, &[ResultEntry]) -> Result<Gate>,
{
    fn handle(&self, cx: &mut HandlerContext<'_>, results: &[ResultEntry]) -> Result<Gate> {
        self(cx, results)
    }
}

/// A configured handler: either the name of a built-in or a callable.
pub enum HandlerSpec<H: ?Sized> {
    Builtin(String),
    Custom(Arc<H>),
}

impl<H: ?Sized> Clone for HandlerSpec<H> {
    fn clone(&self) -> Self {
        match self {
            HandlerSpec::Builtin(name) => HandlerSpec::Builtin(name.clone()),
            HandlerSpec::Custom(h) => HandlerSpec::Custom(Arc::clone(h)),
        }
    }
}

impl<H: ?Sized> fmt::Debug for HandlerSpec<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSpec::Builtin(name) => f.debug_tuple("Builtin").field(name).finish(),
            HandlerSpec::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Configured handlers for all five classes, before name resolution.
#[derive(Debug, Clone, Default)]
pub struct HandlerSpecs {
    pub by_task: Vec<HandlerSpec<dyn TaskHandler>>,
    pub by_source: Vec<HandlerSpec<dyn SourceHandler>>,
    pub by_group: Vec<HandlerSpec<dyn GroupHandler>>,
    pub by_content: Vec<HandlerSpec<dyn ContentHandler>>,
    pub by_all_groups: Vec<HandlerSpec<dyn AllGroupsHandler>>,
}

/// Resolved handlers for all five classes, in configured order.
#[derive(Clone, Default)]
pub struct HandlerSet {
    pub by_task: Vec<Arc<dyn TaskHandler>>,
    pub by_source: Vec<Arc<dyn SourceHandler>>,
    pub by_group: Vec<Arc<dyn GroupHandler>>,
    pub by_content: Vec<Arc<dyn ContentHandler>>,
    pub by_all_groups: Vec<Arc<dyn AllGroupsHandler>>,
}

impl HandlerSet {
    /// Only by-task handlers (or none) are configured.
    pub fn touches_no_files(&self) -> bool {
        self.by_source.is_empty()
            && self.by_group.is_empty()
            && self.by_content.is_empty()
            && self.by_all_groups.is_empty()
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("by_task", &self.by_task.len())
            .field("by_source", &self.by_source.len())
            .field("by_group", &self.by_group.len())
            .field("by_content", &self.by_content.len())
            .field("by_all_groups", &self.by_all_groups.len())
            .finish()
    }
}
