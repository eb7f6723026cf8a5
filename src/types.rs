use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// The five handler classes, in the order an invocation runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerClass {
    /// Runs once per invocation, before any group.
    ByTask,
    /// Runs once per existing source path.
    BySource,
    /// Runs once per group, on the filtered sources and the destination.
    ByGroup,
    /// Runs on the concatenated content before it is written.
    ByContent,
    /// Runs once after all groups, on the collected results.
    ByAllGroups,
}

impl HandlerClass {
    pub const ALL: [HandlerClass; 5] = [
        HandlerClass::ByTask,
        HandlerClass::BySource,
        HandlerClass::ByGroup,
        HandlerClass::ByContent,
        HandlerClass::ByAllGroups,
    ];

    /// Name of the configuration key for this class.
    pub fn config_key(self) -> &'static str {
        match self {
            HandlerClass::ByTask => "handler_by_task",
            HandlerClass::BySource => "handler_by_file_src",
            HandlerClass::ByGroup => "handler_by_file",
            HandlerClass::ByContent => "handler_by_content",
            HandlerClass::ByAllGroups => "handler_by_all_files",
        }
    }
}

impl fmt::Display for HandlerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

impl FromStr for HandlerClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "handler_by_task" | "handlerByTask" => Ok(HandlerClass::ByTask),
            "handler_by_file_src" | "handlerByFileSrc" => Ok(HandlerClass::BySource),
            "handler_by_file" | "handlerByFile" => Ok(HandlerClass::ByGroup),
            "handler_by_content" | "handlerByContent" => Ok(HandlerClass::ByContent),
            "handler_by_all_files" | "handlerByAllFiles" => Ok(HandlerClass::ByAllGroups),
            other => Err(format!("unknown handler class: {other}")),
        }
    }
}

/// A source-list/destination pairing processed as one unit.
///
/// Source entries are paths as given by the caller; relative paths are
/// resolved against the process working directory by the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileGroup {
    #[serde(default, rename = "src")]
    pub sources: Vec<String>,

    #[serde(default)]
    pub dest: Option<String>,
}

impl FileGroup {
    pub fn new<I, S>(sources: I, dest: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            dest: dest.map(str::to_string),
        }
    }
}

/// One processed group as reported to `handler_by_all_files` and to an
/// external result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub sources: Vec<String>,
    pub dest: Option<String>,
}

/// Result of a by-source, by-group or by-content handler.
///
/// What `Replace` replaces depends on the class: the source path, the
/// destination path, or the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Replace(String),
    Drop,
}

impl Decision {
    /// `true` keeps, `false` drops.
    pub fn keep_if(cond: bool) -> Self {
        if cond { Decision::Keep } else { Decision::Drop }
    }
}

/// Result of a by-task or by-all-groups handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Continue,
    Abort,
}

/// A config value that may be given once or as a list.
// `Many` first: an untagged `One(toml::Value)` would also swallow arrays.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v),
            OneOrMany::Many(v) => v.as_slice(),
        }
    }
}
