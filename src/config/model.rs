// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::pipeline::handler::{HandlerSpec, HandlerSpecs};
use crate::store::DEFAULT_CACHE_DIR;
use crate::types::{FileGroup, HandlerClass, OneOrMany};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// cache_dir = ".taskhelper"
///
/// [target.bundle]
/// handler_by_file = "newFile"
/// handler_by_content = "identity"
///
/// [[target.bundle.files]]
/// src = ["a.js", "b.js"]
/// dest = "dist/bundle.js"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All targets from `[target.<name>]`.
    #[serde(default)]
    pub target: BTreeMap<String, TargetConfig>,
}

/// A validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub target: BTreeMap<String, TargetConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        target: BTreeMap<String, TargetConfig>,
    ) -> Self {
        Self { config, target }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Directory (relative to the config file) holding the change store.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

/// Options visible to every handler of a target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetOptions {
    /// Joins source contents. Auto-detected when unset.
    #[serde(default)]
    pub separator: Option<String>,

    /// Seconds added to commit timestamps (default 3).
    #[serde(default, alias = "mtimeOffset")]
    pub mtime_offset: Option<u64>,

    /// Lower size bound for the `size` handler, inclusive.
    #[serde(default, alias = "minSize")]
    pub min_size: Option<u64>,

    /// Upper size bound for the `size` handler, inclusive.
    #[serde(default, alias = "maxSize")]
    pub max_size: Option<u64>,

    /// Any other key, for custom handlers.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    #[serde(default, alias = "handlerByTask")]
    pub handler_by_task: OneOrMany<toml::Value>,

    #[serde(default, alias = "handlerByFileSrc")]
    pub handler_by_file_src: OneOrMany<toml::Value>,

    #[serde(default, alias = "handlerByFile")]
    pub handler_by_file: OneOrMany<toml::Value>,

    #[serde(default, alias = "handlerByContent")]
    pub handler_by_content: OneOrMany<toml::Value>,

    #[serde(default, alias = "handlerByAllFiles")]
    pub handler_by_all_files: OneOrMany<toml::Value>,

    /// If true, processed groups are collected and reported.
    #[serde(default, alias = "filesArray")]
    pub files_array: bool,

    /// File groups, in processing order.
    #[serde(default)]
    pub files: Vec<FileGroup>,

    #[serde(flatten)]
    pub options: TargetOptions,
}

impl TargetConfig {
    /// Built-in names configured for `class`. Non-string entries are dropped.
    pub fn handler_names(&self, class: HandlerClass) -> Vec<String> {
        let values = match class {
            HandlerClass::ByTask => &self.handler_by_task,
            HandlerClass::BySource => &self.handler_by_file_src,
            HandlerClass::ByGroup => &self.handler_by_file,
            HandlerClass::ByContent => &self.handler_by_content,
            HandlerClass::ByAllGroups => &self.handler_by_all_files,
        };
        values
            .as_slice()
            .iter()
            .filter_map(|value| match value.as_str() {
                Some(name) => Some(name.to_string()),
                None => {
                    debug!(%class, ?value, "ignoring non-string handler entry");
                    None
                }
            })
            .collect()
    }

    /// All configured names as unresolved handler specs.
    pub fn handler_specs(&self) -> HandlerSpecs {
        HandlerSpecs {
            by_task: builtin_specs(self.handler_names(HandlerClass::ByTask)),
            by_source: builtin_specs(self.handler_names(HandlerClass::BySource)),
            by_group: builtin_specs(self.handler_names(HandlerClass::ByGroup)),
            by_content: builtin_specs(self.handler_names(HandlerClass::ByContent)),
            by_all_groups: builtin_specs(self.handler_names(HandlerClass::ByAllGroups)),
        }
    }
}

fn builtin_specs<H: ?Sized>(names: Vec<String>) -> Vec<HandlerSpec<H>> {
    names.into_iter().map(HandlerSpec::Builtin).collect()
}
