#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use taskhelper::config::{ConfigFile, ConfigSection, RawConfigFile, TargetConfig};
use taskhelper::types::{FileGroup, OneOrMany};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                target: BTreeMap::new(),
            },
        }
    }

    pub fn with_target(mut self, name: &str, target: TargetConfig) -> Self {
        self.config.target.insert(name.to_string(), target);
        self
    }

    pub fn with_cache_dir(mut self, dir: &str) -> Self {
        self.config.config.cache_dir = PathBuf::from(dir);
        self
    }

    /// The raw config, for tests that exercise validation.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetConfig`.
pub struct TargetConfigBuilder {
    target: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn new() -> Self {
        Self {
            target: TargetConfig::default(),
        }
    }

    pub fn by_task(mut self, name: &str) -> Self {
        push_name(&mut self.target.handler_by_task, name);
        self
    }

    pub fn by_source(mut self, name: &str) -> Self {
        push_name(&mut self.target.handler_by_file_src, name);
        self
    }

    pub fn by_group(mut self, name: &str) -> Self {
        push_name(&mut self.target.handler_by_file, name);
        self
    }

    pub fn by_content(mut self, name: &str) -> Self {
        push_name(&mut self.target.handler_by_content, name);
        self
    }

    pub fn by_all_groups(mut self, name: &str) -> Self {
        push_name(&mut self.target.handler_by_all_files, name);
        self
    }

    pub fn separator(mut self, sep: &str) -> Self {
        self.target.options.separator = Some(sep.to_string());
        self
    }

    pub fn mtime_offset(mut self, secs: u64) -> Self {
        self.target.options.mtime_offset = Some(secs);
        self
    }

    pub fn min_size(mut self, size: u64) -> Self {
        self.target.options.min_size = Some(size);
        self
    }

    pub fn max_size(mut self, size: u64) -> Self {
        self.target.options.max_size = Some(size);
        self
    }

    pub fn files_array(mut self, val: bool) -> Self {
        self.target.files_array = val;
        self
    }

    pub fn files(mut self, sources: &[&str], dest: Option<&str>) -> Self {
        self.target
            .files
            .push(FileGroup::new(sources.iter().copied(), dest));
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}

impl Default for TargetConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn push_name(slot: &mut OneOrMany<toml::Value>, name: &str) {
    let mut names = std::mem::take(slot).into_vec();
    names.push(toml::Value::String(name.to_string()));
    *slot = OneOrMany::Many(names);
}
