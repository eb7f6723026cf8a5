// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TaskHelperError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TaskHelperError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.target))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_targets(cfg)?;
    validate_global_config(cfg)?;
    validate_size_bounds(cfg)?;
    validate_file_groups(cfg)?;
    Ok(())
}

fn ensure_has_targets(cfg: &RawConfigFile) -> Result<()> {
    if cfg.target.is_empty() {
        return Err(TaskHelperError::ConfigError(
            "config must contain at least one [target.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.cache_dir.as_os_str().is_empty() {
        return Err(TaskHelperError::ConfigError(
            "[config].cache_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_size_bounds(cfg: &RawConfigFile) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        if let (Some(min), Some(max)) = (target.options.min_size, target.options.max_size) {
            if min > max {
                return Err(TaskHelperError::ConfigError(format!(
                    "target '{}' has min_size {} greater than max_size {}",
                    name, min, max
                )));
            }
        }
    }
    Ok(())
}

fn validate_file_groups(cfg: &RawConfigFile) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        for (idx, group) in target.files.iter().enumerate() {
            if group.sources.is_empty() && group.dest.is_none() {
                return Err(TaskHelperError::ConfigError(format!(
                    "target '{}' files[{}] needs `src` or `dest`",
                    name, idx
                )));
            }
        }
    }
    Ok(())
}
