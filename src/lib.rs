// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::Session;
use crate::errors::{Result, TaskHelperError};
use crate::fs::{RealFileSystem, SystemClock};
use crate::store::store_file_path;
use crate::types::HandlerClass;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the session (change store + handler registry)
/// - running the selected targets, one invocation each
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    let store_path = store_file_path(&root, &cfg.config.cache_dir);
    let mut session = Session::new(Arc::new(RealFileSystem), Arc::new(SystemClock), store_path);

    for name in selected_targets(&cfg, &args.targets)? {
        let target = &cfg.target[&name];
        info!(target_name = %name, "running target");
        let report = session.run_target(&name, target, &root)?;
        info!(
            target_name = %name,
            outcome = ?report.outcome,
            groups = report.results.len(),
            written = report.written.len(),
            "target finished"
        );
    }

    Ok(())
}

/// Figure out the directory relative paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "build/TaskHelper.toml"),
///   we use that directory.
/// - If it's just a bare filename like "TaskHelper.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Targets to run: the requested ones in the given order, else all of them.
pub fn selected_targets(cfg: &ConfigFile, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(cfg.target.keys().cloned().collect());
    }
    requested
        .iter()
        .map(|name| {
            if cfg.target.contains_key(name) {
                Ok(name.clone())
            } else {
                Err(TaskHelperError::TargetNotFound(name.clone()))
            }
        })
        .collect()
}

/// Simple dry-run output: print targets, handlers and file groups.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskhelper dry-run");
    println!("  config.cache_dir = {}", cfg.config.cache_dir.display());
    println!();

    println!("targets ({}):", cfg.target.len());
    for (name, target) in cfg.target.iter() {
        println!("  - {name}");
        for class in HandlerClass::ALL {
            let names = target.handler_names(class);
            if !names.is_empty() {
                println!("      {class}: {:?}", names);
            }
        }
        if let Some(ref sep) = target.options.separator {
            println!("      separator: {:?}", sep);
        }
        if let Some(offset) = target.options.mtime_offset {
            println!("      mtime_offset: {offset}");
        }
        if target.options.min_size.is_some() || target.options.max_size.is_some() {
            println!(
                "      size: {:?}..={:?}",
                target.options.min_size, target.options.max_size
            );
        }
        if target.files_array {
            println!("      files_array: true");
        }
        for group in &target.files {
            match group.dest {
                Some(ref dest) => println!("      files: {:?} -> {dest}", group.sources),
                None => println!("      files: {:?}", group.sources),
            }
        }
    }

    debug!("dry-run complete (no files touched)");
}
