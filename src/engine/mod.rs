// src/engine/mod.rs

//! Orchestration of target invocations.
//!
//! A [`Session`] owns the change store and the handler registry for one run
//! of the tool. It invokes pipelines one at a time and commits the store
//! after each one, whatever the pipeline's outcome.

pub mod session;

pub use session::{resolve_group, Session};
