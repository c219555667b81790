//! rlwf core - RL workflow configuration
//!
//! This crate defines the workflow document consumed by the RL workflow
//! runner: its schema, loading (strict or with environment overrides),
//! validation, episode schedules, path resolution and per-component
//! environment export.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod env;
pub mod error;
pub mod loader;
pub mod paths;
pub mod schedule;
pub mod util;
pub mod validate;
pub mod workflow;

pub use env::Component;
pub use error::{Result, WorkflowError};
pub use loader::{find_workflow_file, WorkflowLoader};
pub use schedule::{EpisodePlan, EpisodeStep};
pub use validate::Problem;
pub use workflow::*;
