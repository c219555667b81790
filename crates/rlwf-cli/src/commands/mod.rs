//! CLI command modules

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rlwf_core::{find_workflow_file, Workflow, WorkflowLoader};

pub mod init;
pub mod inspect;
pub mod prepare;
pub mod validate;

/// Workflow file selection shared by every command that reads one
#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    /// Workflow file (default: $RLWF_CONFIG, ./workflow.yml, ~/.config/rlwf/workflow.yml)
    pub path: Option<PathBuf>,

    /// Ignore RLWF__* environment overrides
    #[arg(long)]
    pub no_env: bool,
}

impl WorkflowArgs {
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => find_workflow_file().context(
                "No workflow file given and none found (set RLWF_CONFIG or create ./workflow.yml)",
            ),
        }
    }

    fn loader(&self) -> Result<WorkflowLoader> {
        let mut loader = WorkflowLoader::new(self.resolve_path()?);
        if self.no_env {
            loader = loader.with_env_source(Vec::<(String, String)>::new());
        }
        Ok(loader)
    }

    /// Parse without semantic validation
    pub fn read(&self) -> Result<Workflow> {
        let loader = self.loader()?;
        loader
            .read()
            .with_context(|| format!("Failed to load workflow {}", loader.path().display()))
    }

    /// Parse and validate
    pub fn load(&self) -> Result<Workflow> {
        let loader = self.loader()?;
        loader
            .load()
            .with_context(|| format!("Failed to load workflow {}", loader.path().display()))
    }
}
