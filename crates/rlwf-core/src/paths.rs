//! Path resolution
//!
//! Documents keep paths exactly as written. Resolution against a working
//! directory is an explicit step taken by whoever launches the run.

use std::path::{Path, PathBuf};

use crate::env::Component;
use crate::workflow::Workflow;

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl Workflow {
    /// Copy with every relative path joined onto `base`
    pub fn resolve_paths(&self, base: &Path) -> Workflow {
        let mut resolved = self.clone();
        resolved.scenario_path = resolve(base, &self.scenario_path);
        resolved.log_path = resolve(base, &self.log_path);
        if let Some(load_path) = &self.training.load_path {
            resolved.training.load_path = Some(resolve(base, load_path));
        }
        if let Some(checkpointing) = resolved.training.checkpointing.as_mut() {
            checkpointing.path = resolve(base, &checkpointing.path);
        }
        resolved
    }

    /// Log file of a component
    ///
    /// The main component writes to `log_path`; the others write next to it,
    /// e.g. `log/cim.txt` becomes `log/cim.rollout_worker.0.txt`.
    pub fn log_file_for(&self, component: &Component) -> PathBuf {
        if *component == Component::Main {
            return self.log_path.clone();
        }

        let stem = self
            .log_path
            .file_stem()
            .map_or_else(|| self.job.clone(), |s| s.to_string_lossy().into_owned());
        let mut name = format!("{stem}.{component}");
        if let Some(ext) = self.log_path.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        self.log_path.with_file_name(name)
    }

    /// Directories that must exist before the run starts
    pub fn required_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.push(parent.to_path_buf());
            }
        }
        if let Some(checkpointing) = &self.training.checkpointing {
            dirs.push(checkpointing.path.clone());
        }
        dirs
    }
}
