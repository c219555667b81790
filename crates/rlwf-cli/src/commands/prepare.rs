//! Run preparation: directories and per-component env files
//!
//! Resolves the workflow against a working directory, creates the log and
//! checkpoint directories, and writes `<component>.env` for every component
//! the runner will start. Logging follows the workflow's `main.logging`
//! section, with the file sink at the resolved `log_path`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rlwf_core::util::render_env_file;
use rlwf_core::Workflow;
use tracing::{info, warn};

use super::WorkflowArgs;
use crate::logging;

#[derive(Args, Debug)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Working directory relative paths are resolved against (default: current directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Where to write component env files (default: <log dir>/env)
    #[arg(long)]
    pub env_dir: Option<PathBuf>,
}

pub fn run(args: &PrepareArgs, verbose: bool) -> Result<()> {
    // Validation happens once logging is up so its warnings reach the log file
    let workflow = args.workflow.read()?;

    let workdir = match &args.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let resolved = workflow.resolve_paths(&workdir);

    let _guard = logging::init_with_section(&resolved.main.logging, &resolved.log_path, verbose)?;
    check_workflow(&workflow)?;
    info!("Preparing workflow '{}' in {}", resolved.job, workdir.display());

    check_inputs(&resolved);
    create_dirs(&resolved)?;

    let env_dir = args
        .env_dir
        .clone()
        .unwrap_or_else(|| default_env_dir(&resolved));
    let written = write_env_files(&resolved, &env_dir)?;

    for path in &written {
        println!("{}", path.display());
    }
    info!("Wrote {} env file(s) to {}", written.len(), env_dir.display());
    Ok(())
}

fn check_workflow(workflow: &Workflow) -> Result<()> {
    workflow.validate().context("Invalid workflow")?;
    info!(
        "Loaded workflow '{}' ({} mode)",
        workflow.job, workflow.training.mode
    );
    Ok(())
}

fn default_env_dir(workflow: &Workflow) -> PathBuf {
    workflow
        .log_path
        .parent()
        .unwrap_or(Path::new("."))
        .join("env")
}

/// Missing inputs are the runner's problem, but worth flagging early
fn check_inputs(workflow: &Workflow) {
    if !workflow.scenario_path.exists() {
        warn!(
            "scenario_path {} does not exist",
            workflow.scenario_path.display()
        );
    }
    if let Some(load_path) = &workflow.training.load_path {
        if !load_path.exists() {
            warn!("training.load_path {} does not exist", load_path.display());
        }
    }
}

fn create_dirs(workflow: &Workflow) -> Result<()> {
    for dir in workflow.required_dirs() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        info!("Created {}", dir.display());
    }
    Ok(())
}

/// Write one env file per component, returning the paths in component order
pub fn write_env_files(workflow: &Workflow, env_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(env_dir)
        .with_context(|| format!("Failed to create directory {}", env_dir.display()))?;

    let mut written = Vec::new();
    for (component, vars) in workflow.env_by_component() {
        let path = env_dir.join(format!("{component}.env"));
        fs::write(&path, render_env_file(&vars))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Wrote {} ({} variables)", path.display(), vars.len());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use rlwf_core::util::parse_env_pairs;
    use rlwf_core::{Checkpointing, ProxySection, TrainingMode};

    fn workflow(base: &Path) -> Workflow {
        let mut wf = Workflow::new("cim", "scenarios/cim", "log/cim.txt");
        wf.training.checkpointing = Some(Checkpointing {
            path: PathBuf::from("checkpoint/cim"),
            interval: 5,
        });
        wf.resolve_paths(base)
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_check_workflow_logs_through_subscriber() {
        let mut wf = Workflow::new("cim", "scenarios/cim", "log/cim.txt");
        wf.training.num_workers = Some(4);
        let output = logged(|| check_workflow(&wf).unwrap());
        assert!(output.contains("ignored in simple mode"), "{output}");
        assert!(output.contains("Loaded workflow 'cim' (simple mode)"), "{output}");
    }

    #[test]
    fn test_check_workflow_rejects_invalid() {
        let mut wf = Workflow::new("cim", "scenarios/cim", "log/cim.txt");
        wf.main.num_episodes = Some(0);
        let err = check_workflow(&wf).unwrap_err();
        assert!(format!("{err:#}").contains("main.num_episodes"));
    }

    #[test]
    fn test_default_env_dir() {
        let wf = workflow(Path::new("/work"));
        assert_eq!(default_env_dir(&wf), PathBuf::from("/work/log/env"));
    }

    #[test]
    fn test_create_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let wf = workflow(dir.path());
        create_dirs(&wf).unwrap();
        assert!(dir.path().join("log").is_dir());
        assert!(dir.path().join("checkpoint/cim").is_dir());
    }

    #[test]
    fn test_write_env_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut wf = workflow(dir.path());
        wf.training.mode = TrainingMode::Parallel;
        wf.training.proxy = Some(ProxySection {
            host: "127.0.0.1".into(),
            frontend: 10000,
            backend: 10001,
        });
        wf.training.num_workers = Some(2);

        let env_dir = dir.path().join("env");
        let written = write_env_files(&wf, &env_dir).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "main.env",
                "train_proxy.env",
                "train_worker.0.env",
                "train_worker.1.env"
            ]
        );

        let contents = fs::read_to_string(env_dir.join("train_worker.1.env")).unwrap();
        let vars = parse_env_pairs(&contents);
        assert!(vars.contains(&("ID".to_string(), "1".to_string())));
        assert!(vars.contains(&("TRAIN_PROXY_BACKEND_PORT".to_string(), "10001".to_string())));
    }
}
