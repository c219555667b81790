//! Workflow template command

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use rlwf_core::loader::TEMPLATE;
use rlwf_core::validate::validate_job_name;
use rlwf_core::Workflow;

/// Job name used in the bundled template
const TEMPLATE_JOB: &str = "cim_rl_workflow";

#[derive(Args, Debug)]
pub struct InitArgs {
    /// File to create
    #[arg(short, long, default_value = "workflow.yml")]
    pub path: PathBuf,

    /// Job name for the new workflow
    #[arg(short, long)]
    pub job: Option<String>,

    /// Force overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: &InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        println!("Workflow file already exists: {}", args.path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    let contents = render_template(args.job.as_deref())?;
    std::fs::write(&args.path, contents)
        .with_context(|| format!("Failed to write {}", args.path.display()))?;
    println!("Workflow file created: {}", args.path.display());

    Ok(())
}

/// Template with the job name (and the paths derived from it) replaced
fn render_template(job: Option<&str>) -> Result<String> {
    let Some(job) = job else {
        return Ok(TEMPLATE.to_string());
    };
    if let Err(err) = validate_job_name(job) {
        bail!(
            "Invalid job name '{job}': {}",
            err.message.as_deref().unwrap_or("invalid")
        );
    }

    let contents = TEMPLATE.replace(TEMPLATE_JOB, job);
    Workflow::from_yaml_str(&contents).context("Rendered template is not a valid workflow")?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template() {
        assert_eq!(render_template(None).unwrap(), TEMPLATE);
    }

    #[test]
    fn test_template_with_job() {
        let contents = render_template(Some("vm_scheduling")).unwrap();
        let wf = Workflow::from_yaml_str(&contents).unwrap();
        assert_eq!(wf.job, "vm_scheduling");
        assert_eq!(wf.log_path, PathBuf::from("log/vm_scheduling.txt"));
        assert!(!contents.contains(TEMPLATE_JOB));
    }

    #[test]
    fn test_template_rejects_bad_job() {
        assert!(render_template(Some("bad name")).is_err());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.yml");
        std::fs::write(&path, "existing").unwrap();

        run(&InitArgs {
            path: path.clone(),
            job: None,
            force: false,
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");

        run(&InitArgs {
            path: path.clone(),
            job: Some("cim".into()),
            force: true,
        })
        .unwrap();
        assert!(Workflow::from_yaml_file(&path).is_ok());
    }
}
