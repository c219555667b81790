//! Workflow validation command

use anyhow::{bail, Result};
use clap::Args;
use rlwf_core::{EvalSchedule, Workflow};

use super::WorkflowArgs;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Only report problems, skip the summary
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: &ValidateArgs) -> Result<()> {
    let path = args.workflow.resolve_path()?;
    let workflow = args.workflow.read()?;
    let problems = workflow.problems();

    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  {problem}");
        }
        bail!("{} problem(s) in {}", problems.len(), path.display());
    }

    if !args.quiet {
        print!("{}", summary(&workflow));
    }
    println!("OK: {}", path.display());
    Ok(())
}

pub fn describe_schedule(schedule: Option<&EvalSchedule>) -> String {
    match schedule.map(EvalSchedule::normalized) {
        None => "disabled".to_string(),
        Some(EvalSchedule::Interval(1)) => "every episode".to_string(),
        Some(EvalSchedule::Interval(n)) => format!("every {n} episodes"),
        Some(EvalSchedule::Episodes(episodes)) => format!(
            "episodes {}",
            episodes
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn summary(wf: &Workflow) -> String {
    let mut out = String::new();
    out.push_str(&format!("Workflow: {} ({} mode)\n", wf.job, wf.training.mode));
    out.push_str(&format!("  scenario_path: {}\n", wf.scenario_path.display()));
    out.push_str(&format!("  log_path:      {}\n", wf.log_path.display()));

    let episodes = wf
        .main
        .num_episodes
        .map_or_else(|| "runner default".to_string(), |n| n.to_string());
    let steps = wf
        .main
        .num_steps
        .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
    out.push_str(&format!("  episodes:      {episodes} (steps per episode: {steps})\n"));
    out.push_str(&format!(
        "  evaluation:    {}\n",
        describe_schedule(wf.main.eval_schedule.as_ref())
    ));

    match &wf.training.checkpointing {
        Some(c) => out.push_str(&format!(
            "  checkpoints:   every {} episodes -> {}\n",
            c.interval,
            c.path.display()
        )),
        None => out.push_str("  checkpoints:   disabled\n"),
    }
    if let Some(load_path) = &wf.training.load_path {
        let episode = wf
            .training
            .load_episode
            .map_or_else(|| "latest".to_string(), |ep| ep.to_string());
        out.push_str(&format!(
            "  resume:        {} (episode {episode})\n",
            load_path.display()
        ));
    }

    let components: Vec<String> = wf.components().iter().map(ToString::to_string).collect();
    out.push_str(&format!("  components:    {}\n", components.join(", ")));
    out
}
