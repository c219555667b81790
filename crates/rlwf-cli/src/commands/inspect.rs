//! Read-only inspection commands: show, schedule, env

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use rlwf_core::util::render_env_file;
use rlwf_core::{Component, EpisodePlan, EpisodeStep, Workflow};

use super::validate::describe_schedule;
use super::WorkflowArgs;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Resolve relative paths against this directory
    #[arg(long)]
    pub resolve: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,

    /// List every episode, not only those with an evaluation or checkpoint
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct EnvArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Only print this component (main, rollout_worker.<n>, train_proxy, train_worker.<n>)
    #[arg(short, long)]
    pub component: Option<Component>,

    /// Resolve relative paths against this directory
    #[arg(long)]
    pub resolve: Option<PathBuf>,

    /// Prefix each line with `export `
    #[arg(long)]
    pub export: bool,
}

fn resolved(workflow: Workflow, base: Option<&PathBuf>) -> Workflow {
    match base {
        Some(base) => workflow.resolve_paths(base),
        None => workflow,
    }
}

pub fn show(args: &ShowArgs) -> Result<()> {
    let workflow = resolved(args.workflow.load()?, args.resolve.as_ref());
    let rendered = match args.format {
        OutputFormat::Yaml => workflow.to_yaml_string()?,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&workflow)?;
            json.push('\n');
            json
        }
    };
    print!("{rendered}");
    Ok(())
}

pub fn schedule(args: &ScheduleArgs) -> Result<()> {
    let workflow = args.workflow.load()?;

    let Some(plan) = workflow.episode_plan() else {
        println!("main.num_episodes is null; the runner decides how many episodes to run.");
        println!(
            "evaluation:  {}",
            describe_schedule(workflow.main.eval_schedule.as_ref())
        );
        if let Some(c) = &workflow.training.checkpointing {
            println!("checkpoints: every {} episodes", c.interval);
        }
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        let mut out = io::BufWriter::new(io::stdout().lock());
        write_plan(&mut out, &plan, args.all).context("Failed to write output")?;
        out.flush().context("Failed to write output")?;
    }
    Ok(())
}

/// Streams the plan so `--all` over a long run never buffers every line
fn write_plan(out: &mut impl Write, plan: &EpisodePlan, all: bool) -> io::Result<()> {
    writeln!(
        out,
        "Episodes {}..={} ({} to run)",
        plan.first_episode,
        plan.last_episode,
        plan.len()
    )?;
    if plan.is_empty() {
        return writeln!(out, "Nothing to run.");
    }

    let steps: Box<dyn Iterator<Item = EpisodeStep> + '_> = if all {
        Box::new(plan.steps())
    } else {
        Box::new(plan.events())
    };
    writeln!(out, "{:>8}  {:<8}  {:<10}", "EPISODE", "EVAL", "CHECKPOINT")?;
    for step in steps {
        writeln!(
            out,
            "{:>8}  {:<8}  {:<10}",
            step.episode,
            if step.evaluate { "yes" } else { "-" },
            if step.checkpoint { "yes" } else { "-" },
        )?;
    }
    Ok(())
}

pub fn env(args: &EnvArgs) -> Result<()> {
    let workflow = resolved(args.workflow.load()?, args.resolve.as_ref());

    let components = match args.component {
        Some(component) => {
            if !workflow.components().contains(&component) {
                bail!("Component {component} is not part of this workflow");
            }
            vec![component]
        }
        None => workflow.components(),
    };

    let mut out = String::new();
    for component in components {
        let vars = workflow.component_env(&component);
        if args.component.is_none() {
            out.push_str(&format!("# {component}\n"));
        }
        let rendered = render_env_file(&vars);
        if args.export {
            for line in rendered.lines() {
                out.push_str(&format!("export {line}\n"));
            }
        } else {
            out.push_str(&rendered);
        }
        if args.component.is_none() {
            out.push('\n');
        }
    }

    print!("{out}");
    io::stdout().flush().context("Failed to write output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlwf_core::EvalSchedule;

    fn render(plan: &EpisodePlan, all: bool) -> String {
        let mut out = Vec::new();
        write_plan(&mut out, plan, all).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn plan() -> EpisodePlan {
        let mut wf = Workflow::new("cim", "scenarios/cim", "log/cim.txt");
        wf.main.num_episodes = Some(6);
        wf.main.eval_schedule = Some(EvalSchedule::Interval(3));
        wf.episode_plan().unwrap()
    }

    #[test]
    fn test_render_plan_only_events() {
        let text = render(&plan(), false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Episodes 1..=6 (6 to run)");
        // header + episodes 3 and 6
        assert_eq!(lines.len(), 4);
        assert!(lines[2].trim_start().starts_with("3 "));
    }

    #[test]
    fn test_render_plan_all() {
        let text = render(&plan(), true);
        assert_eq!(text.lines().count(), 2 + 6);
    }

    #[test]
    fn test_render_plan_long_run() {
        let mut wf = Workflow::new("cim", "scenarios/cim", "log/cim.txt");
        wf.main.num_episodes = Some(u32::MAX);
        wf.main.eval_schedule = Some(EvalSchedule::Episodes(vec![7, 9]));
        let text = render(&wf.episode_plan().unwrap(), false);
        assert!(text.starts_with("Episodes 1..=4294967295 (4294967295 to run)\n"));
        assert_eq!(text.lines().count(), 2 + 2);
    }

    #[test]
    fn test_render_empty_plan() {
        let mut wf = Workflow::new("cim", "scenarios/cim", "log/cim.txt");
        wf.main.num_episodes = Some(5);
        wf.training.load_path = Some(PathBuf::from("models"));
        wf.training.load_episode = Some(5);
        let text = render(&wf.episode_plan().unwrap(), true);
        assert!(text.ends_with("Nothing to run.\n"));
    }
}
