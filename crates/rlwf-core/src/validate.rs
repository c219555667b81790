//! Semantic validation of workflow documents
//!
//! Deserialization already guarantees shape and types. This module checks
//! what serde cannot: value ranges, and fields that only make sense together
//! (parallel training needs a proxy, `load_episode` needs `load_path`, ...).
//!
//! Every problem carries the dotted path of the offending field so the CLI
//! can report e.g. `main.num_episodes: must be at least 1`.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use validator::ValidationError;

use crate::error::{Result, WorkflowError};
use crate::workflow::{
    Checkpointing, ControllerSection, EvalSchedule, ParallelismSection, ProxySection,
    TrainingMode, Workflow,
};

/// Maximum job name length
pub const MAX_JOB_NAME_LEN: usize = 128;
/// Maximum filesystem path length
pub const MAX_PATH_LEN: usize = 4096;

/// A single validation failure
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Dotted path of the field, e.g. `rollout.parallelism.sampling`
    pub field: String,
    pub error: ValidationError,
}

impl Problem {
    fn new(field: impl Into<String>, error: ValidationError) -> Self {
        Self {
            field: field.into(),
            error,
        }
    }

    pub fn code(&self) -> &str {
        &self.error.code
    }

    pub fn message(&self) -> String {
        self.error
            .message
            .as_ref()
            .map_or_else(|| self.error.code.to_string(), ToString::to_string)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message())
    }
}

impl From<Problem> for WorkflowError {
    fn from(problem: Problem) -> Self {
        let message = problem.message();
        WorkflowError::invalid(problem.field, message)
    }
}

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Job names end up in log file names, so keep them to a safe character set
pub fn validate_job_name(value: &str) -> std::result::Result<(), ValidationError> {
    if value.is_empty() {
        return Err(error("empty_job", "Job name cannot be empty"));
    }
    if value.len() > MAX_JOB_NAME_LEN {
        return Err(error(
            "job_too_long",
            format!("Job name must be at most {MAX_JOB_NAME_LEN} characters"),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(error(
            "invalid_job_name",
            "Job name may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(())
}

/// Custom validator for filesystem paths
pub fn validate_path(value: &Path) -> std::result::Result<(), ValidationError> {
    let len = value.as_os_str().len();
    if len == 0 {
        return Err(error("empty_path", "Path cannot be empty"));
    }
    if len > MAX_PATH_LEN {
        return Err(error(
            "path_too_long",
            format!("Path must be at most {MAX_PATH_LEN} bytes"),
        ));
    }
    Ok(())
}

/// Counts (episodes, steps, workers, intervals) start at 1
pub fn validate_positive(value: u32) -> std::result::Result<(), ValidationError> {
    if value == 0 {
        return Err(error("not_positive", "Must be at least 1"));
    }
    Ok(())
}

pub fn validate_host(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("empty_host", "Host cannot be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(error("invalid_host", "Host cannot contain whitespace"));
    }
    Ok(())
}

pub fn validate_port(value: u16) -> std::result::Result<(), ValidationError> {
    if value == 0 {
        return Err(error("invalid_port", "Port must be between 1 and 65535"));
    }
    Ok(())
}

pub fn validate_grace_factor(value: f64) -> std::result::Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(error(
            "invalid_grace_factor",
            "Grace factor must be a finite, non-negative number",
        ));
    }
    Ok(())
}

#[derive(Default)]
struct Checker {
    problems: Vec<Problem>,
}

impl Checker {
    fn check(
        &mut self,
        field: impl Into<String>,
        result: std::result::Result<(), ValidationError>,
    ) {
        if let Err(err) = result {
            self.problems.push(Problem::new(field, err));
        }
    }

    fn check_opt(
        &mut self,
        field: &str,
        value: Option<u32>,
        f: fn(u32) -> std::result::Result<(), ValidationError>,
    ) {
        if let Some(value) = value {
            self.check(field, f(value));
        }
    }

    fn fail(
        &mut self,
        field: impl Into<String>,
        code: &'static str,
        message: impl Into<Cow<'static, str>>,
    ) {
        self.problems.push(Problem::new(field, error(code, message)));
    }

    fn eval_schedule(&mut self, schedule: &EvalSchedule, num_episodes: Option<u32>) {
        const FIELD: &str = "main.eval_schedule";
        match schedule {
            // An interval longer than the run selects no episodes, which is valid
            EvalSchedule::Interval(n) => self.check(FIELD, validate_positive(*n)),
            EvalSchedule::Episodes(episodes) => {
                if episodes.is_empty() {
                    self.fail(
                        FIELD,
                        "empty_schedule",
                        "Episode list cannot be empty; use null to disable evaluation",
                    );
                }
                for (i, &ep) in episodes.iter().enumerate() {
                    let field = format!("{FIELD}[{i}]");
                    self.check(field.clone(), validate_positive(ep));
                    if let Some(total) = num_episodes {
                        if ep > total {
                            self.fail(
                                field,
                                "eval_after_end",
                                format!("Episode {ep} exceeds num_episodes ({total})"),
                            );
                        }
                    }
                }
            }
        }
    }

    fn controller(&mut self, prefix: &str, controller: &ControllerSection) {
        self.check(format!("{prefix}.host"), validate_host(&controller.host));
        self.check(format!("{prefix}.port"), validate_port(controller.port));
    }

    fn parallelism(&mut self, p: &ParallelismSection) {
        const PREFIX: &str = "rollout.parallelism";
        self.check(format!("{PREFIX}.sampling"), validate_positive(p.sampling));
        self.check_opt(&format!("{PREFIX}.eval"), p.eval, validate_positive);
        if let Some(min) = p.min_env_samples {
            self.check(format!("{PREFIX}.min_env_samples"), validate_positive(min));
            if min > p.sampling {
                self.fail(
                    format!("{PREFIX}.min_env_samples"),
                    "min_exceeds_sampling",
                    format!("Must not exceed sampling parallelism ({})", p.sampling),
                );
            }
        }
        if let Some(grace) = p.grace_factor {
            self.check(format!("{PREFIX}.grace_factor"), validate_grace_factor(grace));
        }
        match &p.controller {
            Some(controller) => self.controller(&format!("{PREFIX}.controller"), controller),
            None if p.is_distributed() => self.fail(
                format!("{PREFIX}.controller"),
                "missing_controller",
                "Required when sampling or eval parallelism is greater than 1",
            ),
            None => {}
        }
    }

    fn checkpointing(&mut self, c: &Checkpointing) {
        self.check("training.checkpointing.path", validate_path(&c.path));
        self.check("training.checkpointing.interval", validate_positive(c.interval));
    }

    fn proxy(&mut self, proxy: &ProxySection) {
        self.check("training.proxy.host", validate_host(&proxy.host));
        self.check("training.proxy.frontend", validate_port(proxy.frontend));
        self.check("training.proxy.backend", validate_port(proxy.backend));
        if proxy.frontend == proxy.backend {
            self.fail(
                "training.proxy.backend",
                "port_conflict",
                "Frontend and backend ports must differ",
            );
        }
    }
}

impl Workflow {
    /// Every validation problem in the document, in document order
    pub fn problems(&self) -> Vec<Problem> {
        let mut c = Checker::default();

        c.check("job", validate_job_name(&self.job));
        c.check("scenario_path", validate_path(&self.scenario_path));
        c.check("log_path", validate_path(&self.log_path));

        let main = &self.main;
        c.check_opt("main.num_episodes", main.num_episodes, validate_positive);
        c.check_opt("main.num_steps", main.num_steps, validate_positive);
        if let Some(schedule) = &main.eval_schedule {
            c.eval_schedule(schedule, main.num_episodes);
        }

        if let Some(p) = &self.rollout.parallelism {
            c.parallelism(p);
        }

        let training = &self.training;
        if let Some(load_path) = &training.load_path {
            c.check("training.load_path", validate_path(load_path));
        }
        if let Some(ep) = training.load_episode {
            if training.load_path.is_none() {
                c.fail(
                    "training.load_episode",
                    "missing_load_path",
                    "Requires training.load_path",
                );
            }
            if let Some(total) = main.num_episodes {
                if ep >= total {
                    c.fail(
                        "training.load_episode",
                        "nothing_to_resume",
                        format!("Must be less than num_episodes ({total})"),
                    );
                }
            }
        }
        if let Some(checkpointing) = &training.checkpointing {
            c.checkpointing(checkpointing);
        }
        if let Some(proxy) = &training.proxy {
            c.proxy(proxy);
        }
        c.check_opt("training.num_workers", training.num_workers, validate_positive);

        if training.mode == TrainingMode::Parallel {
            if training.proxy.is_none() {
                c.fail(
                    "training.proxy",
                    "missing_proxy",
                    "Required when training.mode is parallel",
                );
            }
            if training.num_workers.is_none() {
                c.fail(
                    "training.num_workers",
                    "missing_num_workers",
                    "Required when training.mode is parallel",
                );
            }
        }

        c.problems
    }

    /// Fail on the first validation problem
    pub fn validate(&self) -> Result<()> {
        if let Some(problem) = self.problems().into_iter().next() {
            return Err(problem.into());
        }
        if self.training.mode == TrainingMode::Simple
            && (self.training.proxy.is_some() || self.training.num_workers.is_some())
        {
            tracing::warn!("training.proxy / training.num_workers are ignored in simple mode");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow() -> Workflow {
        Workflow::new("job", "scenario", "log/job.txt")
    }

    fn fields(wf: &Workflow) -> Vec<String> {
        wf.problems().into_iter().map(|p| p.field).collect()
    }

    #[test]
    fn test_validate_job_name() {
        assert!(validate_job_name("cim_rl-workflow.v2").is_ok());
        assert!(validate_job_name("").is_err());
        assert!(validate_job_name("has space").is_err());
        assert!(validate_job_name("a/b").is_err());
        assert!(validate_job_name(&"x".repeat(MAX_JOB_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path(Path::new("log/run.txt")).is_ok());
        assert!(validate_path(Path::new("/abs/path")).is_ok());
        assert!(validate_path(Path::new("")).is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1).is_ok());
        assert_eq!(validate_positive(0).unwrap_err().code, "not_positive");
    }

    #[test]
    fn test_validate_grace_factor() {
        assert!(validate_grace_factor(0.0).is_ok());
        assert!(validate_grace_factor(0.2).is_ok());
        assert!(validate_grace_factor(-0.1).is_err());
        assert!(validate_grace_factor(f64::NAN).is_err());
    }

    #[test]
    fn test_default_workflow_is_valid() {
        assert!(workflow().problems().is_empty());
        assert!(workflow().validate().is_ok());
    }

    #[test]
    fn test_zero_episodes() {
        let mut wf = workflow();
        wf.main.num_episodes = Some(0);
        let err = wf.validate().unwrap_err();
        assert_eq!(err.field(), Some("main.num_episodes"));
    }

    #[test]
    fn test_eval_episode_after_end() {
        let mut wf = workflow();
        wf.main.num_episodes = Some(10);
        wf.main.eval_schedule = Some(EvalSchedule::Episodes(vec![5, 12]));
        assert_eq!(fields(&wf), vec!["main.eval_schedule[1]"]);
    }

    #[test]
    fn test_interval_longer_than_run() {
        let mut wf = workflow();
        wf.main.num_episodes = Some(3);
        wf.main.eval_schedule = Some(EvalSchedule::Interval(5));
        assert!(wf.validate().is_ok());
        assert_eq!(wf.episode_plan().unwrap().eval_episodes().count(), 0);
    }

    #[test]
    fn test_empty_eval_list() {
        let mut wf = workflow();
        wf.main.eval_schedule = Some(EvalSchedule::Episodes(vec![]));
        let problems = wf.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code(), "empty_schedule");
    }

    #[test]
    fn test_load_episode_requires_load_path() {
        let mut wf = workflow();
        wf.training.load_episode = Some(3);
        assert_eq!(fields(&wf), vec!["training.load_episode"]);
    }

    #[test]
    fn test_distributed_rollout_requires_controller() {
        let mut wf = workflow();
        wf.rollout.parallelism = Some(ParallelismSection {
            sampling: 3,
            min_env_samples: Some(4),
            ..ParallelismSection::default()
        });
        assert_eq!(
            fields(&wf),
            vec![
                "rollout.parallelism.min_env_samples",
                "rollout.parallelism.controller"
            ]
        );
    }

    #[test]
    fn test_parallel_training_requirements() {
        let mut wf = workflow();
        wf.training.mode = TrainingMode::Parallel;
        assert_eq!(fields(&wf), vec!["training.proxy", "training.num_workers"]);

        wf.training.proxy = Some(ProxySection {
            host: "127.0.0.1".into(),
            frontend: 10000,
            backend: 10000,
        });
        wf.training.num_workers = Some(2);
        assert_eq!(fields(&wf), vec!["training.proxy.backend"]);
    }

    #[test]
    fn test_problem_display() {
        let mut wf = workflow();
        wf.main.num_steps = Some(0);
        let problem = wf.problems().remove(0);
        assert_eq!(problem.to_string(), "main.num_steps: Must be at least 1");
    }
}
