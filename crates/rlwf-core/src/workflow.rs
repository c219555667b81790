//! Workflow document schema
//!
//! A workflow document is a YAML mapping with three required top-level
//! fields (`job`, `scenario_path`, `log_path`) and three optional sections
//! (`main`, `rollout`, `training`). Absent optional fields take the defaults
//! defined here; `null` is kept as explicit absence.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Verbosity threshold used by every `logging` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [Self::Debug, Self::Info, Self::Warn, Self::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Equivalent `tracing` filter
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(format!(
                "unknown log level '{other}', expected one of: DEBUG, INFO, WARN, ERROR"
            )),
        }
    }
}

/// Per-component verbosity thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub stdout: LogLevel,
    pub file: LogLevel,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            stdout: LogLevel::Info,
            file: LogLevel::Debug,
        }
    }
}

/// Episodes at which evaluation runs
///
/// Either an interval (`eval_schedule: 5`, every fifth episode) or an
/// explicit list of episodes (`eval_schedule: [3, 10, 30]`). The written
/// form is preserved on re-serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvalSchedule {
    Interval(u32),
    Episodes(Vec<u32>),
}

/// The `main` section: drives the episode loop
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MainSection {
    /// Total episodes to execute; `None` leaves the bound to the runner
    pub num_episodes: Option<u32>,
    /// Optional cap on steps per episode
    pub num_steps: Option<u32>,
    pub eval_schedule: Option<EvalSchedule>,
    pub logging: LoggingSection,
}

/// Host/port pair of a coordinating process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerSection {
    pub host: String,
    pub port: u16,
}

/// `rollout.parallelism`: distributed experience collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelismSection {
    #[serde(default = "default_sampling")]
    pub sampling: u32,
    /// Evaluation parallelism; `None` means same as `sampling`
    #[serde(default)]
    pub eval: Option<u32>,
    /// Samplers that must report before an episode proceeds
    #[serde(default)]
    pub min_env_samples: Option<u32>,
    /// Extra wait for stragglers, as a fraction of the time the first
    /// `min_env_samples` samplers took
    #[serde(default)]
    pub grace_factor: Option<f64>,
    #[serde(default)]
    pub controller: Option<ControllerSection>,
}

fn default_sampling() -> u32 {
    1
}

impl Default for ParallelismSection {
    fn default() -> Self {
        Self {
            sampling: default_sampling(),
            eval: None,
            min_env_samples: None,
            grace_factor: None,
            controller: None,
        }
    }
}

impl ParallelismSection {
    pub fn eval_parallelism(&self) -> u32 {
        self.eval.unwrap_or(self.sampling)
    }

    /// Whether rollout runs outside the main process
    pub fn is_distributed(&self) -> bool {
        self.sampling > 1 || self.eval_parallelism() > 1
    }

    /// Number of rollout worker processes required
    pub fn num_workers(&self) -> u32 {
        self.sampling.max(self.eval_parallelism())
    }
}

/// The `rollout` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolloutSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<ParallelismSection>,
    pub logging: LoggingSection,
}

impl RolloutSection {
    pub fn is_distributed(&self) -> bool {
        self.parallelism
            .as_ref()
            .is_some_and(ParallelismSection::is_distributed)
    }
}

/// Training execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    /// Training runs inside the main process
    #[default]
    Simple,
    /// Training is dispatched through a proxy to worker processes
    Parallel,
}

impl TrainingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Parallel => "parallel",
        }
    }
}

impl fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `training.checkpointing`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Checkpointing {
    pub path: PathBuf,
    /// Episodes between checkpoints
    pub interval: u32,
}

/// `training.proxy`: address of the training request broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySection {
    pub host: String,
    pub frontend: u16,
    pub backend: u16,
}

/// The `training` section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingSection {
    pub mode: TrainingMode,
    pub load_path: Option<PathBuf>,
    pub load_episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpointing: Option<Checkpointing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_workers: Option<u32>,
    pub logging: LoggingSection,
}

/// A complete workflow document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workflow {
    /// Identifier for the run
    pub job: String,
    pub scenario_path: PathBuf,
    pub log_path: PathBuf,
    #[serde(default)]
    pub main: MainSection,
    #[serde(default)]
    pub rollout: RolloutSection,
    #[serde(default)]
    pub training: TrainingSection,
}

impl Workflow {
    /// Minimal workflow with every optional field at its default
    pub fn new(
        job: impl Into<String>,
        scenario_path: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job: job.into(),
            scenario_path: scenario_path.into(),
            log_path: log_path.into(),
            main: MainSection::default(),
            rollout: RolloutSection::default(),
            training: TrainingSection::default(),
        }
    }
}
