//! Per-component environment export
//!
//! The external runner starts one process per component and hands each its
//! slice of the workflow as environment variables. This module computes
//! those variable sets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::workflow::{LoggingSection, TrainingMode, Workflow};

/// A process of the external workflow runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Episode loop; hosts the rollout controller and, in simple mode, training
    Main,
    RolloutWorker(u32),
    TrainProxy,
    TrainWorker(u32),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::RolloutWorker(id) => write!(f, "rollout_worker.{id}"),
            Self::TrainProxy => f.write_str("train_proxy"),
            Self::TrainWorker(id) => write!(f, "train_worker.{id}"),
        }
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_id = |id: &str| {
            id.parse::<u32>()
                .map_err(|_| format!("invalid worker index '{id}' in component '{s}'"))
        };
        match s.split_once('.') {
            None if s == "main" => Ok(Self::Main),
            None if s == "train_proxy" => Ok(Self::TrainProxy),
            Some(("rollout_worker", id)) => Ok(Self::RolloutWorker(parse_id(id)?)),
            Some(("train_worker", id)) => Ok(Self::TrainWorker(parse_id(id)?)),
            _ => Err(format!(
                "unknown component '{s}', expected main, rollout_worker.<n>, train_proxy or train_worker.<n>"
            )),
        }
    }
}

impl Workflow {
    /// Components the runner must start for this workflow
    pub fn components(&self) -> Vec<Component> {
        let mut components = vec![Component::Main];
        if let Some(p) = self.rollout.parallelism.as_ref().filter(|p| p.is_distributed()) {
            components.extend((0..p.num_workers()).map(Component::RolloutWorker));
        }
        if self.training.mode == TrainingMode::Parallel {
            components.push(Component::TrainProxy);
            let workers = self.training.num_workers.unwrap_or(0);
            components.extend((0..workers).map(Component::TrainWorker));
        }
        components
    }

    fn logging_for(&self, component: &Component) -> &LoggingSection {
        match component {
            Component::Main => &self.main.logging,
            Component::RolloutWorker(_) => &self.rollout.logging,
            Component::TrainProxy | Component::TrainWorker(_) => &self.training.logging,
        }
    }

    /// Environment variables for one component
    pub fn component_env(&self, component: &Component) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            env.insert(key.to_string(), value);
        };

        set("JOB", self.job.clone());
        set("COMPONENT", component.to_string());
        set("SCENARIO_PATH", self.scenario_path.display().to_string());
        set("LOG_PATH", self.log_file_for(component).display().to_string());
        let logging = self.logging_for(component);
        set("LOG_LEVEL_STDOUT", logging.stdout.to_string());
        set("LOG_LEVEL_FILE", logging.file.to_string());
        set("TRAIN_MODE", self.training.mode.to_string());

        let parallelism = self.rollout.parallelism.as_ref();
        let controller = parallelism.and_then(|p| p.controller.as_ref());
        let proxy = self.training.proxy.as_ref();

        match component {
            Component::Main => {
                if let Some(n) = self.main.num_episodes {
                    set("NUM_EPISODES", n.to_string());
                }
                if let Some(n) = self.main.num_steps {
                    set("NUM_STEPS", n.to_string());
                }
                if let Some(schedule) = &self.main.eval_schedule {
                    set("EVAL_SCHEDULE", schedule.to_env_value());
                }
                if let Some(path) = &self.training.load_path {
                    set("LOAD_PATH", path.display().to_string());
                }
                if let Some(ep) = self.training.load_episode {
                    set("LOAD_EPISODE", ep.to_string());
                }
                if let Some(c) = &self.training.checkpointing {
                    set("CHECKPOINT_PATH", c.path.display().to_string());
                    set("CHECKPOINT_INTERVAL", c.interval.to_string());
                }
                if let Some(p) = parallelism {
                    set("ENV_SAMPLE_PARALLELISM", p.sampling.to_string());
                    set("ENV_EVAL_PARALLELISM", p.eval_parallelism().to_string());
                    if let Some(min) = p.min_env_samples {
                        set("MIN_ENV_SAMPLES", min.to_string());
                    }
                    if let Some(grace) = p.grace_factor {
                        set("GRACE_FACTOR", grace.to_string());
                    }
                }
                if let Some(c) = controller {
                    set("ROLLOUT_CONTROLLER_PORT", c.port.to_string());
                }
                if self.training.mode == TrainingMode::Parallel {
                    if let Some(proxy) = proxy {
                        set("TRAIN_PROXY_HOST", proxy.host.clone());
                        set("TRAIN_PROXY_FRONTEND_PORT", proxy.frontend.to_string());
                    }
                }
            }
            Component::RolloutWorker(id) => {
                set("ID", id.to_string());
                if let Some(c) = controller {
                    set("ROLLOUT_CONTROLLER_HOST", c.host.clone());
                    set("ROLLOUT_CONTROLLER_PORT", c.port.to_string());
                }
            }
            Component::TrainProxy => {
                if let Some(proxy) = proxy {
                    set("TRAIN_PROXY_FRONTEND_PORT", proxy.frontend.to_string());
                    set("TRAIN_PROXY_BACKEND_PORT", proxy.backend.to_string());
                }
            }
            Component::TrainWorker(id) => {
                set("ID", id.to_string());
                if let Some(proxy) = proxy {
                    set("TRAIN_PROXY_HOST", proxy.host.clone());
                    set("TRAIN_PROXY_BACKEND_PORT", proxy.backend.to_string());
                }
            }
        }

        env
    }

    /// Environment of every component the workflow needs
    pub fn env_by_component(&self) -> BTreeMap<Component, BTreeMap<String, String>> {
        self.components()
            .into_iter()
            .map(|c| {
                let env = self.component_env(&c);
                (c, env)
            })
            .collect()
    }
}
