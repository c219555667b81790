//! Evaluation and checkpoint schedules
//!
//! Episodes are numbered from 1. An interval schedule `n` selects every
//! episode that is a multiple of `n`; a list selects exactly the listed
//! episodes. A single-element list `[n]` is read as the interval `n`, so
//! `eval_schedule: 5` and `eval_schedule: [5]` plan the same evaluations.

use serde::Serialize;

use crate::workflow::{Checkpointing, EvalSchedule, Workflow};

impl EvalSchedule {
    /// Canonical form: single-element lists become intervals, other lists are
    /// sorted and deduplicated
    pub fn normalized(&self) -> EvalSchedule {
        match self {
            Self::Interval(n) => Self::Interval(*n),
            Self::Episodes(episodes) if episodes.len() == 1 => Self::Interval(episodes[0]),
            Self::Episodes(episodes) => {
                let mut episodes = episodes.clone();
                episodes.sort_unstable();
                episodes.dedup();
                Self::Episodes(episodes)
            }
        }
    }

    /// Whether evaluation runs after `episode`
    pub fn is_eval_episode(&self, episode: u32) -> bool {
        self.normalized().selects(episode)
    }

    /// Membership test on a schedule already in canonical form
    fn selects(&self, episode: u32) -> bool {
        match self {
            _ if episode == 0 => false,
            Self::Interval(0) => false,
            Self::Interval(n) => episode % n == 0,
            Self::Episodes(episodes) => episodes.binary_search(&episode).is_ok(),
        }
    }

    /// Evaluation episodes within a run of `num_episodes` episodes, in order
    pub fn episodes(&self, num_episodes: u32) -> Box<dyn Iterator<Item = u32>> {
        self.normalized().episodes_between(1, num_episodes)
    }

    fn episodes_between(self, first: u32, last: u32) -> Box<dyn Iterator<Item = u32>> {
        match self {
            Self::Interval(n) => Box::new(multiples(n, first, last)),
            Self::Episodes(episodes) => Box::new(
                episodes
                    .into_iter()
                    .filter(move |&ep| ep >= first.max(1) && ep <= last),
            ),
        }
    }

    /// Space-separated form handed to runner processes
    pub fn to_env_value(&self) -> String {
        match self.normalized() {
            Self::Interval(n) => n.to_string(),
            Self::Episodes(episodes) => episodes
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Multiples of `n` in `first..=last`; empty for `n == 0`
fn multiples(n: u32, first: u32, last: u32) -> impl Iterator<Item = u32> {
    let n = u64::from(n);
    let start = if n == 0 {
        u64::MAX
    } else {
        u64::from(first.max(1)).div_ceil(n) * n
    };
    (start..=u64::from(last))
        .step_by(n.max(1) as usize)
        .filter_map(|ep| u32::try_from(ep).ok())
}

impl Checkpointing {
    /// Whether a checkpoint is written after `episode`
    pub fn is_checkpoint_episode(&self, episode: u32) -> bool {
        episode > 0 && self.interval > 0 && episode % self.interval == 0
    }
}

/// What happens at the end of one episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeStep {
    pub episode: u32,
    pub evaluate: bool,
    pub checkpoint: bool,
}

/// The episodes a bounded run will execute
///
/// Steps are computed on demand, so a plan over `u32::MAX` episodes costs no
/// more than one over ten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodePlan {
    /// First episode to run; later than 1 when resuming
    pub first_episode: u32,
    pub last_episode: u32,
    pub max_steps: Option<u32>,
    /// Evaluation schedule in canonical form
    pub eval_schedule: Option<EvalSchedule>,
    pub checkpoint_interval: Option<u32>,
}

impl EpisodePlan {
    /// Number of episodes to run
    pub fn len(&self) -> u64 {
        if self.first_episode > self.last_episode {
            0
        } else {
            u64::from(self.last_episode - self.first_episode) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn step(&self, episode: u32) -> EpisodeStep {
        EpisodeStep {
            episode,
            evaluate: self
                .eval_schedule
                .as_ref()
                .is_some_and(|s| s.selects(episode)),
            checkpoint: self
                .checkpoint_interval
                .is_some_and(|n| episode > 0 && n > 0 && episode % n == 0),
        }
    }

    /// Every episode of the run
    pub fn steps(&self) -> impl Iterator<Item = EpisodeStep> + '_ {
        (self.first_episode..=self.last_episode).map(|ep| self.step(ep))
    }

    pub fn eval_episodes(&self) -> Box<dyn Iterator<Item = u32>> {
        match &self.eval_schedule {
            Some(schedule) => schedule
                .clone()
                .episodes_between(self.first_episode, self.last_episode),
            None => Box::new(std::iter::empty()),
        }
    }

    pub fn checkpoint_episodes(&self) -> impl Iterator<Item = u32> {
        let interval = self.checkpoint_interval.unwrap_or(0);
        multiples(interval, self.first_episode, self.last_episode)
    }

    /// Episodes that evaluate, checkpoint, or both, in order
    pub fn events(&self) -> impl Iterator<Item = EpisodeStep> + '_ {
        let mut evals = self.eval_episodes().peekable();
        let mut checkpoints = self.checkpoint_episodes().peekable();
        std::iter::from_fn(move || {
            let episode = match (evals.peek(), checkpoints.peek()) {
                (Some(&e), Some(&c)) => e.min(c),
                (Some(&e), None) => e,
                (None, Some(&c)) => c,
                (None, None) => return None,
            };
            evals.next_if_eq(&episode);
            checkpoints.next_if_eq(&episode);
            Some(self.step(episode))
        })
    }
}

impl Workflow {
    /// Episode after which training resumes; 1 for a fresh run
    pub fn first_episode(&self) -> u32 {
        match (&self.training.load_path, self.training.load_episode) {
            (Some(_), Some(ep)) => ep.saturating_add(1),
            _ => 1,
        }
    }

    /// Plan of the run, or `None` when `num_episodes` is left to the runner
    pub fn episode_plan(&self) -> Option<EpisodePlan> {
        let last_episode = self.main.num_episodes?;
        Some(EpisodePlan {
            first_episode: self.first_episode(),
            last_episode,
            max_steps: self.main.num_steps,
            eval_schedule: self.main.eval_schedule.as_ref().map(EvalSchedule::normalized),
            checkpoint_interval: self.training.checkpointing.as_ref().map(|c| c.interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn collect(episodes: impl Iterator<Item = u32>) -> Vec<u32> {
        episodes.collect()
    }

    #[test]
    fn test_interval_expansion() {
        let schedule = EvalSchedule::Interval(5);
        assert_eq!(collect(schedule.episodes(30)), vec![5, 10, 15, 20, 25, 30]);
        assert_eq!(collect(schedule.episodes(12)), vec![5, 10]);
        assert_eq!(schedule.episodes(4).count(), 0);
    }

    #[test]
    fn test_scalar_and_single_element_list_match() {
        let scalar = EvalSchedule::Interval(5);
        let list = EvalSchedule::Episodes(vec![5]);
        assert_eq!(scalar.normalized(), list.normalized());
        assert_eq!(collect(scalar.episodes(30)), collect(list.episodes(30)));
        assert_eq!(scalar.to_env_value(), list.to_env_value());
    }

    #[test]
    fn test_explicit_list() {
        let schedule = EvalSchedule::Episodes(vec![20, 3, 20, 7]);
        assert_eq!(
            schedule.normalized(),
            EvalSchedule::Episodes(vec![3, 7, 20])
        );
        assert!(schedule.is_eval_episode(7));
        assert!(!schedule.is_eval_episode(14));
        assert_eq!(collect(schedule.episodes(10)), vec![3, 7]);
        assert_eq!(schedule.to_env_value(), "3 7 20");
    }

    #[test]
    fn test_episode_zero_never_evaluates() {
        assert!(!EvalSchedule::Interval(5).is_eval_episode(0));
        assert!(!EvalSchedule::Interval(0).is_eval_episode(10));
        assert_eq!(EvalSchedule::Interval(0).episodes(10).count(), 0);
    }

    #[test]
    fn test_checkpoint_interval() {
        let c = Checkpointing {
            path: PathBuf::from("checkpoint"),
            interval: 5,
        };
        assert!(!c.is_checkpoint_episode(0));
        assert!(!c.is_checkpoint_episode(4));
        assert!(c.is_checkpoint_episode(5));
        assert!(c.is_checkpoint_episode(30));
    }

    #[test]
    fn test_plan_requires_num_episodes() {
        let wf = Workflow::new("job", "scenario", "log");
        assert!(wf.episode_plan().is_none());
    }

    #[test]
    fn test_plan_resumes_after_load_episode() {
        let mut wf = Workflow::new("job", "scenario", "log");
        wf.main.num_episodes = Some(10);
        wf.main.eval_schedule = Some(EvalSchedule::Interval(4));
        wf.training.load_path = Some(PathBuf::from("models"));
        wf.training.load_episode = Some(6);
        wf.training.checkpointing = Some(Checkpointing {
            path: PathBuf::from("checkpoint"),
            interval: 3,
        });

        let plan = wf.episode_plan().unwrap();
        assert_eq!(plan.first_episode, 7);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.steps().count(), 4);
        assert_eq!(collect(plan.eval_episodes()), vec![8]);
        assert_eq!(collect(plan.checkpoint_episodes()), vec![9]);

        let events: Vec<u32> = plan.events().map(|s| s.episode).collect();
        assert_eq!(events, vec![8, 9]);
        assert!(plan.step(8).evaluate && !plan.step(8).checkpoint);
    }

    #[test]
    fn test_plan_stores_normalized_schedule() {
        let mut wf = Workflow::new("job", "scenario", "log");
        wf.main.num_episodes = Some(20);
        wf.main.eval_schedule = Some(EvalSchedule::Episodes(vec![15, 5, 15]));
        let plan = wf.episode_plan().unwrap();
        assert_eq!(plan.eval_schedule, Some(EvalSchedule::Episodes(vec![5, 15])));
        assert_eq!(collect(plan.eval_episodes()), vec![5, 15]);
    }

    #[test]
    fn test_events_merge_shared_episodes() {
        let mut wf = Workflow::new("job", "scenario", "log");
        wf.main.num_episodes = Some(12);
        wf.main.eval_schedule = Some(EvalSchedule::Interval(4));
        wf.training.checkpointing = Some(Checkpointing {
            path: PathBuf::from("checkpoint"),
            interval: 6,
        });
        let events: Vec<EpisodeStep> = wf.episode_plan().unwrap().events().collect();
        let episodes: Vec<u32> = events.iter().map(|s| s.episode).collect();
        assert_eq!(episodes, vec![4, 6, 8, 12]);
        assert!(events[3].evaluate && events[3].checkpoint);
    }

    #[test]
    fn test_plan_over_every_episode_is_lazy() {
        let mut wf = Workflow::new("job", "scenario", "log");
        wf.main.num_episodes = Some(u32::MAX);
        wf.main.eval_schedule = Some(EvalSchedule::Episodes(vec![10, u32::MAX]));
        wf.training.checkpointing = Some(Checkpointing {
            path: PathBuf::from("checkpoint"),
            interval: u32::MAX / 2,
        });
        assert!(wf.validate().is_ok());

        let plan = wf.episode_plan().unwrap();
        assert_eq!(plan.len(), u64::from(u32::MAX));
        assert_eq!(plan.steps().take(3).count(), 3);
        let events: Vec<u32> = plan.events().map(|s| s.episode).collect();
        assert_eq!(events, vec![10, u32::MAX / 2, u32::MAX - 1, u32::MAX]);
    }

    #[test]
    fn test_load_episode_without_path_starts_fresh() {
        let mut wf = Workflow::new("job", "scenario", "log");
        wf.training.load_episode = Some(6);
        assert_eq!(wf.first_episode(), 1);
    }
}
