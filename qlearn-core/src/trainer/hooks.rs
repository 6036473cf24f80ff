//! Hooks called by [`Trainer`](super::Trainer) at fixed points of an epoch.
use crate::record::Record;
use anyhow::Result;

/// Counters of a training run passed to hooks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochInfo {
    /// Current epoch, starting from 1. It is 0 during warmup.
    pub epoch: usize,

    /// Cumulative number of environment steps.
    pub env_steps: usize,

    /// Cumulative number of optimization steps.
    pub opt_steps: usize,
}

/// A hook receiving the agent and the counters.
///
/// The returned record is stored in the recorder, e.g. the exploration rate set by the hook.
pub type Hook<A> = Box<dyn FnMut(&mut A, &EpochInfo) -> Result<Record>>;

/// A hook called after testing with the best reward so far and the reward of the epoch.
///
/// Returns `false` to stop training.
pub type SaveHook<A> = Box<dyn FnMut(&A, &EpochInfo, f32, f32) -> Result<bool>>;

/// Hooks of [`Trainer::train`](super::Trainer::train).
pub struct TrainerHooks<A> {
    /// Called once before warmup collection.
    pub prewarmup: Option<Hook<A>>,

    /// Called before each collection round, typically sets the exploration rate.
    pub precollect: Option<Hook<A>>,

    /// Called before each round of optimization steps.
    pub preupdate: Option<Hook<A>>,

    /// Called before testing at the end of an epoch.
    pub pretest: Option<Hook<A>>,

    /// Called after testing with `(agent, info, best_reward, reward)`.
    ///
    /// When `None`, the agent is saved in `model_dir/best` if the reward strictly
    /// improves on the best reward, and training continues.
    pub save: Option<SaveHook<A>>,
}

impl<A> Default for TrainerHooks<A> {
    fn default() -> Self {
        Self {
            prewarmup: None,
            precollect: None,
            preupdate: None,
            pretest: None,
            save: None,
        }
    }
}

impl<A> TrainerHooks<A> {
    /// Sets the hook called before warmup.
    pub fn prewarmup(
        mut self,
        f: impl FnMut(&mut A, &EpochInfo) -> Result<Record> + 'static,
    ) -> Self {
        self.prewarmup = Some(Box::new(f));
        self
    }

    /// Sets the hook called before collection.
    pub fn precollect(
        mut self,
        f: impl FnMut(&mut A, &EpochInfo) -> Result<Record> + 'static,
    ) -> Self {
        self.precollect = Some(Box::new(f));
        self
    }

    /// Sets the hook called before optimization.
    pub fn preupdate(
        mut self,
        f: impl FnMut(&mut A, &EpochInfo) -> Result<Record> + 'static,
    ) -> Self {
        self.preupdate = Some(Box::new(f));
        self
    }

    /// Sets the hook called before testing.
    pub fn pretest(
        mut self,
        f: impl FnMut(&mut A, &EpochInfo) -> Result<Record> + 'static,
    ) -> Self {
        self.pretest = Some(Box::new(f));
        self
    }

    /// Sets the hook called after testing.
    pub fn save(
        mut self,
        f: impl FnMut(&A, &EpochInfo, f32, f32) -> Result<bool> + 'static,
    ) -> Self {
        self.save = Some(Box::new(f));
        self
    }
}

pub(super) fn call_hook<A>(
    hook: &mut Option<Hook<A>>,
    agent: &mut A,
    info: &EpochInfo,
) -> Result<Record> {
    match hook {
        Some(f) => f(agent, info),
        None => Ok(Record::empty()),
    }
}
