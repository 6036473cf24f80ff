//! Minimal environment, policies and buffers used in tests.
use crate::{
    record::Record,
    replay_buffer::{GenericTransitionBatch, SimpleStepProcessor, VecBatch},
    Act, Agent, Env, ExperienceBufferBase, Obs, Policy, ReplayBufferBase, Step,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{cell::Cell, fs, path::Path};

/// Observation of [`CountingEnv`], the number of steps taken in the episode.
#[derive(Clone, Debug, PartialEq)]
pub struct CountingObs(pub f32);

impl Obs for CountingObs {}

impl From<CountingObs> for VecBatch<f32> {
    fn from(obs: CountingObs) -> Self {
        vec![obs.0].into()
    }
}

/// Action of [`CountingEnv`], also the reward of the step.
#[derive(Clone, Debug, PartialEq)]
pub struct CountingAct(pub i64);

impl Act for CountingAct {}

impl From<CountingAct> for VecBatch<i64> {
    fn from(act: CountingAct) -> Self {
        vec![act.0].into()
    }
}

/// Configuration of [`CountingEnv`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CountingEnvConfig {
    /// Number of steps after which an episode terminates.
    pub episode_len: usize,
}

impl Default for CountingEnvConfig {
    fn default() -> Self {
        Self { episode_len: 10 }
    }
}

impl CountingEnvConfig {
    /// Sets the episode length.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }
}

/// An environment counting steps, terminating after a fixed number of them.
///
/// The reward of a step is the value of the action.
pub struct CountingEnv {
    episode_len: usize,
    t: usize,
}

impl Env for CountingEnv {
    type Config = CountingEnvConfig;
    type Obs = CountingObs;
    type Act = CountingAct;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            episode_len: config.episode_len,
            t: 0,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        self.t += 1;
        let is_terminated = (self.t >= self.episode_len) as i8;
        let step = Step::new(
            CountingObs(self.t as f32),
            a.clone(),
            vec![a.0 as f32],
            vec![is_terminated],
            vec![0],
            (),
            None,
        );
        Ok((step, Record::empty()))
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.t = 0;
        Ok(CountingObs(0.0))
    }

    fn reset_with_index(&mut self, _ix: usize) -> Result<Self::Obs> {
        self.reset()
    }
}

/// Transitions of [`CountingEnv`].
pub type CountingTransition = GenericTransitionBatch<VecBatch<f32>, VecBatch<i64>>;

/// Step processor for [`CountingEnv`].
pub type CountingStepProcessor = SimpleStepProcessor<CountingEnv, VecBatch<f32>, VecBatch<i64>>;

/// A policy always taking the same action.
pub struct ConstPolicy(pub i64);

impl Policy<CountingEnv> for ConstPolicy {
    fn sample(&mut self, _obs: &CountingObs) -> Result<CountingAct> {
        Ok(CountingAct(self.0))
    }
}

/// A buffer keeping every pushed transition.
#[derive(Default)]
pub struct DummyBuffer {
    /// Pushed transitions.
    pub items: Vec<CountingTransition>,
}

impl ExperienceBufferBase for DummyBuffer {
    type Item = CountingTransition;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.items.push(tr);
        Ok(())
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// An agent taking a fixed action and reporting scripted losses.
pub struct DummyAgent {
    /// Action taken by the policy.
    pub act: i64,

    /// Losses reported by successive optimization steps, cycled.
    pub losses: Vec<f32>,

    /// Number of optimization steps.
    pub n_opts: usize,

    /// Number of calls of [`Agent::save_params`].
    pub n_saves: Cell<usize>,

    train: bool,
}

impl DummyAgent {
    /// Creates an agent.
    pub fn new(act: i64, losses: Vec<f32>) -> Self {
        Self {
            act,
            losses,
            n_opts: 0,
            n_saves: Cell::new(0),
            train: true,
        }
    }
}

impl Policy<CountingEnv> for DummyAgent {
    fn sample(&mut self, _obs: &CountingObs) -> Result<CountingAct> {
        Ok(CountingAct(self.act))
    }
}

impl<R: ReplayBufferBase> Agent<CountingEnv, R> for DummyAgent {
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        let _batch = buffer.batch(1)?;
        let loss = self.losses[self.n_opts % self.losses.len()];
        self.n_opts += 1;
        Ok(Some(Record::from_scalar("loss", loss)))
    }

    /// Writes the action into `path/act.txt`.
    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        fs::write(path.join("act.txt"), self.act.to_string())?;
        self.n_saves.set(self.n_saves.get() + 1);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.act = fs::read_to_string(path.join("act.txt"))?.trim().parse()?;
        Ok(())
    }
}
