//! Collection of transitions from an environment.
use crate::{
    record::{Record, RecordValue},
    Env, ExperienceBufferBase, Policy, StepProcessor,
};
use anyhow::Result;
use log::trace;

/// Drives an environment with a policy and pushes the resulting transitions into a buffer.
///
/// The collector keeps the current observation across calls of [`Collector::collect`],
/// so an episode may span several calls. An episode ends when the environment
/// terminates or truncates it, or when it reaches `max_steps_per_episode` steps, in
/// which case the collector marks the last transition as truncated. The environment
/// is then reset and collection continues.
pub struct Collector<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    env: E,
    prev_obs: Option<E::Obs>,
    step_processor: P,
    max_steps_per_episode: Option<usize>,

    /// Cumulative number of environment steps.
    env_steps: usize,

    /// Cumulative number of finished episodes.
    episodes: usize,

    episode_return: f32,
    episode_len: usize,
}

impl<E, P> Collector<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    /// Creates a collector.
    pub fn new(env: E, step_processor: P, max_steps_per_episode: Option<usize>) -> Self {
        Self {
            env,
            prev_obs: None,
            step_processor,
            max_steps_per_episode,
            env_steps: 0,
            episodes: 0,
            episode_return: 0.0,
            episode_len: 0,
        }
    }

    /// Cumulative number of environment steps.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Cumulative number of finished episodes.
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Takes `n_steps` actions in the environment and pushes the transitions into `buffer`.
    ///
    /// Actions are sampled from `policy` with its current exploration setting.
    /// The returned record contains the cumulative counters `collect/env_steps` and
    /// `collect/episodes`, and the mean return and length of the episodes finished
    /// during the call (`collect/episode_return`, `collect/episode_length`), if any.
    pub fn collect<A, R>(&mut self, policy: &mut A, buffer: &mut R, n_steps: usize) -> Result<Record>
    where
        A: Policy<E>,
        R: ExperienceBufferBase<Item = P::Output>,
    {
        let mut returns = vec![];
        let mut lengths = vec![];

        for _ in 0..n_steps {
            let obs = match self.prev_obs.take() {
                Some(obs) => obs,
                None => {
                    let obs = self.env.reset()?;
                    self.step_processor.reset(obs.clone())?;
                    obs
                }
            };

            let act = policy.sample(&obs)?;
            let (mut step, _) = self.env.step(&act)?;
            self.env_steps += 1;
            self.episode_len += 1;
            self.episode_return += step.reward[0];

            if !step.is_done()
                && matches!(self.max_steps_per_episode, Some(m) if self.episode_len >= m)
            {
                step.is_truncated[0] = 1;
            }

            let is_done = step.is_done();
            if is_done {
                let init_obs = self.env.reset()?;
                self.prev_obs = Some(init_obs.clone());
                step.init_obs = Some(init_obs);

                trace!(
                    "Episode {} finished: return = {}, length = {}",
                    self.episodes,
                    self.episode_return,
                    self.episode_len
                );
                returns.push(self.episode_return);
                lengths.push(self.episode_len as f32);
                self.episodes += 1;
                self.episode_return = 0.0;
                self.episode_len = 0;
            } else {
                self.prev_obs = Some(step.obs.clone());
            }

            let transition = self.step_processor.process(step)?;
            buffer.push(transition)?;
        }

        let mut record = Record::from_slice(&[
            ("collect/env_steps", RecordValue::Scalar(self.env_steps as f32)),
            ("collect/episodes", RecordValue::Scalar(self.episodes as f32)),
        ]);
        if !returns.is_empty() {
            let n = returns.len() as f32;
            record.insert(
                "collect/episode_return",
                RecordValue::Scalar(returns.iter().sum::<f32>() / n),
            );
            record.insert(
                "collect/episode_length",
                RecordValue::Scalar(lengths.iter().sum::<f32>() / n),
            );
        }

        Ok(record)
    }
}
