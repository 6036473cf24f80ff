use super::Evaluator;
use crate::{
    record::{Record, RecordValue},
    Env, Policy,
};
use anyhow::Result;

/// Runs a fixed number of episodes and scores the policy with their mean return.
///
/// Episode `ix` starts from [`Env::reset_with_index`] with `ix`, so that scores of
/// different epochs are measured on the same initial states.
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    max_steps_per_episode: Option<usize>,
    env: E,
}

impl<E: Env> DefaultEvaluator<E> {
    /// Builds an environment for evaluation.
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            max_steps_per_episode: None,
            env: E::build(config, seed)?,
        })
    }

    /// Ends episodes after the given number of steps.
    pub fn max_steps_per_episode(mut self, v: Option<usize>) -> Self {
        self.max_steps_per_episode = v;
        self
    }
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    /// Returns the mean return. The record contains `test/reward`, `test/reward_std`
    /// and `test/episode_length`.
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<(f32, Record)> {
        let mut returns = Vec::with_capacity(self.n_episodes);
        let mut lengths = Vec::with_capacity(self.n_episodes);

        for ix in 0..self.n_episodes {
            let mut prev_obs = self.env.reset_with_index(ix)?;
            let mut r_total = 0f32;
            let mut len = 0;

            loop {
                let act = policy.sample(&prev_obs)?;
                let (step, _) = self.env.step(&act)?;
                r_total += step.reward[0];
                len += 1;
                let is_done = step.is_done()
                    || matches!(self.max_steps_per_episode, Some(m) if len >= m);
                if is_done {
                    break;
                }
                prev_obs = step.obs;
            }

            returns.push(r_total);
            lengths.push(len as f32);
        }

        let n = self.n_episodes.max(1) as f32;
        let mean = returns.iter().sum::<f32>() / n;
        let std = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f32>() / n).sqrt();
        let record = Record::from_slice(&[
            ("test/reward", RecordValue::Scalar(mean)),
            ("test/reward_std", RecordValue::Scalar(std)),
            (
                "test/episode_length",
                RecordValue::Scalar(lengths.iter().sum::<f32>() / n),
            ),
        ]);

        Ok((mean, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{ConstPolicy, CountingEnv, CountingEnvConfig};

    #[test]
    fn test_default_evaluator() {
        let config = CountingEnvConfig::default().episode_len(5);
        let mut evaluator = DefaultEvaluator::<CountingEnv>::new(&config, 0, 3).unwrap();

        let (score, record) = evaluator.evaluate(&mut ConstPolicy(2)).unwrap();
        assert_eq!(score, 10.0);
        assert_eq!(record.get_scalar("test/reward_std").unwrap(), 0.0);
        assert_eq!(record.get_scalar("test/episode_length").unwrap(), 5.0);

        let mut evaluator = evaluator.max_steps_per_episode(Some(2));
        let (score, _) = evaluator.evaluate(&mut ConstPolicy(2)).unwrap();
        assert_eq!(score, 4.0);
    }
}
