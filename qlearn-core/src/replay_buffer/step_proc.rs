//! Conversion of environment steps into transitions.
use super::{BatchBase, GenericTransitionBatch};
use crate::{Env, Obs, Step, StepProcessor};
use anyhow::{anyhow, Result};
use std::{default::Default, marker::PhantomData};

/// Configuration of [`SimpleStepProcessor`].
#[derive(Clone, Debug, Default)]
pub struct SimpleStepProcessorConfig {}

/// Builds 1-step transitions `(o_t, a_t, o_t+1, r_t)` from [`Step`] objects.
///
/// The processor keeps the previous observation. When an episode ends, it is
/// replaced with [`Step::init_obs`], the first observation of the next episode.
pub struct SimpleStepProcessor<E, O, A> {
    prev_obs: Option<O>,
    phantom: PhantomData<(E, A)>,
}

impl<E, O, A> StepProcessor<E> for SimpleStepProcessor<E, O, A>
where
    E: Env,
    O: BatchBase + TryFrom<E::Obs>,
    A: BatchBase + TryFrom<E::Act>,
    anyhow::Error: From<<O as TryFrom<E::Obs>>::Error> + From<<A as TryFrom<E::Act>>::Error>,
{
    type Config = SimpleStepProcessorConfig;
    type Output = GenericTransitionBatch<O, A>;

    fn build(_config: &Self::Config) -> Self {
        Self {
            prev_obs: None,
            phantom: PhantomData,
        }
    }

    fn reset(&mut self, init_obs: E::Obs) -> Result<()> {
        self.prev_obs = Some(O::try_from(init_obs)?);
        Ok(())
    }

    fn process(&mut self, step: Step<E>) -> Result<Self::Output> {
        debug_assert_eq!(step.obs.len(), 1);

        let is_done = step.is_done();
        let next_obs = O::try_from(step.obs.clone())?;
        let obs = self
            .prev_obs
            .replace(O::try_from(step.obs)?)
            .ok_or_else(|| anyhow!("The step processor has not been reset"))?;

        if is_done {
            let init_obs = step
                .init_obs
                .ok_or_else(|| anyhow!("The episode ended without an initial observation"))?;
            self.prev_obs.replace(O::try_from(init_obs)?);
        }

        Ok(GenericTransitionBatch {
            obs,
            act: A::try_from(step.act)?,
            next_obs,
            reward: step.reward,
            is_terminated: step.is_terminated,
            is_truncated: step.is_truncated,
            ix_sample: None,
            weight: None,
        })
    }
}
