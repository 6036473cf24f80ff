use super::Dqn;
use crate::{model::SubModel1, util::OutDim};
use candle_core::Tensor;
use qlearn_core::{
    record::{Record, RecordValue},
    Env, EpsilonSchedule, ReplayBufferBase, TrainerHooks,
};
use serde::{de::DeserializeOwned, Serialize};

/// Trainer hooks setting the exploration rate of a DQN agent.
///
/// * prewarmup: `eps = 1`, warmup transitions are collected with random actions.
/// * precollect: `eps` follows `schedule`, recorded as `train/eps`.
/// * preupdate: `eps = 0`.
/// * pretest: `eps = eps_test`.
///
/// The save hook is left unset.
pub fn epsilon_hooks<E, Q, R>(
    schedule: EpsilonSchedule,
    eps_test: f64,
) -> TrainerHooks<Dqn<E, Q, R>>
where
    E: Env + 'static,
    Q: SubModel1<Output = Tensor> + 'static,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase + 'static,
{
    TrainerHooks::default()
        .prewarmup(|agent: &mut Dqn<E, Q, R>, _| {
            agent.set_eps(1.0);
            Ok(Record::from_scalar("train/eps", 1.0))
        })
        .precollect(move |agent: &mut Dqn<E, Q, R>, info| {
            let eps = schedule.value(info.epoch, info.env_steps);
            agent.set_eps(eps);
            Ok(Record::from_slice(&[("train/eps", RecordValue::Scalar(eps as f32))]))
        })
        .preupdate(|agent: &mut Dqn<E, Q, R>, _| {
            agent.set_eps(0.0);
            Ok(Record::empty())
        })
        .pretest(move |agent: &mut Dqn<E, Q, R>, _| {
            agent.set_eps(eps_test);
            Ok(Record::empty())
        })
}
