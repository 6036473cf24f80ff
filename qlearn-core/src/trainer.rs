//! Training loop.
mod config;
mod hooks;
use crate::{
    evaluator::Evaluator,
    record::{AggregateRecorder, Record, RecordValue},
    Agent, Collector, Env, ExperienceBufferBase, ReplayBufferBase, StepProcessor, StorageConfig,
};
use anyhow::Result;
pub use config::TrainerConfig;
use hooks::call_hook;
pub use hooks::{EpochInfo, Hook, SaveHook, TrainerHooks};
use log::{info, warn};

/// Why a training run finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// All configured epochs were run.
    Completed,

    /// A loss exceeded [`TrainerConfig::max_loss`].
    LossDiverged,

    /// The save hook returned `false`.
    StoppedByHook,
}

/// Summary of a training run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainResult {
    /// Best test reward, `f32::NEG_INFINITY` if no epoch was tested.
    pub best_reward: f32,

    /// Number of finished epochs.
    pub epochs: usize,

    /// Number of environment steps.
    pub env_steps: usize,

    /// Number of optimization steps.
    pub opt_steps: usize,

    /// Why the run finished.
    pub stop_reason: StopReason,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs epochs of collection, optimization and testing.
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Warmup
///     Warmup --> Collect
///     Collect --> Update
///     Update --> Collect: steps_per_epoch rounds
///     Update --> Test
///     Update --> [*]: loss > max_loss
///     Test --> Checkpoint
///     Checkpoint --> Collect: next epoch
///     Checkpoint --> [*]: last epoch or save hook returns false
/// ```
///
/// * Warmup: the collector fills the buffer up to `warmup_size` transitions,
///   after the `prewarmup` hook. No optimization step is taken.
/// * Collect: the `precollect` hook, then `collect_per_step` environment steps.
/// * Update: the `preupdate` hook, then `update_per_step` optimization steps.
///   Steps skipped by the agent are not counted.
/// * Test: the `pretest` hook, then the evaluator scores the agent in evaluation mode.
/// * Checkpoint: the `save` hook decides whether training continues. Without the
///   hook, the agent is saved in `model_dir/best` when the reward strictly improves.
///
/// Records of an epoch are stored in the recorder and flushed at the end of the epoch
/// with the number of environment steps. Optimization records are prefixed with `opt/`.
pub struct Trainer {
    config: TrainerConfig,
    storage: StorageConfig,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig, storage: StorageConfig) -> Self {
        Self { config, storage }
    }

    fn save_best<E, R, A>(&self, agent: &A) -> Result<()>
    where
        E: Env,
        R: ReplayBufferBase,
        A: Agent<E, R>,
    {
        let path = self.storage.checkpoint_dir("best");
        agent.save_params(&path)?;
        info!("Saved the model in {:?}", &path);
        Ok(())
    }

    /// Optimization steps of a round, returns `true` if a loss diverged.
    fn update<E, R, A>(
        &self,
        agent: &mut A,
        buffer: &mut R,
        recorder: &mut dyn AggregateRecorder,
        opt_steps: &mut usize,
    ) -> Result<bool>
    where
        E: Env,
        R: ReplayBufferBase,
        A: Agent<E, R>,
    {
        for _ in 0..self.config.update_per_step {
            let record = match agent.opt_with_record(buffer)? {
                Some(record) => record,
                None => continue,
            };
            *opt_steps += 1;

            let loss = record.get_scalar("loss")?;
            let mut prefixed = Record::empty();
            for (k, v) in record.into_iter_in_record() {
                prefixed.insert(format!("opt/{}", k), v);
            }
            recorder.store(prefixed);

            if let Some(max_loss) = self.config.max_loss {
                if loss.is_nan() || loss > max_loss {
                    warn!(
                        "Loss {} exceeded {} at optimization step {}, training stops",
                        loss, max_loss, opt_steps
                    );
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Trains the agent.
    ///
    /// `env` and `step_proc` are owned by the collector created for the run.
    #[allow(clippy::too_many_arguments)]
    pub fn train<E, P, R, A, D>(
        &mut self,
        env: E,
        step_proc: P,
        agent: &mut A,
        buffer: &mut R,
        recorder: &mut dyn AggregateRecorder,
        evaluator: &mut D,
        hooks: &mut TrainerHooks<A>,
    ) -> Result<TrainResult>
    where
        E: Env,
        P: StepProcessor<E>,
        R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
        A: Agent<E, R>,
        D: Evaluator<E>,
    {
        let mut collector = Collector::new(env, step_proc, self.config.max_steps_per_episode);
        let mut opt_steps = 0;
        let mut best_reward = f32::NEG_INFINITY;
        let mut epochs = 0;
        let mut stop_reason = StopReason::Completed;
        let info = |epoch: usize, collector: &Collector<E, P>, opt_steps: usize| EpochInfo {
            epoch,
            env_steps: collector.env_steps(),
            opt_steps,
        };

        agent.train();

        if buffer.len() < self.config.warmup_size {
            let record = call_hook(&mut hooks.prewarmup, agent, &info(0, &collector, 0))?;
            recorder.store(record);
            let n_steps = self.config.warmup_size - buffer.len();
            let record = collector.collect(agent, buffer, n_steps)?;
            recorder.store(record);
            info!("Collected {} transitions for warmup", buffer.len());
        }

        for epoch in 1..=self.config.epochs {
            let mut diverged = false;

            for _ in 0..self.config.steps_per_epoch {
                let i = info(epoch, &collector, opt_steps);
                let record = call_hook(&mut hooks.precollect, agent, &i)?;
                recorder.store(record);
                let record = collector.collect(agent, buffer, self.config.collect_per_step)?;
                recorder.store(record);

                let i = info(epoch, &collector, opt_steps);
                let record = call_hook(&mut hooks.preupdate, agent, &i)?;
                recorder.store(record);
                if self.update::<E, R, A>(agent, buffer, recorder, &mut opt_steps)? {
                    diverged = true;
                    break;
                }
            }

            if diverged {
                stop_reason = StopReason::LossDiverged;
                recorder.flush(collector.env_steps() as i64);
                break;
            }

            let i = info(epoch, &collector, opt_steps);
            let record = call_hook(&mut hooks.pretest, agent, &i)?;
            recorder.store(record);
            agent.eval();
            let (reward, record) = evaluator.evaluate(agent)?;
            agent.train();
            recorder.store(record);

            let cont = match hooks.save.as_mut() {
                Some(f) => f(&*agent, &i, best_reward, reward)?,
                None => {
                    if reward > best_reward {
                        self.save_best::<E, R, A>(agent)?;
                    }
                    true
                }
            };
            if reward > best_reward {
                best_reward = reward;
            }
            epochs = epoch;

            info!(
                "Epoch {}: test reward = {:.3}, best = {:.3}, env steps = {}, opt steps = {}",
                epoch,
                reward,
                best_reward,
                collector.env_steps(),
                opt_steps
            );
            recorder.store(Record::from_slice(&[
                ("test/best_reward", RecordValue::Scalar(best_reward)),
                ("train/epoch", RecordValue::Scalar(epoch as f32)),
                ("train/opt_steps", RecordValue::Scalar(opt_steps as f32)),
            ]));
            recorder.flush(collector.env_steps() as i64);

            if !cont {
                stop_reason = StopReason::StoppedByHook;
                break;
            }
        }

        Ok(TrainResult {
            best_reward,
            epochs,
            env_steps: collector.env_steps(),
            opt_steps,
            stop_reason,
        })
    }
}
