//! DQN agent implemented with candle.
use super::{
    config::DqnConfig,
    explorer::EpsilonGreedy,
    kind::DqnKind,
    model::DqnModel,
    snapshot::{ParamSnapshot, QNET_FILE, QNET_TGT_FILE},
    target::TargetUpdater,
};
use crate::{
    model::SubModel1,
    util::{insert_stats, CriticLoss, OutDim},
};
use anyhow::Result;
use candle_core::{shape::D, DType, Device, Tensor};
use log::{info, trace};
use qlearn_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, ExperienceBufferBase, Policy, ReplayBufferBase, TransitionBatch,
};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{marker::PhantomData, path::Path};

#[allow(clippy::upper_case_acronyms)]
/// DQN agent implemented with candle.
///
/// The variant of the algorithm is given by [`DqnKind`]. Only [`DqnKind::Double`]
/// holds a target network, updated by [`TargetUpdater`] after every optimization step.
///
/// Observations are converted into the input of the Q-network and action tensors
/// into actions of the environment with [`TryFrom`], so environments provide the
/// conversions for their types.
pub struct Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
{
    pub(in crate::dqn) kind: DqnKind,
    pub(in crate::dqn) qnet: DqnModel<Q>,
    pub(in crate::dqn) qnet_tgt: Option<DqnModel<Q>>,
    pub(in crate::dqn) target_updater: Option<TargetUpdater>,
    pub(in crate::dqn) min_transitions_warmup: usize,
    pub(in crate::dqn) batch_size: usize,
    pub(in crate::dqn) discount_factor: f64,
    pub(in crate::dqn) explorer: EpsilonGreedy,
    pub(in crate::dqn) critic_loss: CriticLoss,
    pub(in crate::dqn) device: Device,
    pub(in crate::dqn) train: bool,
    pub(in crate::dqn) n_opts: usize,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
{
    /// Returns the exploration rate.
    pub fn eps(&self) -> f64 {
        self.explorer.eps()
    }

    /// Sets the exploration rate.
    pub fn set_eps(&mut self, eps: f64) {
        self.explorer.set_eps(eps);
    }

    /// Returns the variant of DQN.
    pub fn kind(&self) -> DqnKind {
        self.kind
    }

    /// Returns the number of optimization steps.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Returns the online network.
    pub fn qnet(&self) -> &DqnModel<Q> {
        &self.qnet
    }

    /// Returns the target network, available for [`DqnKind::Double`].
    pub fn qnet_tgt(&self) -> Option<&DqnModel<Q>> {
        self.qnet_tgt.as_ref()
    }

    /// Returns a copy of the parameters on the CPU.
    pub fn snapshot(&self) -> Result<ParamSnapshot> {
        ParamSnapshot::new(
            self.qnet.get_varmap(),
            self.qnet_tgt.as_ref().map(|q| q.get_varmap()),
        )
    }
}

impl<E, Q, R> Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ExperienceBufferBase + ReplayBufferBase,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
    fn update_critic(&mut self, buffer: &mut R) -> Result<Record> {
        let batch = buffer.batch(self.batch_size)?;
        let (obs, act, next_obs, reward, is_terminated, is_truncated, ixs, weight) = batch.unpack();
        let n = reward.len();
        let obs: Q::Input = obs.try_into()?;
        let act: Tensor = act.try_into()?;
        let act = act
            .to_device(&self.device)?
            .to_dtype(DType::I64)?
            .reshape((n, 1))?;
        let next_obs: Q::Input = next_obs.try_into()?;
        let reward = Tensor::from_vec(reward, (n,), &self.device)?;
        let not_done = {
            let not_done = is_terminated
                .iter()
                .zip(is_truncated.iter())
                .map(|(&t, &u)| if t == 1 || u == 1 { 0f32 } else { 1f32 })
                .collect::<Vec<_>>();
            Tensor::from_vec(not_done, (n,), &self.device)?
        };

        let pred = self
            .qnet
            .forward(&obs)?
            .gather(&act, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            let q_next = self.qnet.forward(&next_obs)?.detach();
            let q_next_tgt = match &self.qnet_tgt {
                Some(qnet_tgt) => Some(qnet_tgt.forward(&next_obs)?.detach()),
                None => None,
            };
            self.kind.compute_target(
                &q_next,
                q_next_tgt.as_ref(),
                &reward,
                &not_done,
                self.discount_factor,
            )?
        };

        let td_err = (&pred - &tgt)?.detach();
        let losses = self.critic_loss.elementwise(&pred, &tgt)?;
        let loss = match &weight {
            Some(ws) => {
                let ws = Tensor::from_slice(&ws[..], (n,), &self.device)?;
                (losses * ws)?.mean_all()?
            }
            None => losses.mean_all()?,
        };

        self.qnet.backward_step(&loss)?;

        let td_err = td_err.to_device(&Device::Cpu)?.to_vec1::<f32>()?;
        buffer.update_priority(&ixs, &Some(td_err.clone()))?;

        let mut record = Record::from_slice(&[(
            "loss",
            RecordValue::Scalar(loss.to_device(&Device::Cpu)?.to_scalar::<f32>()?),
        )]);
        insert_stats(&mut record, "td_err", &td_err);
        if let Some(ws) = &weight {
            insert_stats(&mut record, "weight", ws);
        }

        Ok(record)
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let record = self.update_critic(buffer)?;

        if let (Some(updater), Some(qnet_tgt)) = (&mut self.target_updater, &self.qnet_tgt) {
            if updater.on_update(qnet_tgt.get_varmap(), self.qnet.get_varmap())? {
                trace!("Updated the target network at optimization step {}", self.n_opts + 1);
            }
        }

        self.n_opts += 1;
        Ok(record)
    }
}

impl<E, Q, R> Configurable<E> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
{
    type Config = DqnConfig<Q::Config>;

    /// Constructs DQN agent.
    ///
    /// For [`DqnKind::Double`], the target network starts as a copy of the online
    /// network. Fails with [`InvalidConfig`](qlearn_core::error::QlError::InvalidConfig)
    /// if `tau` or `target_update_freq` is invalid.
    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.unwrap_or_default().build()?;
        let qnet = DqnModel::build(config.model_config.clone(), device.clone())?;
        let (qnet_tgt, target_updater) = match config.kind.uses_target_network() {
            true => {
                let updater = TargetUpdater::new(config.tau, config.target_update_freq)?;
                let qnet_tgt = DqnModel::build(config.model_config, device.clone())?;
                qnet_tgt.copy_from(&qnet)?;
                (Some(qnet_tgt), Some(updater))
            }
            false => (None, None),
        };

        Ok(Dqn {
            kind: config.kind,
            qnet,
            qnet_tgt,
            target_updater,
            min_transitions_warmup: config.min_transitions_warmup,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            explorer: EpsilonGreedy::new(config.eps),
            critic_loss: config.critic_loss,
            device,
            train: config.train,
            n_opts: 0,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<E, Q, R> Policy<E> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
{
    /// Takes an epsilon-greedy action with the current exploration rate,
    /// both in training and evaluation mode.
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        let obs: Q::Input = obs.clone().try_into()?;
        let q = self.qnet.forward(&obs)?;
        let a = self.explorer.action(&q, &mut self.rng)?;
        E::Act::try_from(a)
    }
}

impl<E, Q, R> Agent<E, R> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ExperienceBufferBase + ReplayBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
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
        if buffer.len() < self.min_transitions_warmup.max(self.batch_size) {
            return Ok(None);
        }
        Ok(Some(self.opt_(buffer)?))
    }

    /// Writes `qnet.safetensors`, and `qnet_tgt.safetensors` for double DQN.
    fn save_params(&self, path: &Path) -> Result<()> {
        self.snapshot()?.save(path)
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join(QNET_FILE))?;
        if let Some(qnet_tgt) = &mut self.qnet_tgt {
            let path_tgt = path.join(QNET_TGT_FILE);
            if path_tgt.exists() {
                qnet_tgt.load(&path_tgt)?;
            } else {
                info!("{:?} is not found, the target network copies the online network", path_tgt);
                qnet_tgt.copy_from(&self.qnet)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dqn::DqnModelConfig,
        mlp::{Mlp, MlpConfig},
        opt::OptimizerConfig,
        TensorBatch,
    };
    use anyhow::anyhow;
    use qlearn_core::{
        replay_buffer::{
            PerConfig, SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
            SimpleStepProcessorConfig,
        },
        Act, Collector, Obs, Step, StepProcessor,
    };
    use tempdir::TempDir;

    #[derive(Clone, Debug)]
    struct ChainObs(f32);

    impl Obs for ChainObs {}

    #[derive(Clone, Debug)]
    struct ChainAct(i64);

    impl Act for ChainAct {}

    impl TryFrom<ChainObs> for Tensor {
        type Error = anyhow::Error;

        fn try_from(obs: ChainObs) -> Result<Self> {
            Ok(Tensor::from_slice(&[obs.0], (1, 1), &Device::Cpu)?)
        }
    }

    impl TryFrom<ChainObs> for TensorBatch {
        type Error = anyhow::Error;

        fn try_from(obs: ChainObs) -> Result<Self> {
            Ok(TensorBatch::from_tensor(obs.try_into()?))
        }
    }

    impl TryFrom<ChainAct> for TensorBatch {
        type Error = anyhow::Error;

        fn try_from(act: ChainAct) -> Result<Self> {
            let t = Tensor::from_slice(&[act.0], (1, 1), &Device::Cpu)?;
            Ok(TensorBatch::from_tensor(t))
        }
    }

    impl TryFrom<Tensor> for ChainAct {
        type Error = anyhow::Error;

        fn try_from(t: Tensor) -> Result<Self> {
            let a = t.flatten_all()?.to_vec1::<i64>()?;
            Ok(ChainAct(*a.first().ok_or_else(|| anyhow!("no action"))?))
        }
    }

    /// Moves along a chain of 5 states, the reward is the action.
    struct ChainEnv {
        t: usize,
    }

    impl Env for ChainEnv {
        type Config = ();
        type Obs = ChainObs;
        type Act = ChainAct;
        type Info = ();

        fn build(_config: &Self::Config, _seed: i64) -> Result<Self> {
            Ok(Self { t: 0 })
        }

        fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
            self.t += 1;
            let step = Step::new(
                ChainObs(self.t as f32 / 5.0),
                a.clone(),
                vec![a.0 as f32],
                vec![(self.t >= 5) as i8],
                vec![0],
                (),
                None,
            );
            Ok((step, Record::empty()))
        }

        fn reset(&mut self) -> Result<Self::Obs> {
            self.t = 0;
            Ok(ChainObs(0.0))
        }

        fn reset_with_index(&mut self, _ix: usize) -> Result<Self::Obs> {
            self.reset()
        }
    }

    type Buffer = SimpleReplayBuffer<TensorBatch, TensorBatch>;
    type StepProc = SimpleStepProcessor<ChainEnv, TensorBatch, TensorBatch>;
    type ChainDqn = Dqn<ChainEnv, Mlp, Buffer>;

    fn config(kind: DqnKind) -> DqnConfig<MlpConfig> {
        DqnConfig::default()
            .model_config(
                DqnModelConfig::default()
                    .q_config(MlpConfig::new(1, vec![8], 2))
                    .opt_config(OptimizerConfig::Adam { lr: 1e-2 }),
            )
            .kind(kind)
            .batch_size(4)
            .min_transitions_warmup(8)
            .device(crate::Device::Cpu)
    }

    fn filled_buffer(n: usize, per_config: Option<PerConfig>) -> Result<Buffer> {
        let mut buffer = Buffer::build(
            &SimpleReplayBufferConfig::default()
                .capacity(100)
                .per_config(per_config),
        )?;
        let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
        let mut collector = Collector::new(ChainEnv::build(&(), 0)?, step_proc, None);
        let mut agent = ChainDqn::build(config(DqnKind::Vanilla).eps(1.0))?;
        collector.collect(&mut agent, &mut buffer, n)?;
        Ok(buffer)
    }

    fn q_values(model: &DqnModel<Mlp>) -> Result<Vec<f32>> {
        let xs = Tensor::from_slice(&[0.0f32, 0.4, 1.0], (3, 1), &Device::Cpu)?;
        Ok(model.forward(&xs)?.flatten_all()?.to_vec1()?)
    }

    #[test]
    fn test_opt_is_skipped_during_warmup() -> Result<()> {
        let mut agent = ChainDqn::build(config(DqnKind::Vanilla))?;
        let mut buffer = filled_buffer(7, None)?;
        assert!(agent.opt_with_record(&mut buffer)?.is_none());
        assert_eq!(agent.n_opts(), 0);

        let mut buffer = filled_buffer(8, None)?;
        let record = agent.opt_with_record(&mut buffer)?.unwrap();
        assert_eq!(agent.n_opts(), 1);
        for key in ["loss", "td_err_mean", "td_err_std", "td_err_min", "td_err_max"] {
            assert!(record.get_scalar(key).is_ok(), "{}", key);
        }
        assert!(record.get_scalar("weight_mean").is_err());
        Ok(())
    }

    #[test]
    fn test_prioritized_update_reports_weights() -> Result<()> {
        let mut agent = ChainDqn::build(config(DqnKind::Vanilla))?;
        let mut buffer = filled_buffer(20, Some(PerConfig::default()))?;
        let beta_0 = buffer.beta().unwrap();

        let record = agent.opt_with_record(&mut buffer)?.unwrap();
        assert!(record.get_scalar("weight_max")? <= 1.0);
        assert!(record.get_scalar("weight_min")? > 0.0);
        assert!(record.get_scalar("loss")?.is_finite());

        // priorities were updated, which anneals beta
        assert!(buffer.beta().unwrap() > beta_0);
        Ok(())
    }

    #[test]
    fn test_prioritized_loss_and_priorities() -> Result<()> {
        let per_config = PerConfig::default().alpha(1.0).beta_0(0.5);
        let mut agent = ChainDqn::build(config(DqnKind::Vanilla))?;
        let mut buffer = filled_buffer(20, Some(per_config.clone()))?;

        // Same transitions and random state, sampling the batch the agent will use
        let mut shadow = filled_buffer(20, Some(per_config))?;
        let batch = shadow.batch(4)?;
        let (obs, act, next_obs, reward, is_terminated, _, ixs, weight) = batch.unpack();
        let ws = weight.unwrap();
        let (obs, next_obs): (Tensor, Tensor) = (obs.try_into()?, next_obs.try_into()?);
        let q = agent.qnet().forward(&obs)?.to_vec2::<f32>()?;
        let q_next = agent.qnet().forward(&next_obs)?.to_vec2::<f32>()?;
        let act: Tensor = act.try_into()?;
        let act = act.flatten_all()?.to_vec1::<i64>()?;

        let gamma = agent.discount_factor as f32;
        let td_errs = (0..4)
            .map(|i| {
                let max_q_next = q_next[i].iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let not_done = 1.0 - is_terminated[i] as f32;
                let tgt = reward[i] + gamma * not_done * max_q_next;
                q[i][act[i] as usize] - tgt
            })
            .collect::<Vec<_>>();
        let expected = td_errs
            .iter()
            .zip(ws.iter())
            .map(|(d, w)| w * d * d)
            .sum::<f32>()
            / 4.0;

        let record = agent.opt_with_record(&mut buffer)?.unwrap();
        let loss = record.get_scalar("loss")?;
        assert!((loss - expected).abs() < 1e-4 * expected.max(1.0), "{} != {}", loss, expected);

        // Priorities of the sampled transitions become (|td_err| + eps)^alpha in both
        // buffers, so that they sample the same next batch
        shadow.update_priority(&ixs, &Some(td_errs))?;
        let (next, next_shadow) = (buffer.batch(4)?, shadow.batch(4)?);
        assert_eq!(next.ix_sample, next_shadow.ix_sample);
        let ws = next.weight.unwrap();
        let ws_shadow = next_shadow.weight.unwrap();
        assert!(ws.iter().zip(ws_shadow.iter()).all(|(a, b)| (a - b).abs() < 1e-4));
        Ok(())
    }

    #[test]
    fn test_greedy_action_follows_q_values() -> Result<()> {
        let mut agent = ChainDqn::build(config(DqnKind::Vanilla))?;
        agent.set_eps(0.0);
        let q = q_values(agent.qnet())?;
        let greedy = if q[2] > q[3] { 0 } else { 1 };
        assert_eq!(agent.sample(&ChainObs(0.4))?.0, greedy);
        assert_eq!(agent.eps(), 0.0);
        Ok(())
    }

    #[test]
    fn test_double_dqn_hard_target_update() -> Result<()> {
        let config = config(DqnKind::Double).tau(1.0).target_update_freq(2);
        let mut agent = ChainDqn::build(config)?;
        let mut buffer = filled_buffer(20, None)?;

        let qnet_tgt = agent.qnet_tgt().unwrap();
        assert_eq!(q_values(agent.qnet())?, q_values(qnet_tgt)?);

        agent.opt_with_record(&mut buffer)?;
        assert_ne!(
            q_values(agent.qnet())?,
            q_values(agent.qnet_tgt().unwrap())?
        );

        agent.opt_with_record(&mut buffer)?;
        assert_eq!(
            q_values(agent.qnet())?,
            q_values(agent.qnet_tgt().unwrap())?
        );
        Ok(())
    }

    #[test]
    fn test_vanilla_dqn_has_no_target_network() -> Result<()> {
        let agent = ChainDqn::build(config(DqnKind::Raw).tau(0.0))?;
        assert!(agent.qnet_tgt().is_none());

        let err = ChainDqn::build(config(DqnKind::Double).tau(0.0)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<qlearn_core::error::QlError>(),
            Some(qlearn_core::error::QlError::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn test_save_and_load_params() -> Result<()> {
        let dir = TempDir::new("dqn_params")?;
        let agent = ChainDqn::build(config(DqnKind::Double))?;
        agent.save_params(dir.path())?;
        assert!(dir.path().join("qnet.safetensors").exists());
        assert!(dir.path().join("qnet_tgt.safetensors").exists());

        let mut agent_ = ChainDqn::build(config(DqnKind::Double))?;
        agent_.load_params(dir.path())?;
        assert_eq!(q_values(agent.qnet())?, q_values(agent_.qnet())?);
        assert_eq!(
            q_values(agent.qnet_tgt().unwrap())?,
            q_values(agent_.qnet_tgt().unwrap())?
        );
        Ok(())
    }

    #[test]
    fn test_snapshot_is_decoupled_from_training() -> Result<()> {
        let mut agent = ChainDqn::build(config(DqnKind::Vanilla))?;
        let mut buffer = filled_buffer(20, None)?;

        let snapshot = agent.snapshot()?;
        assert!(snapshot.qnet_tgt().is_none());
        let before = snapshot
            .qnet()
            .iter()
            .map(|(_, t)| t.flatten_all()?.to_vec1::<f32>())
            .collect::<candle_core::Result<Vec<_>>>()?;

        agent.opt_with_record(&mut buffer)?;

        let after_snapshot = snapshot
            .qnet()
            .iter()
            .map(|(_, t)| t.flatten_all()?.to_vec1::<f32>())
            .collect::<candle_core::Result<Vec<_>>>()?;
        let after_agent = agent
            .snapshot()?
            .qnet()
            .iter()
            .map(|(_, t)| t.flatten_all()?.to_vec1::<f32>())
            .collect::<candle_core::Result<Vec<_>>>()?;
        assert_eq!(before, after_snapshot);
        assert_ne!(before, after_agent);
        Ok(())
    }
}
