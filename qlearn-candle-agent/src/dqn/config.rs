//! Configuration of DQN agent.
use super::{DqnKind, DqnModelConfig};
use crate::{util::CriticLoss, util::OutDim, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn) agent.
///
/// `Q` is the configuration of the Q-network.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<Q>
where
    Q: OutDim,
{
    /// Configuration of the Q-network and its optimizer.
    pub model_config: DqnModelConfig<Q>,

    /// Variant of DQN.
    pub kind: DqnKind,

    /// Discount factor.
    pub discount_factor: f64,

    /// Number of transitions in a batch.
    pub batch_size: usize,

    /// Optimization steps are skipped while the buffer holds fewer transitions.
    pub min_transitions_warmup: usize,

    /// Soft update coefficient of the target network, 1 for hard updates.
    pub tau: f64,

    /// Number of optimization steps between target network updates.
    pub target_update_freq: usize,

    /// Initial exploration rate.
    pub eps: f64,

    /// Loss between predicted and target action values.
    pub critic_loss: CriticLoss,

    /// Device on which the networks are placed.
    pub device: Option<Device>,

    /// Random seed of exploration.
    pub seed: u64,

    /// Whether the agent starts in training mode.
    pub train: bool,
}

impl<Q> Default for DqnConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            kind: DqnKind::Vanilla,
            discount_factor: 0.99,
            batch_size: 64,
            min_transitions_warmup: 1,
            tau: 1.0,
            target_update_freq: 32,
            eps: 0.0,
            critic_loss: CriticLoss::Mse,
            device: None,
            seed: 42,
            train: false,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, v: DqnModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// Sets the variant of DQN.
    pub fn kind(mut self, v: DqnKind) -> Self {
        self.kind = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the number of warmup transitions.
    pub fn min_transitions_warmup(mut self, v: usize) -> Self {
        self.min_transitions_warmup = v;
        self
    }

    /// Sets the soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the interval of target network updates.
    pub fn target_update_freq(mut self, v: usize) -> Self {
        self.target_update_freq = v;
        self
    }

    /// Sets the initial exploration rate.
    pub fn eps(mut self, v: f64) -> Self {
        self.eps = v;
        self
    }

    /// Sets the critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the initial mode.
    pub fn train(mut self, v: bool) -> Self {
        self.train = v;
        self
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
