//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of epochs.
    pub epochs: usize,

    /// Number of collect-update rounds in an epoch.
    pub steps_per_epoch: usize,

    /// Environment steps in a round.
    pub collect_per_step: usize,

    /// Optimization steps in a round.
    pub update_per_step: usize,

    /// Number of transitions in the buffer before the first epoch.
    pub warmup_size: usize,

    /// Training stops when a loss exceeds this value.
    pub max_loss: Option<f32>,

    /// Episodes of the collector are truncated after this number of steps.
    pub max_steps_per_episode: Option<usize>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            steps_per_epoch: 1000,
            collect_per_step: 1,
            update_per_step: 1,
            warmup_size: 1000,
            max_loss: None,
            max_steps_per_episode: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of epochs.
    pub fn epochs(mut self, v: usize) -> Self {
        self.epochs = v;
        self
    }

    /// Sets the number of collect-update rounds in an epoch.
    pub fn steps_per_epoch(mut self, v: usize) -> Self {
        self.steps_per_epoch = v;
        self
    }

    /// Sets the number of environment steps in a round.
    pub fn collect_per_step(mut self, v: usize) -> Self {
        self.collect_per_step = v;
        self
    }

    /// Sets the number of optimization steps in a round.
    pub fn update_per_step(mut self, v: usize) -> Self {
        self.update_per_step = v;
        self
    }

    /// Sets the number of transitions collected before the first epoch.
    pub fn warmup_size(mut self, v: usize) -> Self {
        self.warmup_size = v;
        self
    }

    /// Sets the loss threshold of divergence.
    pub fn max_loss(mut self, v: Option<f32>) -> Self {
        self.max_loss = v;
        self
    }

    /// Sets the maximum episode length of the collector.
    pub fn max_steps_per_episode(mut self, v: Option<usize>) -> Self {
        self.max_steps_per_episode = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
