//! DQN experiments on [`CartPole`].
//!
//! A run is described by a flat [`DqnCartPoleConfig`], which expands into the
//! configurations of the environment, the agent, the replay buffer and the trainer.
//! Command line arguments ([`CartPoleArgs`]) override the fields of a preset given by
//! each example binary.
//!
//! ```no_run
//! use qlearn::cartpole::{train, DqnCartPoleConfig};
//! use qlearn::qlearn_core::{record::LogRecorder, StorageConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = DqnCartPoleConfig::default();
//! let storage = StorageConfig::new("model/dqn_cartpole", "model/dqn_cartpole/log");
//! let result = train(&config, &storage, None, &mut LogRecorder::new())?;
//! println!("best reward = {}", result.best_reward);
//! # Ok(())
//! # }
//! ```
use anyhow::Result;
use clap::Args;
use log::info;
use qlearn_candle_agent::{
    dqn::{epsilon_hooks, Dqn, DqnConfig, DqnKind, DqnModelConfig},
    mlp::{Activation, Mlp, MlpConfig},
    opt::OptimizerConfig,
    util::CriticLoss,
    Device, TensorBatch,
};
use qlearn_cartpole_env::{CartPole, CartPoleConfig};
use qlearn_core::{
    record::{AggregateRecorder, LogRecorder, NullRecorder, Recorder},
    replay_buffer::{
        PerConfig, SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
        SimpleStepProcessorConfig,
    },
    Agent, Configurable, DefaultEvaluator, Env as _, EpochInfo, EpsilonSchedule,
    Evaluator as _, ReplayBufferBase, StepProcessor, StorageConfig, TrainResult, Trainer,
    TrainerConfig,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Dimension of cart-pole observations.
pub const DIM_OBS: usize = 4;

/// Number of cart-pole actions.
pub const DIM_ACT: usize = 2;

/// Replay buffer of the experiments.
pub type ReplayBuffer = SimpleReplayBuffer<TensorBatch, TensorBatch>;

/// Step processor of the experiments.
pub type StepProc = SimpleStepProcessor<CartPole, TensorBatch, TensorBatch>;

/// DQN agent of the experiments.
pub type CartPoleDqn = Dqn<CartPole, Mlp, ReplayBuffer>;

/// Test episodes are cut at this length when the environment does not truncate them.
pub const MAX_TEST_STEPS: usize = 500;

/// Hyperparameters of a DQN run on cart-pole.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DqnCartPoleConfig {
    /// Variant of DQN.
    pub kind: DqnKind,

    /// Learning rate.
    pub lr: f64,

    /// Weight decay, AdamW is used instead of Adam if nonzero.
    #[serde(default)]
    pub weight_decay: f64,

    /// Discount factor.
    pub gamma: f64,

    /// Number of hidden layers of the Q-network.
    pub layer_num: usize,

    /// Units of each hidden layer.
    pub hidden_size: usize,

    /// Activation of the hidden layers.
    pub activation: Activation,

    /// Loss between predicted and target action values.
    pub critic_loss: CriticLoss,

    /// Exploration rate during collection.
    pub eps_collect: EpsilonSchedule,

    /// Exploration rate during testing.
    pub eps_test: f64,

    /// Priority exponent of the replay buffer, prioritized replay is disabled if `<= 0`.
    pub alpha: f32,

    /// Initial exponent of importance sampling weights.
    pub beta: f32,

    /// Capacity of the replay buffer.
    pub buffer_size: usize,

    /// Number of transitions in a batch.
    pub batch_size: usize,

    /// Optimization steps between target network updates.
    pub target_update_freq: usize,

    /// Soft update coefficient of the target network.
    pub tau: f64,

    /// Transitions collected with random actions before the first epoch.
    pub warmup_size: usize,

    /// Number of epochs.
    pub epochs: usize,

    /// Collect-update rounds in an epoch.
    pub step_per_epoch: usize,

    /// Environment steps in a round.
    pub collect_per_step: usize,

    /// Optimization steps in a round.
    pub update_per_step: usize,

    /// Episodes of a test.
    pub test_episodes: usize,

    /// Episodes are truncated after this number of steps.
    pub max_step_per_episode: Option<usize>,

    /// Training stops when a loss exceeds this value.
    pub max_loss: Option<f32>,

    /// Training stops when the test reward reaches this value.
    pub max_reward: Option<f32>,

    /// Device of the networks.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl Default for DqnCartPoleConfig {
    fn default() -> Self {
        Self {
            kind: DqnKind::Vanilla,
            lr: 1e-3,
            weight_decay: 0.0,
            gamma: 0.99,
            layer_num: 2,
            hidden_size: 128,
            activation: Activation::Relu,
            critic_loss: CriticLoss::Mse,
            eps_collect: EpsilonSchedule::Linear {
                start: 1.0,
                end: 0.05,
                steps: 1_000_000,
            },
            eps_test: 0.0,
            alpha: 0.6,
            beta: 0.4,
            buffer_size: 20_000,
            batch_size: 64,
            target_update_freq: 32,
            tau: 1.0,
            warmup_size: 1000,
            epochs: 50,
            step_per_epoch: 1000,
            collect_per_step: 1,
            update_per_step: 1,
            test_episodes: 10,
            max_step_per_episode: Some(500),
            max_loss: None,
            max_reward: Some(500.0),
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl DqnCartPoleConfig {
    /// Loads [`DqnCartPoleConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnCartPoleConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Configuration of the environment.
    pub fn env_config(&self) -> CartPoleConfig {
        CartPoleConfig::default().max_steps(self.max_step_per_episode)
    }

    /// Configuration of the agent.
    pub fn agent_config(&self) -> DqnConfig<MlpConfig> {
        let q_config =
            MlpConfig::with_hidden_layers(DIM_OBS, self.layer_num, self.hidden_size, DIM_ACT)
                .activation(self.activation);
        let model_config = DqnModelConfig::default()
            .q_config(q_config)
            .opt_config(OptimizerConfig::with_weight_decay(self.lr, self.weight_decay));
        DqnConfig::default()
            .model_config(model_config)
            .kind(self.kind)
            .discount_factor(self.gamma)
            .batch_size(self.batch_size)
            .min_transitions_warmup(self.batch_size)
            .tau(self.tau)
            .target_update_freq(self.target_update_freq)
            .critic_loss(self.critic_loss)
            .device(self.device)
            .seed(self.seed)
            .train(true)
    }

    /// Configuration of the replay buffer.
    ///
    /// `beta` reaches 1 at the last optimization step of the run.
    pub fn buffer_config(&self) -> SimpleReplayBufferConfig {
        let per_config = if self.alpha > 0.0 {
            let n_opts = self.epochs * self.step_per_epoch * self.update_per_step;
            Some(
                PerConfig::default()
                    .alpha(self.alpha)
                    .beta_0(self.beta)
                    .n_opts_final(n_opts.max(1)),
            )
        } else {
            None
        };
        SimpleReplayBufferConfig::default()
            .capacity(self.buffer_size)
            .seed(self.seed)
            .per_config(per_config)
    }

    /// Length limit of test episodes.
    pub fn max_test_steps(&self) -> usize {
        self.max_step_per_episode.unwrap_or(MAX_TEST_STEPS)
    }

    /// Evaluator running `test_episodes` episodes, seeded apart from the training environment.
    pub fn evaluator(&self) -> Result<DefaultEvaluator<CartPole>> {
        let seed = self.seed as i64 + 1;
        let evaluator = DefaultEvaluator::new(&self.env_config(), seed, self.test_episodes)?;
        Ok(evaluator.max_steps_per_episode(Some(self.max_test_steps())))
    }

    /// Configuration of the trainer.
    ///
    /// Episodes are truncated by the environment, so the collector does not limit them.
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::default()
            .epochs(self.epochs)
            .steps_per_epoch(self.step_per_epoch)
            .collect_per_step(self.collect_per_step)
            .update_per_step(self.update_per_step)
            .warmup_size(self.warmup_size)
            .max_loss(self.max_loss)
    }
}

/// Command line arguments of the cart-pole examples.
///
/// Unset hyperparameters keep the value of the preset of the example, or of the file
/// given by `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct CartPoleArgs {
    /// YAML file of hyperparameters replacing the preset
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Learning rate
    #[arg(long)]
    pub lr: Option<f64>,

    /// Weight decay, enables AdamW
    #[arg(long)]
    pub weight_decay: Option<f64>,

    /// Discount factor
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Number of hidden layers
    #[arg(long)]
    pub layer_num: Option<usize>,

    /// Units of each hidden layer
    #[arg(long)]
    pub hidden_size: Option<usize>,

    /// Use SELU instead of ReLU in hidden layers
    #[arg(long, default_value_t = false)]
    pub use_selu: bool,

    /// Initial exploration rate of collection
    #[arg(long)]
    pub eps_collect: Option<f64>,

    /// Final exploration rate of collection
    #[arg(long)]
    pub eps_collect_min: Option<f64>,

    /// Decay of the exploration rate per epoch, for exponential schedules
    #[arg(long)]
    pub eps_collect_gamma: Option<f64>,

    /// Environment steps until the final exploration rate, for linear schedules
    #[arg(long)]
    pub eps_collect_steps: Option<usize>,

    /// Exploration rate of testing
    #[arg(long)]
    pub eps_test: Option<f64>,

    /// Priority exponent, prioritized replay is disabled if <= 0
    #[arg(long)]
    pub alpha: Option<f32>,

    /// Initial exponent of importance sampling weights
    #[arg(long)]
    pub beta: Option<f32>,

    /// Capacity of the replay buffer
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Optimization steps between target network updates
    #[arg(long)]
    pub target_update_freq: Option<usize>,

    /// Soft update coefficient of the target network
    #[arg(long)]
    pub tau: Option<f64>,

    /// Warmup transitions
    #[arg(long)]
    pub warmup_size: Option<usize>,

    /// Number of epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Collect-update rounds in an epoch
    #[arg(long)]
    pub step_per_epoch: Option<usize>,

    /// Environment steps in a round
    #[arg(long)]
    pub collect_per_step: Option<usize>,

    /// Optimization steps in a round
    #[arg(long)]
    pub update_per_step: Option<usize>,

    /// Episodes of a test
    #[arg(long)]
    pub test_episodes: Option<usize>,

    /// Maximum steps of an episode
    #[arg(long)]
    pub max_step_per_episode: Option<usize>,

    /// Stop training when a loss exceeds this value
    #[arg(long)]
    pub max_loss: Option<f32>,

    /// Stop training when the test reward reaches this value
    #[arg(long)]
    pub max_reward: Option<f32>,

    /// Ordinal of the CUDA device, CPU if not given
    #[arg(long)]
    pub cuda: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory of checkpoints and logs
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Evaluate a checkpoint without training
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Checkpoint to resume training from, or to evaluate with --watch
    /// (`<model-dir>/best` if not given)
    #[arg(long)]
    pub ckpt: Option<PathBuf>,

    /// Do not record training metrics
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

macro_rules! override_fields {
    ($args:expr, $config:expr, $($field:ident),*) => {
        $(
            if let Some(v) = $args.$field {
                $config.$field = v;
            }
        )*
    };
}

impl CartPoleArgs {
    /// Returns the hyperparameters of the run.
    pub fn config(&self, preset: DqnCartPoleConfig) -> Result<DqnCartPoleConfig> {
        let mut config = match &self.config {
            Some(path) => DqnCartPoleConfig::load(path)?,
            None => preset,
        };

        override_fields!(
            self,
            config,
            lr,
            weight_decay,
            gamma,
            layer_num,
            hidden_size,
            eps_test,
            alpha,
            beta,
            buffer_size,
            batch_size,
            target_update_freq,
            tau,
            warmup_size,
            epochs,
            step_per_epoch,
            collect_per_step,
            update_per_step,
            test_episodes,
            seed
        );
        if self.use_selu {
            config.activation = Activation::Selu;
        }
        if self.max_step_per_episode.is_some() {
            config.max_step_per_episode = self.max_step_per_episode;
        }
        if self.max_loss.is_some() {
            config.max_loss = self.max_loss;
        }
        if self.max_reward.is_some() {
            config.max_reward = self.max_reward;
        }
        if let Some(n) = self.cuda {
            config.device = Device::Cuda(n);
        }

        match &mut config.eps_collect {
            EpsilonSchedule::Linear { start, end, steps } => {
                if let Some(v) = self.eps_collect {
                    *start = v;
                }
                if let Some(v) = self.eps_collect_min {
                    *end = v;
                }
                if let Some(v) = self.eps_collect_steps {
                    *steps = v;
                }
            }
            EpsilonSchedule::Exponential { start, decay, min } => {
                if let Some(v) = self.eps_collect {
                    *start = v;
                }
                if let Some(v) = self.eps_collect_gamma {
                    *decay = v;
                }
                if let Some(v) = self.eps_collect_min {
                    *min = v;
                }
            }
            EpsilonSchedule::Constant(eps) => {
                if let Some(v) = self.eps_collect {
                    *eps = v;
                }
            }
        }

        Ok(config)
    }

    /// Returns the storage of the run, `default_dir` unless `--model-dir` is given.
    pub fn storage(&self, default_dir: impl Into<PathBuf>) -> StorageConfig {
        let model_dir = self.model_dir.clone().unwrap_or_else(|| default_dir.into());
        let log_dir = model_dir.join("log");
        StorageConfig::new(model_dir, log_dir)
    }

    /// Returns the checkpoint evaluated with `--watch`.
    pub fn ckpt(&self, storage: &StorageConfig) -> PathBuf {
        self.ckpt
            .clone()
            .unwrap_or_else(|| storage.checkpoint_dir("best"))
    }

    /// Returns the recorder of training metrics, which discards them with `--quiet`.
    pub fn recorder(&self) -> Box<dyn AggregateRecorder> {
        match self.quiet {
            true => Box::new(NullRecorder),
            false => Box::new(LogRecorder::new()),
        }
    }
}

/// Saves the agent in `path` on strict improvement of the test reward.
///
/// Training continues until the reward reaches `max_reward`.
fn save_best(
    path: PathBuf,
    max_reward: Option<f32>,
) -> impl FnMut(&CartPoleDqn, &EpochInfo, f32, f32) -> Result<bool> {
    move |agent, info, best_reward, reward| {
        if reward > best_reward {
            agent.snapshot()?.save(&path)?;
            info!(
                "Test reward improved from {:.1} to {:.1} at epoch {}",
                best_reward, reward, info.epoch
            );
        }
        Ok(match max_reward {
            Some(max_reward) => reward < max_reward,
            None => true,
        })
    }
}

/// Builds an agent, with the parameters of `ckpt` if given.
pub fn build_agent(config: &DqnCartPoleConfig, ckpt: Option<&Path>) -> Result<CartPoleDqn> {
    let mut agent = CartPoleDqn::build(config.agent_config())?;
    if let Some(ckpt) = ckpt {
        agent.load_params(ckpt)?;
        info!("Loaded the parameters in {:?}", ckpt);
    }
    Ok(agent)
}

/// Trains an agent, starting from the parameters of `ckpt` if given.
///
/// The hyperparameters are saved in `config.yaml` of the log directory, the best
/// agent in `best` of the model directory.
pub fn train(
    config: &DqnCartPoleConfig,
    storage: &StorageConfig,
    ckpt: Option<&Path>,
    recorder: &mut dyn AggregateRecorder,
) -> Result<TrainResult> {
    storage.create_dirs()?;
    config.save(storage.log_dir.join("config.yaml"))?;

    let env = CartPole::build(&config.env_config(), config.seed as i64)?;
    let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    let mut agent = build_agent(config, ckpt)?;
    let mut buffer = ReplayBuffer::build(&config.buffer_config())?;
    let mut evaluator = config.evaluator()?;
    let mut hooks = epsilon_hooks::<CartPole, Mlp, ReplayBuffer>(
        config.eps_collect.clone(),
        config.eps_test,
    )
    .save(save_best(storage.checkpoint_dir("best"), config.max_reward));

    info!(
        "Start training {:?} DQN on cart-pole, prioritized replay = {}",
        config.kind,
        buffer.is_prioritized()
    );
    let mut trainer = Trainer::build(config.trainer_config(), storage.clone());
    let result = trainer.train(
        env,
        step_proc,
        &mut agent,
        &mut buffer,
        recorder,
        &mut evaluator,
        &mut hooks,
    )?;
    info!(
        "Finished after {} epochs ({:?}), best reward = {:.1}",
        result.epochs, result.stop_reason, result.best_reward
    );

    Ok(result)
}

/// Evaluates the checkpoint in `ckpt` and returns the mean reward.
pub fn watch(config: &DqnCartPoleConfig, ckpt: &Path) -> Result<f32> {
    let mut agent = build_agent(config, Some(ckpt))?;
    agent.eval();
    agent.set_eps(config.eps_test);

    let mut evaluator = config.evaluator()?;
    let (reward, record) = evaluator.evaluate(&mut agent)?;
    LogRecorder::new().write(record);

    Ok(reward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempdir::TempDir;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: CartPoleArgs,
    }

    #[test]
    fn test_args_override_preset() -> Result<()> {
        let preset = DqnCartPoleConfig {
            kind: DqnKind::Double,
            eps_collect: EpsilonSchedule::Exponential {
                start: 1.0,
                decay: 0.9,
                min: 0.05,
            },
            ..Default::default()
        };
        let cli = Cli::try_parse_from([
            "test",
            "--lr",
            "0.01",
            "--use-selu",
            "--alpha",
            "0",
            "--eps-collect-gamma",
            "0.5",
            "--max-step-per-episode",
            "200",
            "--weight-decay",
            "0.01",
        ])?;
        let config = cli.args.config(preset)?;

        assert_eq!(config.kind, DqnKind::Double);
        assert_eq!(config.lr, 0.01);
        assert_eq!(config.activation, Activation::Selu);
        assert_eq!(config.max_step_per_episode, Some(200));
        assert_eq!(config.weight_decay, 0.01);
        let agent_config = serde_yaml::to_string(&config.agent_config())?;
        assert!(agent_config.contains("AdamW"), "{}", agent_config);
        assert_eq!(
            config.eps_collect,
            EpsilonSchedule::Exponential {
                start: 1.0,
                decay: 0.5,
                min: 0.05
            }
        );
        assert_eq!(config.batch_size, DqnCartPoleConfig::default().batch_size);
        assert!(config.buffer_config().per_config.is_none());
        Ok(())
    }

    #[test]
    fn test_storage_and_ckpt() {
        let args = CartPoleArgs::default();
        let storage = args.storage("model/dqn");
        assert_eq!(storage.log_dir, PathBuf::from("model/dqn/log"));
        assert_eq!(args.ckpt(&storage), PathBuf::from("model/dqn/best"));
    }

    #[test]
    fn test_config_yaml() -> Result<()> {
        let config = DqnCartPoleConfig {
            kind: DqnKind::Raw,
            buffer_size: 1,
            batch_size: 1,
            ..Default::default()
        };
        let dir = TempDir::new("dqn_cartpole_config")?;
        let path = dir.path().join("config.yaml");
        config.save(&path)?;
        assert_eq!(DqnCartPoleConfig::load(&path)?, config);

        let cli = Cli::try_parse_from(["test", "--config", path.to_str().unwrap_or_default()])?;
        assert_eq!(cli.args.config(DqnCartPoleConfig::default())?, config);
        Ok(())
    }

    #[test]
    fn test_test_episodes_are_bounded() -> Result<()> {
        let config = DqnCartPoleConfig {
            max_step_per_episode: Some(200),
            ..Default::default()
        };
        assert_eq!(config.max_test_steps(), 200);

        let config = DqnCartPoleConfig {
            max_step_per_episode: None,
            test_episodes: 2,
            ..Default::default()
        };
        assert_eq!(config.max_test_steps(), MAX_TEST_STEPS);

        let mut agent = build_agent(&config, None)?;
        agent.set_eps(1.0);
        let (reward, _) = config.evaluator()?.evaluate(&mut agent)?;
        assert!(reward > 0.0 && reward <= MAX_TEST_STEPS as f32);
        Ok(())
    }

    #[test]
    fn test_quiet_recorder() -> Result<()> {
        let cli = Cli::try_parse_from(["test", "--quiet"])?;
        assert!(cli.args.quiet);
        let mut recorder = cli.args.recorder();
        recorder.store(qlearn_core::record::Record::empty());
        recorder.flush(1);
        Ok(())
    }

    #[test]
    fn test_per_anneals_over_run() {
        let config = DqnCartPoleConfig {
            epochs: 2,
            step_per_epoch: 10,
            update_per_step: 3,
            ..Default::default()
        };
        let per_config = config.buffer_config().per_config;
        assert_eq!(per_config.map(|c| c.n_opts_final), Some(60));
    }
}
