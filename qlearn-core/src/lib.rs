#![warn(missing_docs)]
//! Core components of value-based deep Q-learning.
//!
//! This crate defines the interfaces shared by environments and agents
//! ([`Env`], [`Policy`], [`Agent`], [`ReplayBufferBase`]), a generic replay buffer
//! supporting uniform and prioritized sampling ([`replay_buffer`]), the [`Collector`]
//! feeding transitions into a buffer, the [`Trainer`] running epochs of
//! collection, optimization and testing, and the record types used for metrics.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Act, Agent, Configurable, Env, ExperienceBufferBase, Info, Obs, Policy, ReplayBufferBase,
    Step, StepProcessor, TransitionBatch,
};

mod collector;
pub use collector::Collector;

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod schedule;
pub use schedule::EpsilonSchedule;

mod storage;
pub use storage::StorageConfig;

mod trainer;
pub use trainer::{
    EpochInfo, Hook, SaveHook, StopReason, TrainResult, Trainer, TrainerConfig, TrainerHooks,
};

pub mod dummy;
