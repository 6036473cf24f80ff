//! Generic replay buffer with optional prioritized experience replay.
//!
//! [`SimpleReplayBuffer`] stores transitions column by column in a fixed-size
//! circular buffer. Observations and actions are stored in types implementing
//! [`BatchBase`], so the same buffer works with plain vectors ([`VecBatch`]) or
//! with tensor-backed storage provided by agent crates.
//!
//! Sampling is uniform without replacement, or prioritized when
//! [`SimpleReplayBufferConfig::per_config`] is given.
//!
//! ```rust
//! use qlearn_core::replay_buffer::{PerConfig, SimpleReplayBufferConfig, WeightNormalizer};
//!
//! let config = SimpleReplayBufferConfig::default()
//!     .capacity(10_000)
//!     .seed(42)
//!     .per_config(Some(
//!         PerConfig::default()
//!             .alpha(0.6)
//!             .beta_0(0.4)
//!             .normalize(WeightNormalizer::Batch),
//!     ));
//! assert_eq!(config.capacity, 10_000);
//! ```
mod base;
mod batch;
mod config;
mod step_proc;
pub use base::{IwScheduler, SimpleReplayBuffer, WeightNormalizer};
pub use batch::{BatchBase, GenericTransitionBatch, VecBatch};
pub use config::{PerConfig, SimpleReplayBufferConfig};
pub use step_proc::{SimpleStepProcessor, SimpleStepProcessorConfig};
