//! DQN agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The crate provides the [`dqn::Dqn`] agent with its three variants (vanilla, double
//! and replay-free DQN), a multilayer perceptron usable as the Q-network ([`mlp::Mlp`]),
//! optimizer configurations and [`TensorBatch`], a tensor-backed column storage for
//! [`SimpleReplayBuffer`](qlearn_core::replay_buffer::SimpleReplayBuffer).
pub mod dqn;
pub mod mlp;
pub mod model;
pub mod opt;
mod tensor_batch;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};
pub use tensor_batch::TensorBatch;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Eq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device of the given ordinal.
    Cuda(usize),
}

impl Device {
    /// Returns the candle device.
    ///
    /// Fails for [`Device::Cuda`] when candle is built without CUDA support.
    pub fn build(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}
