//! Exploration strategy of DQN.
use anyhow::Result;
use candle_core::{shape::D, DType, Device, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy action selection.
///
/// The exploration rate is set from outside, typically by a hook of the trainer
/// following an [`EpsilonSchedule`](qlearn_core::EpsilonSchedule).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    eps: f64,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self { eps: 0.0 }
    }
}

impl EpsilonGreedy {
    /// Constructs an explorer with the given exploration rate.
    pub fn new(eps: f64) -> Self {
        Self { eps }
    }

    /// Returns the exploration rate.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Sets the exploration rate.
    pub fn set_eps(&mut self, eps: f64) {
        self.eps = eps;
    }

    /// Takes actions given action values of shape `(n_samples, n_actions)`.
    ///
    /// For each sample, a uniformly random action is taken with probability `eps`,
    /// otherwise the action of the maximum value. Returns an `i64` tensor of shape
    /// `(n_samples,)` on the CPU.
    pub fn action(&self, q: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        let (n_samples, n_actions) = q.dims2()?;
        let greedy = q
            .argmax(D::Minus1)?
            .to_dtype(DType::I64)?
            .to_device(&Device::Cpu)?
            .to_vec1::<i64>()?;

        let acts = greedy
            .into_iter()
            .map(|a| match rng.gen::<f64>() < self.eps {
                true => rng.gen_range(0..n_actions) as i64,
                false => a,
            })
            .collect::<Vec<_>>();

        Ok(Tensor::from_vec(acts, (n_samples,), &Device::Cpu)?)
    }
}
