//! Optimizers of Q-networks.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of an optimizer.
///
/// In YAML, `Adam: {lr: 0.001}` or `AdamW: {lr: 0.001, weight_decay: 0.01}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam of `candle_optimisers`.
    Adam {
        /// Learning rate.
        lr: f64,
    },

    /// Adam with decoupled weight decay of `candle_nn`.
    ///
    /// The moment decay rates and the denominator term are those of
    /// [`ParamsAdamW::default`].
    AdamW {
        /// Learning rate.
        lr: f64,

        /// Weight decay, multiplying parameters by `1 - lr * weight_decay` at every step.
        weight_decay: f64,
    },
}

impl OptimizerConfig {
    /// Adam when `weight_decay` is zero, AdamW otherwise.
    pub fn with_weight_decay(lr: f64, weight_decay: f64) -> Self {
        if weight_decay == 0.0 {
            Self::Adam { lr }
        } else {
            Self::AdamW { lr, weight_decay }
        }
    }

    /// Constructs an optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        Ok(match *self {
            Self::Adam { lr } => {
                let params = ParamsAdam {
                    lr,
                    ..ParamsAdam::default()
                };
                Optimizer::Adam(Adam::new(vars, params)?)
            }
            Self::AdamW { lr, weight_decay } => {
                let params = ParamsAdamW {
                    lr,
                    weight_decay,
                    ..ParamsAdamW::default()
                };
                Optimizer::AdamW(AdamW::new(vars, params)?)
            }
        })
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 1e-3 }
    }
}

/// Optimizers, dispatched on the variant of [`OptimizerConfig`].
pub enum Optimizer {
    /// Adam.
    Adam(Adam),

    /// AdamW.
    AdamW(AdamW),
}

impl Optimizer {
    /// Computes the gradients of `loss` and updates the variables.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.backward_step(loss)?,
            Self::AdamW(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }
}
