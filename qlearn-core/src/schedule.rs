use serde::{Deserialize, Serialize};

/// Schedule of the exploration rate of epsilon-greedy policies during collection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum EpsilonSchedule {
    /// Decays linearly from `start` to `end` over `steps` environment steps.
    Linear {
        /// Initial value.
        start: f64,
        /// Final value.
        end: f64,
        /// Environment steps when the final value is reached.
        steps: usize,
    },

    /// `max(start * decay^epoch, min)`.
    Exponential {
        /// Value at epoch 0.
        start: f64,
        /// Decay factor per epoch.
        decay: f64,
        /// Lower bound.
        min: f64,
    },

    /// A fixed value.
    Constant(f64),
}

impl EpsilonSchedule {
    /// Returns the exploration rate at the given epoch and number of environment steps.
    pub fn value(&self, epoch: usize, env_steps: usize) -> f64 {
        match self {
            Self::Linear { start, end, steps } => {
                if env_steps >= *steps {
                    *end
                } else {
                    start - (env_steps as f64 / *steps as f64) * (start - end)
                }
            }
            Self::Exponential { start, decay, min } => {
                (start * decay.powi(epoch as i32)).max(*min)
            }
            Self::Constant(eps) => *eps,
        }
    }
}
