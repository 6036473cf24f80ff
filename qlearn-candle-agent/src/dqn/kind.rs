//! Variants of DQN.
use anyhow::{anyhow, Result};
use candle_core::{shape::D, Tensor};
use serde::{Deserialize, Serialize};

/// Variant of DQN, determining how the target of action values is computed.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum DqnKind {
    /// DQN with experience replay, bootstrapping from the online network.
    #[default]
    Vanilla,

    /// Double DQN with a target network.
    Double,

    /// DQN updated with the latest transition only.
    Raw,
}

impl DqnKind {
    /// Returns `true` if the variant uses a target network.
    pub fn uses_target_network(&self) -> bool {
        matches!(self, Self::Double)
    }

    /// Computes the target `r + (1 - done) * gamma * q'`.
    ///
    /// `q_next` and `q_next_tgt` are the action values of the next observations
    /// given by the online and the target network, of shape `(n_samples, n_actions)`.
    /// `q'` is the maximum of `q_next` for [`DqnKind::Vanilla`] and [`DqnKind::Raw`].
    /// For [`DqnKind::Double`], `q'` is the value in `q_next_tgt` of the action
    /// maximizing `q_next`.
    pub fn compute_target(
        &self,
        q_next: &Tensor,
        q_next_tgt: Option<&Tensor>,
        reward: &Tensor,
        not_done: &Tensor,
        gamma: f64,
    ) -> Result<Tensor> {
        let q = match self {
            Self::Vanilla | Self::Raw => q_next.max(D::Minus1)?,
            Self::Double => {
                let q_next_tgt =
                    q_next_tgt.ok_or_else(|| anyhow!("Double DQN requires a target network"))?;
                let a_star = q_next.argmax_keepdim(D::Minus1)?;
                q_next_tgt.gather(&a_star, D::Minus1)?.squeeze(D::Minus1)?
            }
        };

        Ok((reward + (not_done * q)?.affine(gamma, 0.0)?)?.detach())
    }
}
