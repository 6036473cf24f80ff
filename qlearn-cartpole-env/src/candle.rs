//! Conversions between cart-pole types and candle tensors.
use crate::{CartPoleAct, CartPoleObs};
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use qlearn_candle_agent::TensorBatch;

/// An observation as a `(1, 4)` tensor.
impl TryFrom<CartPoleObs> for Tensor {
    type Error = anyhow::Error;

    fn try_from(obs: CartPoleObs) -> Result<Self> {
        Ok(Tensor::from_slice(&obs.0, (1, 4), &Device::Cpu)?)
    }
}

impl TryFrom<CartPoleObs> for TensorBatch {
    type Error = anyhow::Error;

    fn try_from(obs: CartPoleObs) -> Result<Self> {
        Ok(TensorBatch::from_tensor(obs.try_into()?))
    }
}

/// An action as a `(1, 1)` tensor of `i64`.
impl TryFrom<CartPoleAct> for TensorBatch {
    type Error = anyhow::Error;

    fn try_from(act: CartPoleAct) -> Result<Self> {
        let t = Tensor::from_slice(&[act.0], (1, 1), &Device::Cpu)?;
        Ok(TensorBatch::from_tensor(t))
    }
}

/// Takes the first element of an integer tensor.
impl TryFrom<Tensor> for CartPoleAct {
    type Error = anyhow::Error;

    fn try_from(t: Tensor) -> Result<Self> {
        let a = t
            .flatten_all()?
            .to_dtype(candle_core::DType::I64)?
            .to_vec1::<i64>()?;
        let a = a
            .first()
            .ok_or_else(|| anyhow!("Empty action tensor"))?;
        Ok(CartPoleAct(*a))
    }
}
