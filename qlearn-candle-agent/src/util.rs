//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{DType, Tensor, Var};
use candle_nn::VarMap;
use itertools::Itertools;
use log::trace;
use ordered_float::OrderedFloat;
use qlearn_core::record::{Record, RecordValue};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::MutexGuard};

/// Critic loss type.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum CriticLoss {
    /// Mean squared error.
    #[default]
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

impl CriticLoss {
    /// Returns the loss of each pair of elements, without reduction.
    pub fn elementwise(&self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let d = (x - y)?;
        Ok(match self {
            Self::Mse => d.sqr()?,
            Self::SmoothL1 => smooth_l1(&d)?,
        })
    }
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

fn lock(varmap: &VarMap) -> Result<MutexGuard<'_, HashMap<String, Var>>> {
    varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("The variable map is poisoned"))
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    let dest = lock(dest)?;
    let src = lock(src)?;

    for (k, v_dest) in dest.iter() {
        let v_src = src
            .get(k)
            .ok_or_else(|| anyhow!("Variable {} is not found in the source", k))?;
        let t_dest = (v_src.as_tensor().affine(tau, 0.0)?
            + v_dest.as_tensor().affine(1.0 - tau, 0.0)?)?;
        v_dest.set(&t_dest)?;
    }
    trace!("Soft update of {} variables with tau = {}", dest.len(), tau);

    Ok(())
}

/// Copies the values of variables in `src` into the variables of the same names in `dest`.
///
/// The variables in `dest` keep their own storage.
pub fn hard_copy(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = lock(dest)?;
    let src = lock(src)?;

    for (k, v_dest) in dest.iter() {
        let v_src = src
            .get(k)
            .ok_or_else(|| anyhow!("Variable {} is not found in the source", k))?;
        v_dest.set(v_src.as_tensor())?;
    }
    trace!("Hard copy of {} variables", dest.len());

    Ok(())
}

/// Returns detached copies of the variables, sorted by their names.
pub fn named_tensors(varmap: &VarMap, device: &candle_core::Device) -> Result<Vec<(String, Tensor)>> {
    let data = lock(varmap)?;
    data.iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .map(|(k, v)| Ok((k.clone(), v.as_tensor().to_device(device)?.copy()?.detach())))
        .collect()
}

/// Elementwise smooth L1 function of the differences `d`.
///
/// `0.5 * d^2` for `|d| < 1`, otherwise `|d| - 0.5`.
pub fn smooth_l1(d: &Tensor) -> Result<Tensor> {
    let a = d.abs()?;
    let m1 = a.lt(1.0)?.to_dtype(DType::F32)?;
    let m2 = m1.affine(-1.0, 1.0)?;
    Ok(((m1 * a.sqr()?.affine(0.5, 0.0)?)? + (m2 * a.affine(1.0, -0.5)?)?)?)
}

/// Inserts `{key}_mean`, `{key}_std`, `{key}_min` and `{key}_max` of `xs` into a record.
///
/// The standard deviation is the unbiased estimate, 0 for fewer than two values.
pub fn insert_stats(record: &mut Record, key: &str, xs: &[f32]) {
    if xs.is_empty() {
        return;
    }

    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    let std = match xs.len() {
        1 => 0.0,
        _ => (xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / (n - 1.0)).sqrt(),
    };
    let min = xs.iter().copied().map(OrderedFloat).min().map_or(0.0, |x| x.0);
    let max = xs.iter().copied().map(OrderedFloat).max().map_or(0.0, |x| x.0);

    record.insert(format!("{}_mean", key), RecordValue::Scalar(mean));
    record.insert(format!("{}_std", key), RecordValue::Scalar(std));
    record.insert(format!("{}_min", key), RecordValue::Scalar(min));
    record.insert(format!("{}_max", key), RecordValue::Scalar(max));
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::Init;

    fn varmap_with(values: &[(&str, Vec<f32>)]) -> Result<VarMap> {
        let vm = VarMap::new();
        for (name, v) in values.iter() {
            vm.get(v.len(), name, Init::Const(0.0), DType::F32, &Device::Cpu)?;
            let t = Tensor::from_slice(v, (v.len(),), &Device::Cpu)?;
            lock(&vm)?
                .get(*name)
                .ok_or_else(|| anyhow!("no var"))?
                .set(&t)?;
        }
        Ok(vm)
    }

    fn values(vm: &VarMap, name: &str) -> Result<Vec<f32>> {
        Ok(lock(vm)?
            .get(name)
            .ok_or_else(|| anyhow!("no var"))?
            .as_tensor()
            .to_vec1()?)
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let src = varmap_with(&[("var1", vec![1.0, 2.0, 3.0])])?;
        let dest = varmap_with(&[("var1", vec![4.0, 5.0, 6.0])])?;
        track(&dest, &src, tau)?;

        let expected = [0.7 * 1.0 + 0.3 * 4.0, 0.7 * 2.0 + 0.3 * 5.0, 0.7 * 3.0 + 0.3 * 6.0];
        for (x, y) in values(&dest, "var1")?.iter().zip(expected.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_hard_copy_keeps_storage() -> Result<()> {
        let src = varmap_with(&[("w", vec![1.0, 2.0])])?;
        let dest = varmap_with(&[("w", vec![0.0, 0.0])])?;
        hard_copy(&dest, &src)?;
        assert_eq!(values(&dest, "w")?, vec![1.0, 2.0]);

        // later changes of the source do not leak into the copy
        lock(&src)?
            .get("w")
            .ok_or_else(|| anyhow!("no var"))?
            .set(&Tensor::from_slice(&[5f32, 5.0], (2,), &Device::Cpu)?)?;
        assert_eq!(values(&dest, "w")?, vec![1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_smooth_l1_loss() -> Result<()> {
        let x = Tensor::from_slice(&[0.0f32, 0.5, -3.0], (3,), &Device::Cpu)?;
        let y = Tensor::zeros((3,), DType::F32, &Device::Cpu)?;
        let l = CriticLoss::SmoothL1.elementwise(&x, &y)?.to_vec1::<f32>()?;
        assert_eq!(l, vec![0.0, 0.125, 2.5]);

        let l = CriticLoss::Mse.elementwise(&x, &y)?.to_vec1::<f32>()?;
        assert_eq!(l, vec![0.0, 0.25, 9.0]);
        Ok(())
    }

    #[test]
    fn test_insert_stats() {
        let mut record = Record::empty();
        insert_stats(&mut record, "td_err", &[1.0, -1.0, 3.0]);
        assert_eq!(record.get_scalar("td_err_mean").unwrap(), 1.0);
        assert_eq!(record.get_scalar("td_err_min").unwrap(), -1.0);
        assert_eq!(record.get_scalar("td_err_max").unwrap(), 3.0);
        assert_eq!(record.get_scalar("td_err_std").unwrap(), 2.0);
    }
}
