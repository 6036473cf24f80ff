//! Target network updater.
use crate::util::{hard_copy, track};
use anyhow::Result;
use candle_nn::VarMap;
use qlearn_core::error::QlError;

/// Updates the target network every `interval` optimization steps.
///
/// With `tau == 1` the target network is overwritten by the online network,
/// otherwise it is moved towards the online network by Polyak averaging,
/// `target = tau * online + (1 - tau) * target`.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetUpdater {
    tau: f64,
    interval: usize,
    counter: usize,
}

impl TargetUpdater {
    /// Constructs an updater.
    ///
    /// Fails with [`QlError::InvalidConfig`] if `tau` is not in `(0, 1]` or `interval` is 0.
    pub fn new(tau: f64, interval: usize) -> Result<Self> {
        if !(tau > 0.0 && tau <= 1.0) {
            return Err(QlError::InvalidConfig(format!("tau must be in (0, 1], got {}", tau)).into());
        }
        if interval == 0 {
            return Err(QlError::InvalidConfig("target update interval must be positive".into()).into());
        }

        Ok(Self {
            tau,
            interval,
            counter: 0,
        })
    }

    /// Returns the soft update coefficient.
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Returns the number of optimization steps between updates.
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Counts an optimization step of the online network and updates the target
    /// network if `interval` steps have been counted.
    ///
    /// Returns `true` if the target network was updated.
    pub fn on_update(&mut self, target: &VarMap, online: &VarMap) -> Result<bool> {
        self.counter += 1;
        if self.counter < self.interval {
            return Ok(false);
        }
        self.counter -= self.interval;

        if self.tau == 1.0 {
            hard_copy(target, online)?;
        } else {
            track(target, online, self.tau)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::Init;

    /// A varmap of two parameters filled with `v`.
    fn params(v: f32) -> Result<VarMap> {
        let vm = VarMap::new();
        vm.get((2, 3), "w", Init::Const(v as f64), DType::F32, &Device::Cpu)?;
        vm.get(3, "b", Init::Const(v as f64), DType::F32, &Device::Cpu)?;
        Ok(vm)
    }

    fn flat(vm: &VarMap) -> Result<Vec<f32>> {
        let mut xs = vec![];
        for var in vm.all_vars().iter() {
            xs.extend(var.as_tensor().flatten_all()?.to_vec1::<f32>()?);
        }
        Ok(xs)
    }

    fn set_all(vm: &VarMap, v: f32) -> Result<()> {
        for var in vm.all_vars().iter() {
            var.set(&Tensor::full(v, var.dims(), &Device::Cpu)?)?;
        }
        Ok(())
    }

    #[test]
    fn test_soft_update_moves_halfway() -> Result<()> {
        let online = params(2.0)?;
        let target = params(0.0)?;
        let mut updater = TargetUpdater::new(0.5, 1)?;

        assert!(updater.on_update(&target, &online)?);
        let xs = flat(&target)?;
        assert_eq!(xs.len(), 9);
        assert!(xs.iter().all(|&x| x == 1.0));
        Ok(())
    }

    #[test]
    fn test_hard_update_after_interval() -> Result<()> {
        let online = params(0.0)?;
        let target = params(0.0)?;
        let mut updater = TargetUpdater::new(1.0, 3)?;

        for step in 1..=7 {
            set_all(&online, step as f32)?;
            let updated = updater.on_update(&target, &online)?;
            assert_eq!(updated, step % 3 == 0);

            // the target keeps the value of the last multiple of the interval
            let expected = (step / 3 * 3) as f32;
            assert!(flat(&target)?.iter().all(|&x| x == expected));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        for (tau, interval) in [(0.0, 1), (1.5, 1), (-0.1, 1), (f64::NAN, 1), (0.5, 0)] {
            let err = TargetUpdater::new(tau, interval).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<QlError>(),
                Some(QlError::InvalidConfig(_))
            ));
        }
    }
}
