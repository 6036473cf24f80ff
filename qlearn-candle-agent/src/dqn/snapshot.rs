use crate::util::named_tensors;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::info;
use std::{collections::HashMap, fs, path::Path};

/// File name of the parameters of the online network.
pub(super) const QNET_FILE: &str = "qnet.safetensors";

/// File name of the parameters of the target network.
pub(super) const QNET_TGT_FILE: &str = "qnet_tgt.safetensors";

/// A copy of the parameters of a DQN agent on the CPU.
///
/// The snapshot does not share memory with the networks of the agent, so it can
/// be kept or written while training goes on.
#[derive(Clone, Debug)]
pub struct ParamSnapshot {
    qnet: Vec<(String, Tensor)>,
    qnet_tgt: Option<Vec<(String, Tensor)>>,
}

impl ParamSnapshot {
    pub(super) fn new(qnet: &VarMap, qnet_tgt: Option<&VarMap>) -> Result<Self> {
        Ok(Self {
            qnet: named_tensors(qnet, &Device::Cpu)?,
            qnet_tgt: qnet_tgt
                .map(|vm| named_tensors(vm, &Device::Cpu))
                .transpose()?,
        })
    }

    /// Parameters of the online network, sorted by name.
    pub fn qnet(&self) -> &[(String, Tensor)] {
        &self.qnet
    }

    /// Parameters of the target network, sorted by name.
    pub fn qnet_tgt(&self) -> Option<&[(String, Tensor)]> {
        self.qnet_tgt.as_deref()
    }

    /// Writes the parameters in `dir` as safetensors files.
    ///
    /// The files can be loaded by [`Agent::load_params`](qlearn_core::Agent::load_params).
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        save_tensors(&self.qnet, &dir.join(QNET_FILE))?;
        if let Some(qnet_tgt) = &self.qnet_tgt {
            save_tensors(qnet_tgt, &dir.join(QNET_TGT_FILE))?;
        }
        info!("Saved parameters in {:?}", dir);
        Ok(())
    }
}

fn save_tensors(tensors: &[(String, Tensor)], path: &Path) -> Result<()> {
    let tensors = tensors.iter().cloned().collect::<HashMap<_, _>>();
    candle_core::safetensors::save(&tensors, path)?;
    Ok(())
}
