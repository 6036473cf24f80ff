//! Agent.
use super::{Env, Policy, ReplayBufferBase};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// A trainable policy on an environment.
pub trait Agent<E: Env, R: ReplayBufferBase>: Policy<E> {
    /// Sets the policy to training mode.
    fn train(&mut self);

    /// Sets the policy to evaluation mode.
    fn eval(&mut self);

    /// Returns `true` in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step with transitions taken from `buffer`.
    ///
    /// Returns `None` when the step was skipped, e.g. the buffer does not hold
    /// enough transitions yet. Otherwise the returned record contains diagnostics
    /// of the step and at least the key `loss`.
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>>;

    /// Saves the parameters of the agent in the given directory.
    ///
    /// The agent may create several files in the directory, e.g. the DQN agent
    /// writes one file per Q-network.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
