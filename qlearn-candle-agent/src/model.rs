//! Interface of neural networks used in agents.
use anyhow::Result;
use candle_nn::VarBuilder;

/// Neural network with a single input and a single output.
///
/// The parameters of the network are created through the given [`VarBuilder`],
/// so that the owner of the corresponding [`VarMap`](candle_nn::VarMap) can
/// optimize, copy and save them.
pub trait SubModel1 {
    /// Configuration from which the network is constructed.
    type Config;

    /// Input of the network.
    type Input;

    /// Output of the network.
    type Output;

    /// Builds the network.
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Forward computation.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;
}
