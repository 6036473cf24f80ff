use qlearn_core::{replay_buffer::VecBatch, Obs};

/// Observation of [`CartPole`](crate::CartPole).
///
/// Cart position, cart velocity, pole angle and pole angular velocity.
#[derive(Clone, Debug, PartialEq)]
pub struct CartPoleObs(pub [f32; 4]);

impl Obs for CartPoleObs {}

impl From<CartPoleObs> for VecBatch<f32> {
    fn from(obs: CartPoleObs) -> Self {
        obs.0.to_vec().into()
    }
}
