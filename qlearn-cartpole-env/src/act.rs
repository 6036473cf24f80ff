use qlearn_core::{replay_buffer::VecBatch, Act};

/// Action of [`CartPole`](crate::CartPole), 0 pushes the cart to the left and 1 to the right.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartPoleAct(pub i64);

impl Act for CartPoleAct {}

impl From<CartPoleAct> for VecBatch<i64> {
    fn from(act: CartPoleAct) -> Self {
        vec![act.0].into()
    }
}
