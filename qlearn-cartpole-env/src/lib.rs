//! Cart-pole environment.
//!
//! [`CartPole`] simulates the classic control task of balancing a pole on a cart,
//! with the dynamics, thresholds and initial state distribution of `CartPole-v1`
//! of OpenAI Gym. Episodes are truncated after [`CartPoleConfig::max_steps`] steps.
//!
//! With the `candle` feature, observations and actions convert into tensors used by
//! [`qlearn_candle_agent`].
mod act;
mod base;
#[cfg(feature = "candle")]
mod candle;
mod config;
mod obs;
pub use act::CartPoleAct;
pub use base::CartPole;
pub use config::CartPoleConfig;
pub use obs::CartPoleObs;
