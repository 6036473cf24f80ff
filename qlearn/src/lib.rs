//! Value-based deep Q-learning in Rust.
//!
//! qlearn consists of the following crates:
//!
//! * [qlearn-core](qlearn_core) provides the traits shared by environments and agents,
//!   a replay buffer with uniform and prioritized sampling, the collector filling it,
//!   and the trainer running epochs of collection, optimization and testing.
//! * [qlearn-candle-agent](qlearn_candle_agent) implements DQN with
//!   [candle](https://crates.io/crates/candle-core): vanilla DQN, double DQN with a
//!   target network updated by hard copies or Polyak averaging, and the replay-free
//!   DQN updating on the latest transition only.
//! * [qlearn-cartpole-env](qlearn_cartpole_env) is a native cart-pole environment.
//!
//! This crate re-exports them and wires them together for the cart-pole experiments
//! in [`cartpole`], which are run by the `dqn_cartpole`, `double_dqn_cartpole` and
//! `raw_dqn_cartpole` examples.
pub mod cartpole;

pub use qlearn_candle_agent;
pub use qlearn_cartpole_env;
pub use qlearn_core;
