//! DQN agent.
//!
//! [`Dqn`] implements three variants selected by [`DqnKind`]:
//!
//! * [`DqnKind::Vanilla`]: the target is computed with the online network,
//!   `r + (1 - done) * gamma * max_a Q(o', a)`.
//! * [`DqnKind::Double`]: the greedy action is chosen by the online network and
//!   evaluated by the target network, which tracks the online network through
//!   [`TargetUpdater`].
//! * [`DqnKind::Raw`]: the vanilla target, used without experience replay, i.e.,
//!   with a buffer of capacity 1 and batches of size 1.
mod base;
mod config;
mod explorer;
mod hooks;
mod kind;
mod model;
mod snapshot;
mod target;
pub use base::Dqn;
pub use config::DqnConfig;
pub use explorer::EpsilonGreedy;
pub use hooks::epsilon_hooks;
pub use kind::DqnKind;
pub use model::{DqnModel, DqnModelConfig};
pub use snapshot::ParamSnapshot;
pub use target::TargetUpdater;
