//! Replay buffer interfaces.
//!
//! Storing transitions and sampling them are separated into two traits:
//! [`ExperienceBufferBase`] is used by the collector, [`ReplayBufferBase`] by agents.
use anyhow::Result;

/// A buffer storing items generated from interactions with an environment.
pub trait ExperienceBufferBase {
    /// Items pushed into the buffer.
    type Item;

    /// Pushes an item into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the number of transitions in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no transition.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A replay buffer generating batches of transitions for optimization.
pub trait ReplayBufferBase {
    /// Configuration of the buffer.
    type Config: Clone;

    /// Batch generated by the buffer.
    type Batch;

    /// Builds a replay buffer.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Samples a batch of `size` transitions.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of the transitions at `ixs` with their TD errors.
    ///
    /// Buffers without prioritized sampling ignore the call.
    fn update_priority(
        &mut self,
        ixs: &Option<Vec<usize>>,
        td_err: &Option<Vec<f32>>,
    ) -> Result<()>;
}
