//! Column storage and batches of transitions.
use crate::TransitionBatch;
use anyhow::Result;

/// Column storage of observations or actions in a replay buffer.
///
/// The same type is used for the storage in the buffer, for items pushed into
/// the buffer (possibly holding several consecutive transitions) and for the
/// samples taken from it.
pub trait BatchBase {
    /// Creates storage for `capacity` items.
    fn new(capacity: usize) -> Self;

    /// Writes the items of `data` from the `ix`-th position,
    /// wrapping around at the end of the storage.
    fn push(&mut self, ix: usize, data: Self) -> Result<()>;

    /// Gathers the items at `ixs`.
    fn sample(&self, ixs: &[usize]) -> Result<Self>
    where
        Self: Sized;
}

/// Column storage backed by a [`Vec`].
///
/// Each item consists of `item_len` consecutive elements, e.g. a 4-dimensional
/// observation vector. The item length of the storage is fixed by the first push.
#[derive(Clone, Debug, PartialEq)]
pub struct VecBatch<T> {
    item_len: usize,
    capacity: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> VecBatch<T> {
    /// Creates a batch from items of `item_len` elements laid out in `data`.
    pub fn from_items(item_len: usize, data: Vec<T>) -> Self {
        debug_assert!(item_len > 0 && data.len() % item_len == 0);
        Self {
            item_len,
            capacity: data.len() / item_len,
            data,
        }
    }

    /// Returns the number of items the batch can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of elements of an item.
    pub fn item_len(&self) -> usize {
        self.item_len
    }

    /// Returns the `i`-th item.
    pub fn item(&self, i: usize) -> &[T] {
        &self.data[i * self.item_len..(i + 1) * self.item_len]
    }

    /// Returns an iterator over the items.
    pub fn items(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks(self.item_len.max(1))
    }

    /// Returns the underlying elements.
    pub fn data(&self) -> &Vec<T> {
        &self.data
    }
}

impl<T: Clone + Default> From<Vec<T>> for VecBatch<T> {
    /// A batch of a single item.
    fn from(data: Vec<T>) -> Self {
        Self::from_items(data.len(), data)
    }
}

impl<T: Clone + Default> BatchBase for VecBatch<T> {
    fn new(capacity: usize) -> Self {
        Self {
            item_len: 0,
            capacity,
            data: vec![],
        }
    }

    fn push(&mut self, ix: usize, data: Self) -> Result<()> {
        if self.data.is_empty() {
            self.item_len = data.item_len;
            self.data = vec![T::default(); self.capacity * self.item_len];
        }
        anyhow::ensure!(
            data.item_len == self.item_len,
            "item length mismatch: {} != {}",
            data.item_len,
            self.item_len
        );

        let n = self.item_len;
        for (j, item) in data.data.chunks(n).enumerate() {
            let dst = (ix + j) % self.capacity;
            self.data[dst * n..(dst + 1) * n].clone_from_slice(item);
        }

        Ok(())
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        let n = self.item_len;
        let data = ixs
            .iter()
            .flat_map(|&ix| self.data[ix * n..(ix + 1) * n].iter().cloned())
            .collect();
        Ok(Self {
            item_len: n,
            capacity: ixs.len(),
            data,
        })
    }
}

/// A batch of transitions, also used as an item pushed into [`SimpleReplayBuffer`].
///
/// [`SimpleReplayBuffer`]: super::SimpleReplayBuffer
pub struct GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Next observations.
    pub next_obs: O,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminated: Vec<i8>,

    /// Truncation flags.
    pub is_truncated: Vec<i8>,

    /// Importance sampling weights, available for prioritized sampling.
    pub weight: Option<Vec<f32>>,

    /// Indices of the sampled transitions in the buffer.
    pub ix_sample: Option<Vec<usize>>,
}

impl<O, A> TransitionBatch for GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type ObsBatch = O;
    type ActBatch = A;

    fn unpack(
        self,
    ) -> (
        Self::ObsBatch,
        Self::ActBatch,
        Self::ObsBatch,
        Vec<f32>,
        Vec<i8>,
        Vec<i8>,
        Option<Vec<usize>>,
        Option<Vec<f32>>,
    ) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_terminated,
            self.is_truncated,
            self.ix_sample,
            self.weight,
        )
    }

    fn len(&self) -> usize {
        self.reward.len()
    }

    fn obs(&self) -> &Self::ObsBatch {
        &self.obs
    }

    fn act(&self) -> &Self::ActBatch {
        &self.act
    }
}
