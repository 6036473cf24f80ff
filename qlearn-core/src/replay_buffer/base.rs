//! Generic replay buffer.
mod iw_scheduler;
mod sum_tree;
use super::{config::PerConfig, BatchBase, GenericTransitionBatch, SimpleReplayBufferConfig};
use crate::{error::QlError, ExperienceBufferBase, ReplayBufferBase, TransitionBatch};
use anyhow::Result;
pub use iw_scheduler::IwScheduler;
use log::trace;
use rand::{rngs::StdRng, seq::index, SeedableRng};
use sum_tree::SumTree;
pub use sum_tree::WeightNormalizer;

struct PerState {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
}

impl PerState {
    fn new(capacity: usize, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(
                capacity,
                per_config.alpha,
                per_config.eps,
                per_config.normalize,
            ),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
        }
    }
}

/// A fixed-size circular replay buffer.
///
/// Transitions are stored column by column: observations, actions and next
/// observations in [`BatchBase`] storages, rewards and flags in vectors.
/// Once the buffer is full, pushed transitions overwrite the oldest ones.
///
/// Without [`PerConfig`], [`ReplayBufferBase::batch`] draws transitions uniformly
/// at random without replacement. With [`PerConfig`], transitions are drawn with
/// probability proportional to `priority^alpha` and the batch carries importance
/// sampling weights. A newly pushed transition takes the maximum priority among
/// the stored transitions so that it is sampled at least once.
pub struct SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    capacity: usize,

    /// Write cursor.
    i: usize,

    /// Number of stored transitions.
    size: usize,

    obs: O,
    act: A,
    next_obs: O,
    reward: Vec<f32>,
    is_terminated: Vec<i8>,
    is_truncated: Vec<i8>,
    rng: StdRng,
    per_state: Option<PerState>,
}

impl<O, A> SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    #[inline]
    fn push_column<T: Copy>(column: &mut [T], i: usize, b: &[T]) {
        let capacity = column.len();
        for (j, v) in b.iter().enumerate() {
            column[(i + j) % capacity] = *v;
        }
    }

    fn sample_column<T: Copy>(column: &[T], ixs: &[usize]) -> Vec<T> {
        ixs.iter().map(|&ix| column[ix]).collect()
    }

    /// Gives the maximum priority to `n` transitions from the write cursor.
    fn set_priority(&mut self, n: usize) {
        if let Some(per_state) = self.per_state.as_mut() {
            let max_p = per_state.sum_tree.max();
            for j in 0..n {
                let i = (self.i + j) % self.capacity;
                per_state.sum_tree.add(i, max_p);
            }
        }
    }

    /// Returns the maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if prioritized sampling is enabled.
    pub fn is_prioritized(&self) -> bool {
        self.per_state.is_some()
    }

    /// Returns the current exponent of importance sampling weights.
    pub fn beta(&self) -> Option<f32> {
        self.per_state.as_ref().map(|s| s.iw_scheduler.beta())
    }

    /// Returns the actions of all stored transitions, in storage order.
    ///
    /// This clones the whole column, use it with care on large buffers.
    pub fn whole_actions(&self) -> Result<A> {
        let ixs = (0..self.size).collect::<Vec<_>>();
        self.act.sample(&ixs)
    }

    /// Returns the rewards of all stored transitions, in storage order.
    pub fn whole_rewards(&self) -> Vec<f32> {
        self.reward[..self.size].to_vec()
    }

    /// Returns the number of stored transitions with the termination flag.
    pub fn num_terminated_flags(&self) -> usize {
        self.is_terminated[..self.size]
            .iter()
            .map(|&f| f as usize)
            .sum()
    }

    /// Returns the number of stored transitions with the truncation flag.
    pub fn num_truncated_flags(&self) -> usize {
        self.is_truncated[..self.size]
            .iter()
            .map(|&f| f as usize)
            .sum()
    }

    /// Returns the sum of the rewards of the stored transitions.
    pub fn sum_rewards(&self) -> f32 {
        self.reward[..self.size].iter().sum()
    }
}

impl<O, A> ExperienceBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Item = GenericTransitionBatch<O, A>;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        let len = tr.len();
        let (obs, act, next_obs, reward, is_terminated, is_truncated, _, _) = tr.unpack();
        self.obs.push(self.i, obs)?;
        self.act.push(self.i, act)?;
        self.next_obs.push(self.i, next_obs)?;
        Self::push_column(&mut self.reward, self.i, &reward);
        Self::push_column(&mut self.is_terminated, self.i, &is_terminated);
        Self::push_column(&mut self.is_truncated, self.i, &is_truncated);
        self.set_priority(len);

        self.i = (self.i + len) % self.capacity;
        self.size = (self.size + len).min(self.capacity);

        Ok(())
    }
}

impl<O, A> ReplayBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Config = SimpleReplayBufferConfig;
    type Batch = GenericTransitionBatch<O, A>;

    fn build(config: &Self::Config) -> Result<Self> {
        let capacity = config.capacity;
        if capacity == 0 {
            return Err(QlError::InvalidConfig("capacity must be positive".into()).into());
        }
        let per_state = match &config.per_config {
            Some(per_config) => {
                per_config.check()?;
                Some(PerState::new(capacity, per_config))
            }
            None => None,
        };

        Ok(Self {
            capacity,
            i: 0,
            size: 0,
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: vec![0.; capacity],
            is_terminated: vec![0; capacity],
            is_truncated: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
            per_state,
        })
    }

    /// Samples `size` transitions.
    ///
    /// Returns [`QlError::InsufficientTransitions`] if the buffer holds fewer
    /// than `size` transitions.
    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if size > self.size {
            return Err(QlError::InsufficientTransitions {
                required: size,
                available: self.size,
            }
            .into());
        }

        let (ixs, weight) = match &self.per_state {
            Some(per_state) => {
                let beta = per_state.iw_scheduler.beta();
                let (ixs, weight) = per_state.sum_tree.sample(size, beta, &mut self.rng);
                (ixs, Some(weight))
            }
            None => (index::sample(&mut self.rng, self.size, size).into_vec(), None),
        };

        Ok(Self::Batch {
            obs: self.obs.sample(&ixs)?,
            act: self.act.sample(&ixs)?,
            next_obs: self.next_obs.sample(&ixs)?,
            reward: Self::sample_column(&self.reward, &ixs),
            is_terminated: Self::sample_column(&self.is_terminated, &ixs),
            is_truncated: Self::sample_column(&self.is_truncated, &ixs),
            ix_sample: Some(ixs),
            weight,
        })
    }

    /// Sets the priorities at `ixs` to `|td_err| + eps`.
    ///
    /// Does nothing without prioritized sampling.
    fn update_priority(
        &mut self,
        ixs: &Option<Vec<usize>>,
        td_errs: &Option<Vec<f32>>,
    ) -> Result<()> {
        if let Some(per_state) = &mut self.per_state {
            let (ixs, td_errs) = match (ixs, td_errs) {
                (Some(ixs), Some(td_errs)) => (ixs, td_errs),
                _ => return Err(QlError::MissingPriorityInfo.into()),
            };
            anyhow::ensure!(
                ixs.len() == td_errs.len(),
                "{} indices and {} TD errors were given",
                ixs.len(),
                td_errs.len()
            );
            anyhow::ensure!(
                td_errs.iter().all(|e| e.is_finite()),
                "TD errors must be finite: {:?}",
                td_errs
            );
            for (&ix, &td_err) in ixs.iter().zip(td_errs.iter()) {
                per_state.sum_tree.update(ix, td_err);
            }
            per_state.iw_scheduler.add_n_opts();
            trace!("beta = {}", per_state.iw_scheduler.beta());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::VecBatch;
    use std::collections::HashSet;

    type Buffer = SimpleReplayBuffer<VecBatch<f32>, VecBatch<i64>>;
    type Transition = GenericTransitionBatch<VecBatch<f32>, VecBatch<i64>>;

    /// The `id`-th transition, whose action and reward carry the id.
    fn transition(id: usize) -> Transition {
        GenericTransitionBatch {
            obs: vec![id as f32, 0.0].into(),
            act: vec![id as i64].into(),
            next_obs: vec![id as f32 + 1.0, 0.0].into(),
            reward: vec![id as f32],
            is_terminated: vec![(id % 5 == 4) as i8],
            is_truncated: vec![0],
            weight: None,
            ix_sample: None,
        }
    }

    fn buffer(capacity: usize, per_config: Option<PerConfig>) -> Buffer {
        let config = SimpleReplayBufferConfig::default()
            .capacity(capacity)
            .seed(42)
            .per_config(per_config);
        Buffer::build(&config).unwrap()
    }

    #[test]
    fn test_fill_count() {
        for capacity in [1, 3, 10] {
            for n in [0, 1, 2, 10, 25] {
                let mut buffer = buffer(capacity, None);
                (0..n).for_each(|id| buffer.push(transition(id)).unwrap());
                assert_eq!(buffer.len(), n.min(capacity));
            }
        }
    }

    #[test]
    fn test_oldest_transitions_are_overwritten() {
        let mut buffer = buffer(10, None);
        (0..15).for_each(|id| buffer.push(transition(id)).unwrap());

        let mut ids = buffer.whole_actions().unwrap().data().clone();
        ids.sort();
        assert_eq!(ids, (5..15).collect::<Vec<i64>>());

        let mut rewards = buffer.whole_rewards();
        rewards.sort_by(|x, y| x.total_cmp(y));
        assert_eq!(rewards, (5..15).map(|v| v as f32).collect::<Vec<_>>());
        assert_eq!(buffer.num_terminated_flags(), 2);
        assert_eq!(buffer.sum_rewards(), (5..15).sum::<usize>() as f32);
    }

    #[test]
    fn test_batch_is_consistent() {
        let mut buffer = buffer(10, None);
        (0..15).for_each(|id| buffer.push(transition(id)).unwrap());

        let batch = buffer.batch(4).unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.weight.is_none());
        let (obs, act, next_obs, reward, ..) = batch.unpack();
        for i in 0..4 {
            let id = act.item(i)[0];
            assert!((5..15).contains(&id));
            assert_eq!(obs.item(i)[0], id as f32);
            assert_eq!(next_obs.item(i)[0], id as f32 + 1.0);
            assert_eq!(reward[i], id as f32);
        }
    }

    #[test]
    fn test_insufficient_transitions() {
        let mut buffer = buffer(10, None);
        (0..3).for_each(|id| buffer.push(transition(id)).unwrap());

        let err = buffer.batch(4).err().unwrap();
        match err.downcast_ref::<QlError>() {
            Some(QlError::InsufficientTransitions {
                required,
                available,
            }) => {
                assert_eq!(*required, 4);
                assert_eq!(*available, 3);
            }
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_uniform_sampling_without_replacement() {
        let capacity = 20;
        let batch_size = 8;
        let n_batches = 5000;
        let mut buffer = buffer(capacity, None);
        (0..capacity).for_each(|id| buffer.push(transition(id)).unwrap());

        let mut counts = vec![0f32; capacity];
        for _ in 0..n_batches {
            let batch = buffer.batch(batch_size).unwrap();
            let ids = batch.act.data().clone();
            let unique = ids.iter().collect::<HashSet<_>>();
            assert_eq!(unique.len(), batch_size);
            ids.iter().for_each(|&id| counts[id as usize] += 1.0);
        }

        // Chi-squared statistic with 19 degrees of freedom, 0.999 quantile is 43.8
        let expected = (n_batches * batch_size) as f32 / capacity as f32;
        let chi2: f32 = counts
            .iter()
            .map(|c| (c - expected).powi(2) / expected)
            .sum();
        assert!(chi2 < 43.8, "chi2 = {}", chi2);
    }

    #[test]
    fn test_priority_ratio() {
        let per_config = PerConfig::default().alpha(1.0).eps(1e-6);
        let mut buffer = buffer(4, Some(per_config));
        (0..2).for_each(|id| buffer.push(transition(id)).unwrap());

        // Transition 1 is 3 times more important than transition 0
        buffer
            .update_priority(&Some(vec![0, 1]), &Some(vec![1.0, -3.0]))
            .unwrap();

        let mut counts = [0f32; 2];
        for _ in 0..5000 {
            let batch = buffer.batch(2).unwrap();
            let ixs = batch.ix_sample.unwrap();
            ixs.iter().for_each(|&ix| counts[ix] += 1.0);
        }
        let ratio = counts[1] / counts[0];
        assert!((ratio - 3.0).abs() < 0.2, "ratio = {}", ratio);
    }

    #[test]
    fn test_max_weight_is_one() {
        let per_config = PerConfig::default().alpha(0.6).beta_0(0.4);
        let mut buffer = buffer(16, Some(per_config));
        (0..16).for_each(|id| buffer.push(transition(id)).unwrap());
        let ixs = (0..16).collect::<Vec<_>>();
        let td_errs = (0..16).map(|i| 0.1 * i as f32).collect::<Vec<_>>();
        buffer
            .update_priority(&Some(ixs), &Some(td_errs))
            .unwrap();

        for _ in 0..100 {
            let batch = buffer.batch(8).unwrap();
            let ws = batch.weight.unwrap();
            let w_max = ws.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            assert!((w_max - 1.0).abs() < 1e-6);
            assert!(ws.iter().all(|&w| w > 0.0 && w <= 1.0));
        }
    }

    #[test]
    fn test_zero_td_error_keeps_positive_priority() {
        let per_config = PerConfig::default().alpha(1.0);
        let mut buffer = buffer(2, Some(per_config));
        (0..2).for_each(|id| buffer.push(transition(id)).unwrap());
        buffer
            .update_priority(&Some(vec![0, 1]), &Some(vec![0.0, 0.0]))
            .unwrap();

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let batch = buffer.batch(1).unwrap();
            seen.insert(batch.ix_sample.unwrap()[0]);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_new_transition_gets_max_priority() {
        let per_config = PerConfig::default().alpha(1.0);
        let mut buffer = buffer(4, Some(per_config));
        buffer.push(transition(0)).unwrap();
        buffer
            .update_priority(&Some(vec![0]), &Some(vec![5.0]))
            .unwrap();
        buffer.push(transition(1)).unwrap();

        let per_state = buffer.per_state.as_ref().unwrap();
        assert_eq!(per_state.sum_tree.leaf(0), per_state.sum_tree.leaf(1));
    }

    #[test]
    fn test_leaf_holds_powered_priority() {
        let per_config = PerConfig::default().alpha(0.6).eps(1e-2);
        let mut buffer = buffer(4, Some(per_config));
        (0..4).for_each(|id| buffer.push(transition(id)).unwrap());
        let td_errs = vec![0.5, -2.0, 0.0, 1.0];
        buffer
            .update_priority(&Some(vec![0, 1, 2, 3]), &Some(td_errs.clone()))
            .unwrap();

        let sum_tree = &buffer.per_state.as_ref().unwrap().sum_tree;
        for (ix, td_err) in td_errs.iter().enumerate() {
            let expected = (td_err.abs() + 1e-2).powf(0.6);
            assert!((sum_tree.leaf(ix) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_non_finite_td_error_is_rejected() {
        let per_config = PerConfig::default().alpha(1.0);
        let mut buffer = buffer(8, Some(per_config));
        (0..8).for_each(|id| buffer.push(transition(id)).unwrap());
        let leaf_3 = buffer.per_state.as_ref().unwrap().sum_tree.leaf(3);

        for td_err in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let res = buffer.update_priority(&Some(vec![2, 3]), &Some(vec![1.0, td_err]));
            assert!(res.is_err());
        }

        // the tree is left untouched, including the finite error given with the others
        let sum_tree = &buffer.per_state.as_ref().unwrap().sum_tree;
        assert_eq!(sum_tree.leaf(2), leaf_3);
        assert_eq!(sum_tree.leaf(3), leaf_3);

        let batch = buffer.batch(6).unwrap();
        assert!(batch.weight.unwrap().iter().all(|w| w.is_finite()));
        let ixs = batch.ix_sample.unwrap().into_iter().collect::<HashSet<_>>();
        assert!(ixs.len() > 1);
    }

    #[test]
    fn test_missing_priority_info() {
        let mut buffer = buffer(4, Some(PerConfig::default()));
        buffer.push(transition(0)).unwrap();
        assert!(buffer.update_priority(&None, &Some(vec![0.0])).is_err());

        let mut uniform = self::buffer(4, None);
        uniform.push(transition(0)).unwrap();
        assert!(uniform.update_priority(&None, &None).is_ok());
    }
}
