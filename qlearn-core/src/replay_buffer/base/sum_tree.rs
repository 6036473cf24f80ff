//! Sum tree for prioritized sampling.
//!
//! The layout follows the array-based sum tree used in OpenAI baselines:
//! a complete binary tree of `2 * capacity - 1` nodes whose leaves hold the
//! priorities `p_i^alpha` and whose inner nodes hold the sums of their children.
use rand::Rng;
use segment_tree::{
    ops::{MaxIgnoreNaN, MinIgnoreNaN},
    SegmentPoint,
};
use serde::{Deserialize, Serialize};

/// Normalization of importance sampling weights.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Normalized by the maximum possible weight over all transitions in the buffer.
    All,

    /// Normalized by the maximum weight in the sampled batch.
    Batch,
}

#[derive(Debug)]
pub struct SumTree {
    alpha: f32,
    eps: f32,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f32>,
    /// `p_i^alpha` of the stored transitions.
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    /// Raw priorities `p_i` of the stored transitions.
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
    normalize: WeightNormalizer,
}

impl SumTree {
    pub fn new(capacity: usize, alpha: f32, eps: f32, normalize: WeightNormalizer) -> Self {
        Self {
            alpha,
            eps,
            capacity,
            n_samples: 0,
            tree: vec![0f32; 2 * capacity - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            max_tree: SegmentPoint::build(vec![0f32; capacity], MaxIgnoreNaN),
            normalize,
        }
    }

    fn propagate(&mut self, ix: usize, change: f32) {
        let mut ix = ix;
        while ix != 0 {
            ix = (ix - 1) / 2;
            self.tree[ix] += change;
        }
    }

    fn retrieve(&self, ix: usize, s: f32) -> usize {
        let left = 2 * ix + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return ix;
        }

        if s <= self.tree[left] || self.tree[right] == 0f32 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }

    /// Sum of `p_i^alpha` over the stored transitions.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Maximum raw priority among the stored transitions, 1 if the tree is empty.
    pub fn max(&self) -> f32 {
        if self.n_samples == 0 {
            1.0
        } else {
            self.max_tree.query(0, self.n_samples)
        }
    }

    /// `p_i^alpha` stored at the `ix`-th leaf.
    pub fn leaf(&self, ix: usize) -> f32 {
        self.tree[ix + self.capacity - 1]
    }

    fn set(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);

        let p_alpha = p.powf(self.alpha);
        self.min_tree.modify(ix, p_alpha);
        self.max_tree.modify(ix, p);
        let ix = ix + self.capacity - 1;
        let change = p_alpha - self.tree[ix];
        self.tree[ix] = p_alpha;
        self.propagate(ix, change);
    }

    /// Sets the raw priority `p` of a newly stored transition at `ix`.
    pub fn add(&mut self, ix: usize, p: f32) {
        self.set(ix, p);

        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Sets the priority at `ix` to `|td_err| + eps`.
    pub fn update(&mut self, ix: usize, td_err: f32) {
        self.set(ix, td_err.abs() + self.eps);
    }

    /// Index of the leaf where the cumulative sum of `p_i^alpha` reaches `s`.
    pub fn get(&self, s: f32) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        (ix + 1 - self.capacity).min(self.n_samples - 1)
    }

    /// Samples indices of transitions and their normalized importance weights.
    ///
    /// The range `[0, total)` is split into `batch_size` segments and an index is
    /// drawn from each of them. The weight is `(N * P(i))^(-beta)`.
    pub fn sample(&self, batch_size: usize, beta: f32, rng: &mut impl Rng) -> (Vec<usize>, Vec<f32>) {
        if batch_size == 0 || self.n_samples == 0 {
            return (vec![], vec![]);
        }

        let total = self.total();
        let segment = total / batch_size as f32;
        let ixs = (0..batch_size)
            .map(|i| self.get(segment * (i as f32 + rng.gen::<f32>())))
            .collect::<Vec<_>>();

        let n = self.n_samples as f32;
        let ws = ixs
            .iter()
            .map(|&ix| (n * self.leaf(ix) / total).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = match self.normalize {
            WeightNormalizer::All => {
                let p_min = self.min_tree.query(0, self.n_samples);
                (n * p_min / total).powf(-beta)
            }
            WeightNormalizer::Batch => ws.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        };
        let ws = ws.iter().map(|w| w / w_max).collect();

        (ixs, ws)
    }
}
