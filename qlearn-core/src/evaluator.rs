//! Evaluation of policies.
use crate::{record::Record, Env, Policy};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluates a policy, typically by running test episodes.
pub trait Evaluator<E: Env> {
    /// Evaluates `policy`, returning the score and diagnostics.
    ///
    /// The caller is responsible for the internal state of `policy`,
    /// e.g. its exploration rate.
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<(f32, Record)>;
}
