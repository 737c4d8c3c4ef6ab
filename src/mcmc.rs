use rand::Rng;

use crate::error::SweepError;
use crate::model::Model;

pub mod gibbs;

pub use gibbs::PartitionGibbs;

/// A Markov chain Monte Carlo sampler over models of type `M`.
///
/// One `step` is the sampler's atomic unit of work (a full Gibbs sweep
/// here); a step either completes or fails leaving the model internally
/// consistent.
pub trait Sampler<M, X>
where
    M: Model<X>,
{
    /// Advance the chain by one step.
    fn step<R: Rng>(&mut self, model: &mut M, data: &[X], rng: &mut R) -> Result<(), SweepError>;

    /// Advance the chain by `steps` steps, stopping at the first failure.
    fn multi_step<R: Rng>(
        &mut self,
        model: &mut M,
        data: &[X],
        steps: usize,
        rng: &mut R,
    ) -> Result<(), SweepError> {
        for _ in 0..steps {
            self.step(model, data, rng)?;
        }
        Ok(())
    }
}
