use rand::seq::SliceRandom;
use rand::Rng;
use rv::misc::ln_pflip;

use crate::error::SweepError;
use crate::mcmc::Sampler;
use crate::model::PartitionModel;

/// Gibbs sampling on the space of partitions.
///
/// One step is a full sweep over all observations in a freshly shuffled
/// order. Each observation is removed from its cluster (destroying the
/// cluster if it empties), a categorical distribution is formed over
/// every surviving cluster plus a new-cluster outcome, and the
/// observation is reseated by a draw from it. Log weights are normalized
/// by max-shifted exponentiation inside `ln_pflip`, so small likelihoods
/// do not underflow.
#[derive(Default, Clone, Copy, Debug)]
pub struct PartitionGibbs {}

impl PartitionGibbs {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl<X, M> Sampler<M, X> for PartitionGibbs
where
    M: PartitionModel<X>,
{
    fn step<R: Rng>(&mut self, model: &mut M, data: &[X], rng: &mut R) -> Result<(), SweepError> {
        let mut order: Vec<usize> = (0..model.n_data()).collect();
        order.shuffle(rng);

        for index in order {
            let removal = model.unassign(index, data);
            let x = &data[index];

            let live = model.live_clusters();
            let mut ln_weights: Vec<f64> = live
                .iter()
                .map(|&id| model.ln_pp_cluster(x, id))
                .collect();
            ln_weights.push(model.ln_pp_new(x));

            // A removal is undone before surfacing any failure, so the
            // model never holds a reference to a destroyed cluster.
            if ln_weights.iter().any(|w| w.is_nan() || *w == f64::INFINITY) {
                if let Some(removal) = removal {
                    model.restore(removal, data);
                }
                return Err(SweepError::NonFiniteWeight { observation: index });
            }
            if ln_weights.iter().all(|w| *w == f64::NEG_INFINITY) {
                if let Some(removal) = removal {
                    model.restore(removal, data);
                }
                return Err(SweepError::DegenerateWeights { observation: index });
            }

            let choice = ln_pflip(&ln_weights, false, rng);
            if choice < live.len() {
                model.assign(index, live[choice], data);
            } else {
                model.assign_new(index, data, rng);
            }
        }

        model.resample_params(rng);
        Ok(())
    }
}
