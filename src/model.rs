use rand::Rng;

use crate::state::ClusterId;

pub mod mixture;

pub use mixture::DpMixture;

/// A model with a log score (posterior or any generic score).
pub trait Model<X> {
    /// Log posterior score of the current configuration given `data`.
    fn ln_score(&self, data: &[X]) -> f64;
}

/// A model whose latent structure is a partition of the data into an
/// unbounded set of clusters, addressed by stable ids.
pub trait PartitionModel<X>: Model<X> {
    /// Token pairing a removal with its reassignment or rollback.
    type Removal;

    /// Cluster assignment per observation.
    fn assignments(&self) -> &[Option<ClusterId>];

    /// Live cluster ids in stable order.
    fn live_clusters(&self) -> Vec<ClusterId>;

    /// Number of live clusters.
    fn n_clusters(&self) -> usize;

    /// Add observation `idx` to the live cluster `cluster`.
    fn assign(&mut self, idx: usize, cluster: ClusterId, data: &[X]);

    /// Open a fresh cluster for observation `idx`. The rng covers any
    /// parameter draw the model performs for the newborn cluster.
    fn assign_new<R: Rng>(&mut self, idx: usize, data: &[X], rng: &mut R) -> ClusterId;

    /// Remove observation `idx` from its cluster, destroying the cluster
    /// if it empties. `None` if `idx` was unassigned.
    fn unassign(&mut self, idx: usize, data: &[X]) -> Option<Self::Removal>;

    /// Undo a removal, restoring the pre-removal cluster.
    fn restore(&mut self, removal: Self::Removal, data: &[X]);

    /// Unnormalized log weight for `x` joining the live cluster `cluster`.
    fn ln_pp_cluster(&self, x: &X, cluster: ClusterId) -> f64;

    /// Unnormalized log weight for `x` opening a new cluster.
    fn ln_pp_new(&self, x: &X) -> f64;

    /// Total data log-likelihood under the current assignments.
    fn ln_likelihood(&self, data: &[X]) -> f64;

    /// Redraw per-cluster parameters from their posteriors. A no-op for
    /// collapsed models.
    fn resample_params<R: Rng>(&mut self, rng: &mut R);

    /// Number of observations.
    fn n_data(&self) -> usize {
        self.assignments().len()
    }
}
