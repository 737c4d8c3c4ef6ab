use std::collections::HashMap;

use rand::Rng;
use rv::data::DataOrSuffStat;
use rv::traits::{ConjugatePrior, HasSuffStat, Rv, Sampleable};

use crate::process::Crp;
use crate::state::{ClusterId, ClusterState, Removal};

use super::{Model, PartitionModel};

/// A Dirichlet process mixture with a conjugate base distribution.
///
/// `Pr` is the base distribution G0 over cluster parameters, `Fx` the
/// observation likelihood. In collapsed form the parameters are
/// integrated out and every weight is a posterior predictive; in
/// instantiated form each live cluster carries an explicit parameter,
/// redrawn from its posterior once per sweep.
#[derive(Clone)]
pub struct DpMixture<X, Fx, Pr>
where
    Fx: Rv<X> + HasSuffStat<X>,
    Pr: ConjugatePrior<X, Fx>,
    Fx::Stat: Clone,
{
    prior: Pr,
    crp: Crp,
    state: ClusterState<X, Fx>,
    collapsed: bool,
}

impl<X, Fx, Pr> DpMixture<X, Fx, Pr>
where
    X: Clone,
    Fx: Rv<X> + HasSuffStat<X>,
    Pr: ConjugatePrior<X, Fx>,
    Fx::Stat: Clone,
{
    /// Build from explicit group labels (any labeling; clusters are
    /// created in order of first appearance). Instantiated models get
    /// their parameters on the first `resample_params` call. The rng
    /// only shapes the empty-suffstat template; the partition itself is
    /// fixed by `labels`.
    pub fn with_assignments<R: Rng>(
        prior: Pr,
        data: &[X],
        crp: Crp,
        collapsed: bool,
        labels: &[usize],
        rng: &mut R,
    ) -> Self {
        assert_eq!(
            labels.len(),
            data.len(),
            "labels do not match data size: {} != {}",
            labels.len(),
            data.len()
        );

        let fx = prior.draw(rng);
        let mut state = ClusterState::new(data.len(), fx.empty_suffstat());

        let mut ids: HashMap<usize, ClusterId> = HashMap::new();
        for (i, (&label, x)) in labels.iter().zip(data).enumerate() {
            match ids.get(&label) {
                Some(&id) => state.assign(i, id, x),
                None => {
                    let id = state.assign_new(i, x);
                    ids.insert(label, id);
                }
            }
        }

        Self { prior, crp, state, collapsed }
    }

    /// Seed the partition with a single CRP run.
    pub fn with_crp_init<R: Rng>(
        prior: Pr,
        data: &[X],
        crp: Crp,
        collapsed: bool,
        rng: &mut R,
    ) -> Self {
        let labels = crp.assignments(data.len(), rng);
        let mut model = Self::with_assignments(prior, data, crp, collapsed, &labels, rng);
        model.resample_params(rng);
        model
    }

    /// Seed the partition uniformly at random over `k` initial groups.
    /// `k = 0` is widened to a single group.
    pub fn with_random_init<R: Rng>(
        prior: Pr,
        data: &[X],
        crp: Crp,
        collapsed: bool,
        k: usize,
        rng: &mut R,
    ) -> Self {
        let k = k.max(1);
        let labels: Vec<usize> = (0..data.len()).map(|_| rng.random_range(0..k)).collect();
        let mut model = Self::with_assignments(prior, data, crp, collapsed, &labels, rng);
        model.resample_params(rng);
        model
    }

    #[must_use]
    pub const fn prior(&self) -> &Pr {
        &self.prior
    }

    #[must_use]
    pub const fn crp(&self) -> &Crp {
        &self.crp
    }

    #[must_use]
    pub const fn collapsed(&self) -> bool {
        self.collapsed
    }

    #[must_use]
    pub const fn state(&self) -> &ClusterState<X, Fx> {
        &self.state
    }

    /// Member counts of live clusters, in id order.
    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        self.state.counts()
    }

    /// Assignments relabeled densely as `0..n_clusters`, in live id
    /// order.
    ///
    /// # Panics
    /// If any observation is unassigned.
    #[must_use]
    pub fn dense_assignments(&self) -> Vec<usize> {
        let rank: HashMap<ClusterId, usize> = self
            .state
            .live_ids()
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect();
        self.state
            .assignments()
            .iter()
            .map(|a| rank[&a.expect("every observation must be assigned")])
            .collect()
    }

    /// One parameter per live cluster, in id order: the instantiated
    /// parameter where present, a posterior draw otherwise.
    pub fn cluster_params<R: Rng>(&self, rng: &mut R) -> Vec<Fx>
    where
        Fx: Clone,
    {
        self.state
            .live()
            .map(|(_, cluster)| match cluster.param() {
                Some(fx) => fx.clone(),
                None => self
                    .prior
                    .posterior(&DataOrSuffStat::SuffStat(cluster.stat()))
                    .draw(rng),
            })
            .collect()
    }

    /// Marginal likelihood of the data given the current partition.
    #[must_use]
    pub fn ln_m(&self) -> f64 {
        self.state
            .live()
            .map(|(_, cluster)| self.prior.ln_m(&DataOrSuffStat::SuffStat(cluster.stat())))
            .sum()
    }
}

impl<X, Fx, Pr> Model<X> for DpMixture<X, Fx, Pr>
where
    X: Clone,
    Fx: Rv<X> + HasSuffStat<X>,
    Pr: ConjugatePrior<X, Fx>,
    Fx::Stat: Clone,
{
    fn ln_score(&self, _data: &[X]) -> f64 {
        self.crp.ln_f(&self.state.counts()) + self.ln_m()
    }
}

impl<X, Fx, Pr> PartitionModel<X> for DpMixture<X, Fx, Pr>
where
    X: Clone,
    Fx: Rv<X> + HasSuffStat<X>,
    Pr: ConjugatePrior<X, Fx>,
    Fx::Stat: Clone,
{
    type Removal = Removal<Fx::Stat, Fx>;

    fn assignments(&self) -> &[Option<ClusterId>] {
        self.state.assignments()
    }

    fn live_clusters(&self) -> Vec<ClusterId> {
        self.state.live_ids()
    }

    fn n_clusters(&self) -> usize {
        self.state.n_clusters()
    }

    fn assign(&mut self, idx: usize, cluster: ClusterId, data: &[X]) {
        self.state.assign(idx, cluster, &data[idx]);
    }

    fn assign_new<R: Rng>(&mut self, idx: usize, data: &[X], rng: &mut R) -> ClusterId {
        let id = self.state.assign_new(idx, &data[idx]);
        if !self.collapsed {
            let cluster = self.state.cluster(id).expect("newborn cluster is live");
            let param = self
                .prior
                .posterior(&DataOrSuffStat::SuffStat(cluster.stat()))
                .draw(rng);
            self.state.set_param(id, param);
        }
        id
    }

    fn unassign(&mut self, idx: usize, data: &[X]) -> Option<Self::Removal> {
        self.state.unassign(idx, &data[idx])
    }

    fn restore(&mut self, removal: Self::Removal, data: &[X]) {
        let idx = removal.observation();
        self.state.restore(removal, &data[idx]);
    }

    fn ln_pp_cluster(&self, x: &X, cluster: ClusterId) -> f64 {
        let c = self.state.cluster(cluster).expect("cluster must be live");
        #[allow(clippy::cast_precision_loss)]
        let ln_count = (c.count() as f64).ln();
        match c.param() {
            Some(fx) => ln_count + fx.ln_f(x),
            None => ln_count + self.prior.ln_pp(x, &DataOrSuffStat::SuffStat(c.stat())),
        }
    }

    fn ln_pp_new(&self, x: &X) -> f64 {
        self.crp.alpha().ln()
            + self
                .prior
                .ln_pp(x, &DataOrSuffStat::SuffStat(self.state.empty_stat()))
    }

    fn ln_likelihood(&self, data: &[X]) -> f64 {
        if self.collapsed {
            self.ln_m()
        } else {
            self.state
                .assignments()
                .iter()
                .zip(data)
                .map(|(a, x)| {
                    let c = self
                        .state
                        .cluster(a.expect("every observation must be assigned"))
                        .expect("assigned cluster must be live");
                    match c.param() {
                        Some(fx) => fx.ln_f(x),
                        None => self.prior.ln_pp(x, &DataOrSuffStat::SuffStat(c.stat())),
                    }
                })
                .sum()
        }
    }

    fn resample_params<R: Rng>(&mut self, rng: &mut R) {
        if self.collapsed {
            return;
        }
        for id in self.state.live_ids() {
            let cluster = self.state.cluster(id).expect("live id");
            let param = self
                .prior
                .posterior(&DataOrSuffStat::SuffStat(cluster.stat()))
                .draw(rng);
            self.state.set_param(id, param);
        }
    }
}
