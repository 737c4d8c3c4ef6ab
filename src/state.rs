//! Mutable runtime partition state: an arena of cluster slots indexed by
//! stable ids, with a free-list for slots vacated when a cluster's last
//! member leaves. The assignment table stores ids, never references into
//! slot memory, so destroying a cluster is a pure state transition.

use std::marker::PhantomData;

use rv::traits::{HasSuffStat, SuffStat};
use serde::{Deserialize, Serialize};

/// Stable handle to a cluster slot. Freed ids are recycled through the
/// free-list, but a recycled slot always starts from the empty statistic;
/// nothing of the dead cluster leaks into its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(usize);

impl ClusterId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One live cluster: member count, running sufficient statistic, and an
/// optional instantiated parameter (absent while the model is collapsed).
#[derive(Clone, Debug)]
pub struct Cluster<S, Fx> {
    count: usize,
    stat: S,
    param: Option<Fx>,
}

impl<S, Fx> Cluster<S, Fx> {
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn stat(&self) -> &S {
        &self.stat
    }

    #[must_use]
    pub const fn param(&self) -> Option<&Fx> {
        self.param.as_ref()
    }
}

/// Token returned by [`ClusterState::unassign`], pairing the removal with
/// either a later reassignment or an explicit [`ClusterState::restore`].
/// If the removal emptied the cluster, the token carries the vacated slot
/// so a rollback can resurrect it under its original id.
#[derive(Debug)]
pub struct Removal<S, Fx> {
    observation: usize,
    cluster: ClusterId,
    emptied: Option<Cluster<S, Fx>>,
}

impl<S, Fx> Removal<S, Fx> {
    #[must_use]
    pub const fn observation(&self) -> usize {
        self.observation
    }

    #[must_use]
    pub const fn cluster(&self) -> ClusterId {
        self.cluster
    }

    /// True if the removal destroyed the cluster.
    #[must_use]
    pub const fn emptied(&self) -> bool {
        self.emptied.is_some()
    }
}

/// The partition of `n` observations into live clusters.
pub struct ClusterState<X, Fx>
where
    Fx: HasSuffStat<X>,
{
    slots: Vec<Option<Cluster<Fx::Stat, Fx>>>,
    free: Vec<usize>,
    assignments: Vec<Option<ClusterId>>,
    empty_stat: Fx::Stat,
    n_live: usize,
    _phantom: PhantomData<X>,
}

impl<X, Fx> Clone for ClusterState<X, Fx>
where
    Fx: HasSuffStat<X> + Clone,
    Fx::Stat: Clone,
{
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            free: self.free.clone(),
            assignments: self.assignments.clone(),
            empty_stat: self.empty_stat.clone(),
            n_live: self.n_live,
            _phantom: PhantomData,
        }
    }
}

impl<X, Fx> ClusterState<X, Fx>
where
    Fx: HasSuffStat<X>,
    Fx::Stat: Clone,
{
    /// A state over `n` observations, all initially unassigned.
    /// `empty_stat` is the template statistic for newborn clusters.
    pub fn new(n: usize, empty_stat: Fx::Stat) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            assignments: vec![None; n],
            empty_stat,
            n_live: 0,
            _phantom: PhantomData,
        }
    }

    /// Number of observations.
    #[must_use]
    pub fn n_data(&self) -> usize {
        self.assignments.len()
    }

    /// Number of live clusters.
    #[must_use]
    pub const fn n_clusters(&self) -> usize {
        self.n_live
    }

    #[must_use]
    pub fn assignments(&self) -> &[Option<ClusterId>] {
        &self.assignments
    }

    #[must_use]
    pub fn assignment(&self, i: usize) -> Option<ClusterId> {
        self.assignments.get(i).copied().flatten()
    }

    #[must_use]
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster<Fx::Stat, Fx>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Live clusters in stable id order.
    pub fn live(&self) -> impl Iterator<Item = (ClusterId, &Cluster<Fx::Stat, Fx>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (ClusterId(i), c)))
    }

    /// Live cluster ids in stable order.
    pub fn live_ids(&self) -> Vec<ClusterId> {
        self.live().map(|(id, _)| id).collect()
    }

    /// Member counts of live clusters, in id order.
    pub fn counts(&self) -> Vec<usize> {
        self.live().map(|(_, c)| c.count).collect()
    }

    /// Sum of all member counts.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.live().map(|(_, c)| c.count).sum()
    }

    /// The template statistic newborn clusters start from.
    #[must_use]
    pub const fn empty_stat(&self) -> &Fx::Stat {
        &self.empty_stat
    }

    pub fn set_param(&mut self, id: ClusterId, param: Fx) {
        if let Some(cluster) = self.slots[id.0].as_mut() {
            cluster.param = Some(param);
        }
    }

    /// Add observation `i` to the live cluster `id`.
    ///
    /// # Panics
    /// If `i` is already assigned or `id` is not live.
    pub fn assign(&mut self, i: usize, id: ClusterId, x: &X) {
        assert!(self.assignments[i].is_none(), "observation {i} already assigned");
        let cluster = self.slots[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("cluster {} is not live", id.0));
        cluster.stat.observe(x);
        cluster.count += 1;
        self.assignments[i] = Some(id);
    }

    /// Open a fresh cluster for observation `i`, reusing a freed slot if
    /// one exists. The newborn starts from the empty statistic with no
    /// instantiated parameter.
    pub fn assign_new(&mut self, i: usize, x: &X) -> ClusterId {
        assert!(self.assignments[i].is_none(), "observation {i} already assigned");
        let mut stat = self.empty_stat.clone();
        stat.observe(x);
        let cluster = Cluster { count: 1, stat, param: None };
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(cluster);
                ClusterId(slot)
            }
            None => {
                self.slots.push(Some(cluster));
                ClusterId(self.slots.len() - 1)
            }
        };
        self.n_live += 1;
        self.assignments[i] = Some(id);
        id
    }

    /// Remove observation `i` from its cluster. If the cluster's count
    /// drops to zero the slot is vacated immediately and its id pushed on
    /// the free-list; the returned token carries the vacated slot for
    /// rollback. Returns `None` if `i` was unassigned.
    pub fn unassign(&mut self, i: usize, x: &X) -> Option<Removal<Fx::Stat, Fx>> {
        let id = self.assignments[i].take()?;
        let cluster = self.slots[id.0].as_mut().expect("assigned cluster must be live");
        cluster.stat.forget(x);
        cluster.count -= 1;
        let emptied = if cluster.count == 0 {
            let dead = self.slots[id.0].take();
            self.free.push(id.0);
            self.n_live -= 1;
            dead
        } else {
            None
        };
        Some(Removal { observation: i, cluster: id, emptied })
    }

    /// Undo a removal, restoring the observation to its pre-removal
    /// cluster. A cluster destroyed by the removal is resurrected under
    /// its original id.
    ///
    /// # Panics
    /// If another cluster claimed the freed id in the interim.
    pub fn restore(&mut self, removal: Removal<Fx::Stat, Fx>, x: &X) {
        let Removal { observation, cluster, emptied } = removal;
        if let Some(dead) = emptied {
            let freed = self.free.pop();
            assert_eq!(
                freed,
                Some(cluster.0),
                "freed id was claimed between removal and rollback"
            );
            self.slots[cluster.0] = Some(dead);
            self.n_live += 1;
        }
        self.assign(observation, cluster, x);
    }
}

#[cfg(test)]
mod tests {
    use rv::data::GaussianSuffStat;
    use rv::dist::Gaussian;

    use super::*;

    fn state(n: usize) -> ClusterState<f64, Gaussian> {
        ClusterState::new(n, GaussianSuffStat::new())
    }

    #[test]
    fn counts_track_assignments() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let mut s = state(4);
        let a = s.assign_new(0, &data[0]);
        s.assign(1, a, &data[1]);
        let b = s.assign_new(2, &data[2]);
        s.assign(3, b, &data[3]);

        assert_eq!(s.n_clusters(), 2);
        assert_eq!(s.counts(), vec![2, 2]);
        assert_eq!(s.total_count(), 4);
        assert_eq!(s.cluster(a).unwrap().stat().n(), 2);
    }

    #[test]
    fn emptied_cluster_is_gone_on_next_read() {
        let data = [1.0, 2.0];
        let mut s = state(2);
        let a = s.assign_new(0, &data[0]);
        let b = s.assign_new(1, &data[1]);

        let removal = s.unassign(0, &data[0]).unwrap();
        assert!(removal.emptied());
        assert!(s.cluster(a).is_none());
        assert!(!s.live_ids().contains(&a));
        assert_eq!(s.n_clusters(), 1);
        assert_eq!(s.live_ids(), vec![b]);
    }

    #[test]
    fn freed_id_is_recycled_with_a_clean_statistic() {
        let data = [5.0, -5.0];
        let mut s = state(2);
        let a = s.assign_new(0, &data[0]);
        s.unassign(0, &data[0]).unwrap();

        let b = s.assign_new(1, &data[1]);
        assert_eq!(a, b);
        assert_eq!(s.cluster(b).unwrap().stat().n(), 1);
        assert_eq!(s.cluster(b).unwrap().count(), 1);
    }

    #[test]
    fn restore_resurrects_an_emptied_cluster() {
        let data = [3.5, 1.0];
        let mut s = state(2);
        let a = s.assign_new(0, &data[0]);
        s.assign_new(1, &data[1]);

        let removal = s.unassign(0, &data[0]).unwrap();
        s.restore(removal, &data[0]);

        assert_eq!(s.assignment(0), Some(a));
        assert_eq!(s.cluster(a).unwrap().count(), 1);
        assert_eq!(s.cluster(a).unwrap().stat().n(), 1);
        assert_eq!(s.n_clusters(), 2);
        assert_eq!(s.total_count(), 2);
    }

    #[test]
    fn restore_into_surviving_cluster() {
        let data = [1.0, 2.0];
        let mut s = state(2);
        let a = s.assign_new(0, &data[0]);
        s.assign(1, a, &data[1]);

        let removal = s.unassign(1, &data[1]).unwrap();
        assert!(!removal.emptied());
        assert_eq!(s.cluster(a).unwrap().count(), 1);
        s.restore(removal, &data[1]);
        assert_eq!(s.cluster(a).unwrap().count(), 2);
        assert_eq!(s.assignment(1), Some(a));
    }

    #[test]
    fn unassigned_observation_yields_no_removal() {
        let mut s = state(1);
        assert!(s.unassign(0, &0.0).is_none());
    }
}
