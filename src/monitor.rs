use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One sweep's worth of diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub sweep: usize,
    pub n_clusters: usize,
    pub ln_likelihood: f64,
}

/// Passive observer of a sampler's trace. Records per-sweep statistics
/// and answers a pure stability query; never touches the model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConvergenceMonitor {
    records: Vec<SweepRecord>,
}

impl ConvergenceMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sweep: usize, n_clusters: usize, ln_likelihood: f64) {
        self.records.push(SweepRecord { sweep, n_clusters, ln_likelihood });
    }

    #[must_use]
    pub fn records(&self) -> &[SweepRecord] {
        &self.records
    }

    #[must_use]
    pub fn last(&self) -> Option<&SweepRecord> {
        self.records.last()
    }

    /// True once the trailing `window` sweeps hold the cluster count
    /// constant and keep consecutive log-likelihoods within `tolerance`
    /// of one another. False while fewer than `window` sweeps have been
    /// recorded. A window shorter than two sweeps is widened to two, so
    /// at least one consecutive pair is always compared.
    #[must_use]
    pub fn converged(&self, window: usize, tolerance: f64) -> bool {
        let window = window.max(2);
        if self.records.len() < window {
            return false;
        }
        self.records[self.records.len() - window..]
            .iter()
            .tuple_windows()
            .all(|(a, b)| {
                a.n_clusters == b.n_clusters
                    && (a.ln_likelihood - b.ln_likelihood).abs() <= tolerance
            })
    }

    pub fn into_records(self) -> Vec<SweepRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with(points: &[(usize, f64)]) -> ConvergenceMonitor {
        let mut m = ConvergenceMonitor::new();
        for (sweep, &(k, ll)) in points.iter().enumerate() {
            m.record(sweep, k, ll);
        }
        m
    }

    #[test]
    fn too_short_a_trace_never_converges() {
        let m = monitor_with(&[(3, -10.0), (3, -10.0)]);
        assert!(!m.converged(3, 1.0));
    }

    #[test]
    fn one_sweep_windows_still_compare_a_pair() {
        let one = monitor_with(&[(3, -10.0)]);
        assert!(!one.converged(1, 1.0));

        let jumpy = monitor_with(&[(3, -50.0), (3, -20.0)]);
        assert!(!jumpy.converged(1, 1.0));

        let settled = monitor_with(&[(3, -10.1), (3, -10.0)]);
        assert!(settled.converged(1, 1.0));
    }

    #[test]
    fn stable_tail_converges() {
        let m = monitor_with(&[(5, -80.0), (4, -60.0), (3, -50.1), (3, -50.0), (3, -49.9)]);
        assert!(m.converged(3, 0.5));
    }

    #[test]
    fn cluster_count_change_blocks_convergence() {
        let m = monitor_with(&[(3, -50.0), (4, -50.0), (3, -50.0)]);
        assert!(!m.converged(3, 1.0));
    }

    #[test]
    fn likelihood_jump_blocks_convergence() {
        let m = monitor_with(&[(3, -50.0), (3, -45.0), (3, -50.0)]);
        assert!(!m.converged(3, 1.0));
        assert!(m.converged(3, 10.0));
    }

    #[test]
    fn trace_serializes() {
        let m = monitor_with(&[(2, -1.5)]);
        let json = serde_json::to_string(m.records()).unwrap();
        let back: Vec<SweepRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m.records());
    }
}
