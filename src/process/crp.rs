use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::{seat_next, Concentration};

/// Chinese Restaurant Process: a sequential sampler over partitions of
/// an unbounded number of groups.
///
/// Arrival `i` (with `i` customers already seated) joins existing table
/// `g` with probability `count(g) / (alpha + i)` and opens a new table
/// with probability `alpha / (alpha + i)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crp {
    alpha: Concentration,
}

impl Crp {
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        Concentration::new(alpha).map(Self::from_concentration)
    }

    #[must_use]
    pub const fn from_concentration(alpha: Concentration) -> Self {
        Self { alpha }
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha.get()
    }

    /// Table ids, one per arrival, labeled in order of first appearance.
    /// `n = 0` yields an empty sequence.
    pub fn assignments<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<usize> {
        let mut z = Vec::with_capacity(n);
        let mut counts: Vec<usize> = Vec::new();
        for i in 0..n {
            let table = seat_next(&counts, i, self.alpha(), rng);
            if table == counts.len() {
                counts.push(1);
            } else {
                counts[table] += 1;
            }
            z.push(table);
        }
        z
    }

    /// Log-probability of a seating arrangement with the given table
    /// counts (the exchangeable partition probability function). Depends
    /// only on the counts, never on arrival order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ln_f(&self, counts: &[usize]) -> f64 {
        let n: usize = counts.iter().sum();
        let alpha = self.alpha();
        let mut lp = (counts.len() as f64) * alpha.ln();
        for &c in counts {
            // ln (c - 1)!
            lp += (1..c).map(|j| (j as f64).ln()).sum::<f64>();
        }
        lp - (0..n).map(|i| (alpha + i as f64).ln()).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn rejects_bad_alpha() {
        assert!(Crp::new(0.0).is_err());
        assert!(Crp::new(-3.0).is_err());
    }

    #[test]
    fn zero_arrivals_is_empty() {
        let crp = Crp::new(1.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        assert!(crp.assignments(0, &mut rng).is_empty());
    }

    #[test]
    fn labels_appear_in_order() {
        let crp = Crp::new(5.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let z = crp.assignments(100, &mut rng);
        let mut next_label = 0;
        for &g in &z {
            assert!(g <= next_label);
            if g == next_label {
                next_label += 1;
            }
        }
    }

    /// `StepRng::new(14 << 60, 5 << 60)` yields uniforms 14/16, 3/16,
    /// 8/16, 13/16, 2/16, 7/16, 12/16, 1/16, 6/16, 11/16 under rand's
    /// `(next_u64 >> 11) * 2^-53` mapping, which seats the ten arrivals
    /// deterministically.
    #[test]
    fn golden_seating_sequence() {
        let crp = Crp::new(1.0).unwrap();
        let mut rng = StepRng::new(14 << 60, 5 << 60);
        let z = crp.assignments(10, &mut rng);
        assert_eq!(z, vec![0, 0, 0, 1, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let crp = Crp::new(2.0).unwrap();
        let a = crp.assignments(500, &mut SmallRng::seed_from_u64(0x5EED));
        let b = crp.assignments(500, &mut SmallRng::seed_from_u64(0x5EED));
        assert_eq!(a, b);
    }

    #[test]
    fn dispersion_is_monotone_in_alpha() {
        let n = 200;
        let reps = 50;
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let mut mean_groups = Vec::new();
        for alpha in [0.5, 1.0, 5.0, 20.0] {
            let crp = Crp::new(alpha).unwrap();
            let total: usize = (0..reps)
                .map(|_| crp.assignments(n, &mut rng).iter().max().map_or(0, |m| m + 1))
                .sum();
            mean_groups.push(total as f64 / reps as f64);
        }
        for pair in mean_groups.windows(2) {
            assert!(
                pair[0] <= pair[1],
                "expected non-decreasing group counts, got {mean_groups:?}"
            );
        }
    }

    #[test]
    fn eppf_matches_sequential_probability_and_is_exchangeable() {
        let alpha = 1.5;
        let crp = Crp::new(alpha).unwrap();

        // Same partition realized under three arrival orders.
        let z1 = [0, 0, 1, 0, 2, 1, 0];
        let z2 = [0, 1, 1, 2, 1, 0, 1]; // group sizes permute to {4, 2, 1}
        let z3 = [0, 1, 2, 2, 2, 1, 2];

        fn ln_joint(z: &[usize], alpha: f64) -> f64 {
            let mut counts = std::collections::HashMap::new();
            let mut lp = 0.0;
            for (i, &g) in z.iter().enumerate() {
                let c = counts.get(&g).copied().unwrap_or(0_usize);
                lp += if c == 0 { alpha.ln() } else { (c as f64).ln() };
                lp -= (alpha + i as f64).ln();
                counts.insert(g, c + 1);
            }
            lp
        }

        let expected = crp.ln_f(&[4, 2, 1]);
        assert::close(ln_joint(&z1, alpha), expected, 1e-12);
        assert::close(ln_joint(&z2, alpha), expected, 1e-12);
        assert::close(ln_joint(&z3, alpha), expected, 1e-12);
    }
}
