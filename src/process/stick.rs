use rand::Rng;
use rv::dist::Beta;
use rv::traits::Sampleable;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::Concentration;

/// Stick-breaking view of the Dirichlet process: group weights
/// `w_k = b_k * prod_{j<k} (1 - b_j)` with `b_k ~ Beta(1, alpha)`.
///
/// A finite draw is necessarily a truncation of the infinite sequence;
/// the unbroken remainder of the stick is always reported alongside the
/// weights, never dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct StickBreaking {
    alpha: Concentration,
    breaker: Beta,
}

/// A truncated weight sequence plus the mass left on the stick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StickWeights {
    weights: Vec<f64>,
    remainder: f64,
}

impl StickWeights {
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Truncation error: `1 - sum(weights)`, the mass of all unbroken
    /// sticks.
    #[must_use]
    pub const fn remainder(&self) -> f64 {
        self.remainder
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl StickBreaking {
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        let alpha = Concentration::new(alpha)?;
        Ok(Self {
            alpha,
            breaker: Beta::new_unchecked(1.0, alpha.get()),
        })
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha.get()
    }

    /// Break exactly `n_sticks` sticks. `n_sticks = 0` yields an empty
    /// sequence with remainder one.
    pub fn weights<R: Rng>(&self, n_sticks: usize, rng: &mut R) -> StickWeights {
        let mut remaining = 1.0;
        let mut weights = Vec::with_capacity(n_sticks);
        for _ in 0..n_sticks {
            let b: f64 = self.breaker.draw(rng);
            let w = b * remaining;
            remaining -= w;
            weights.push(w);
        }
        StickWeights { weights, remainder: remaining }
    }

    /// Break sticks until the remaining mass falls below `tol`, so the
    /// truncation error is bounded by the caller.
    ///
    /// # Panics
    /// If `tol` is not in `(0, 1)`.
    pub fn weights_to_remainder<R: Rng>(&self, tol: f64, rng: &mut R) -> StickWeights {
        assert!(tol > 0.0 && tol < 1.0, "tolerance must be in (0, 1)");
        let mut remaining = 1.0;
        let mut weights = Vec::new();
        while remaining >= tol {
            let b: f64 = self.breaker.draw(rng);
            let w = b * remaining;
            remaining -= w;
            weights.push(w);
        }
        StickWeights { weights, remainder: remaining }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn rejects_bad_alpha() {
        assert!(StickBreaking::new(0.0).is_err());
        assert!(StickBreaking::new(-2.0).is_err());
    }

    #[test]
    fn zero_sticks_is_empty_with_full_remainder() {
        let sb = StickBreaking::new(1.0).unwrap();
        let ws = sb.weights(0, &mut SmallRng::seed_from_u64(0));
        assert!(ws.is_empty());
        assert::close(ws.remainder(), 1.0, 1e-15);
    }

    #[test]
    fn weights_and_remainder_partition_the_stick() {
        let sb = StickBreaking::new(3.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(0x571C);
        let ws = sb.weights(200, &mut rng);
        assert_eq!(ws.len(), 200);
        assert!(ws.weights().iter().all(|w| (0.0..=1.0).contains(w)));
        let total: f64 = ws.weights().iter().sum::<f64>() + ws.remainder();
        assert::close(total, 1.0, 1e-10);
    }

    #[test]
    fn remainder_bounded_by_tolerance() {
        let sb = StickBreaking::new(5.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(0x57);
        let ws = sb.weights_to_remainder(1e-8, &mut rng);
        assert!(ws.remainder() < 1e-8);
        assert::close(ws.weights().iter().sum::<f64>(), 1.0 - ws.remainder(), 1e-12);
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let sb = StickBreaking::new(1.0).unwrap();
        let a = sb.weights(64, &mut SmallRng::seed_from_u64(11));
        let b = sb.weights(64, &mut SmallRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
