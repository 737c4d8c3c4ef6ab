//! Generative processes over unbounded partitions.
//!
//! Three views of the same prior: the Chinese Restaurant Process yields
//! table ids per arrival, the Polya urn yields the parameter value drawn
//! for each arrival's group, and stick-breaking yields the limiting group
//! weights directly. All three share one seating law and one validated
//! concentration parameter.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub mod crp;
pub mod stick;
pub mod urn;

pub use crp::Crp;
pub use stick::{StickBreaking, StickWeights};
pub use urn::PolyaUrn;

/// Validated concentration (dispersion) parameter, strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Concentration(f64);

impl Concentration {
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        if alpha.is_finite() && alpha > 0.0 {
            Ok(Self(alpha))
        } else {
            Err(ConfigError::NonPositiveAlpha { alpha })
        }
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

/// Normalized conditional seating probabilities for the next arrival:
/// one entry per existing group (proportional to its count) followed by
/// the new-group entry (proportional to alpha). Sums to one by
/// construction.
#[must_use]
pub fn crp_weights(counts: &[usize], alpha: Concentration) -> Vec<f64> {
    let n_seated: usize = counts.iter().sum();
    #[allow(clippy::cast_precision_loss)]
    let total = n_seated as f64 + alpha.get();
    counts
        .iter()
        .map(|&c| c as f64 / total)
        .chain(std::iter::once(alpha.get() / total))
        .collect()
}

/// Seat the next arrival given existing group counts. Returns the index
/// of the chosen group, or `counts.len()` for a new group.
///
/// The draw consumes exactly one uniform from `rng`: a target in
/// `[0, n_seated + alpha)` scanned against cumulative counts, with the
/// trailing `alpha` mass standing for the new group.
pub(crate) fn seat_next<R: Rng>(
    counts: &[usize],
    n_seated: usize,
    alpha: f64,
    rng: &mut R,
) -> usize {
    #[allow(clippy::cast_precision_loss)]
    let target = rng.random::<f64>() * (n_seated as f64 + alpha);
    let mut cum = 0.0;
    for (group, &count) in counts.iter().enumerate() {
        cum += count as f64;
        if target < cum {
            return group;
        }
    }
    counts.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concentration_rejects_non_positive() {
        assert!(Concentration::new(0.0).is_err());
        assert!(Concentration::new(-1.0).is_err());
        assert!(Concentration::new(f64::NAN).is_err());
        assert!(Concentration::new(f64::INFINITY).is_err());
        assert!(Concentration::new(0.5).is_ok());
    }

    #[test]
    fn weights_sum_to_one() {
        let alpha = Concentration::new(2.5).unwrap();
        for counts in [vec![], vec![1], vec![3, 1, 5], vec![10, 10, 10, 10]] {
            let ws = crp_weights(&counts, alpha);
            assert_eq!(ws.len(), counts.len() + 1);
            assert::close(ws.iter().sum::<f64>(), 1.0, 1e-12);
            assert!(ws.iter().all(|w| *w > 0.0));
        }
    }

    #[test]
    fn empty_table_weights_are_all_new_group() {
        let ws = crp_weights(&[], Concentration::new(1.0).unwrap());
        assert_eq!(ws, vec![1.0]);
    }
}
