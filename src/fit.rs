//! High-level fitting driver: configuration, the bounded sweep loop,
//! and independent parallel chains.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rv::traits::{ConjugatePrior, HasSuffStat, Rv};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DpmmError};
use crate::mcmc::{PartitionGibbs, Sampler};
use crate::model::{DpMixture, PartitionModel};
use crate::monitor::{ConvergenceMonitor, SweepRecord};
use crate::process::{Concentration, Crp};

/// How the initial partition is seeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitStrategy {
    /// A single CRP run with the configured concentration.
    Crp,
    /// Uniformly at random over a fixed number of initial groups.
    Random { clusters: usize },
}

/// Fit configuration. Validated into a [`Dpmm`] before any sampling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DpmmConfig {
    /// Concentration (dispersion) parameter, strictly positive.
    pub alpha: f64,
    /// Sweep budget.
    pub max_sweeps: usize,
    /// Number of trailing sweeps the stability criterion inspects.
    pub convergence_window: usize,
    /// Maximum log-likelihood movement between consecutive stable sweeps.
    pub convergence_tolerance: f64,
    /// RNG seed; identical seed and config reproduce the fit exactly.
    pub seed: u64,
    /// Collapsed (marginalized parameters) vs. instantiated Gibbs.
    pub collapsed: bool,
    pub init: InitStrategy,
}

impl Default for DpmmConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_sweeps: 500,
            convergence_window: 5,
            convergence_tolerance: 1e-3,
            seed: 0x5EED,
            collapsed: true,
            init: InitStrategy::Crp,
        }
    }
}

/// Why a fit stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The stability criterion was met.
    Converged,
    /// The sweep budget ran out first; the final partition is still
    /// usable.
    BudgetExhausted,
    /// Cancellation was observed at a sweep boundary.
    Cancelled,
}

/// The output of one chain: final partition, per-cluster parameter
/// estimates, and the monitor's trace.
#[derive(Clone, Debug)]
pub struct DpmmFit<Fx> {
    /// Cluster label per observation, relabeled densely as
    /// `0..params.len()`.
    pub assignments: Vec<usize>,
    /// One parameter per cluster, aligned with the dense labels.
    pub params: Vec<Fx>,
    pub trace: Vec<SweepRecord>,
    pub stop: StopReason,
}

impl<Fx> DpmmFit<Fx> {
    #[must_use]
    pub fn converged(&self) -> bool {
        self.stop == StopReason::Converged
    }

    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.params.len()
    }
}

/// A validated Dirichlet process mixture fitting problem.
#[derive(Clone, Debug)]
pub struct Dpmm<Pr> {
    config: DpmmConfig,
    alpha: Concentration,
    prior: Pr,
}

impl<Pr> Dpmm<Pr> {
    /// Validate `config` eagerly; no state is touched on failure.
    pub fn new(config: DpmmConfig, prior: Pr) -> Result<Self, ConfigError> {
        let alpha = Concentration::new(config.alpha)?;
        if config.max_sweeps == 0 {
            return Err(ConfigError::ZeroSweeps);
        }
        if config.convergence_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        let tolerance = config.convergence_tolerance;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigError::NonPositiveTolerance { tolerance });
        }
        Ok(Self { config, alpha, prior })
    }

    #[must_use]
    pub const fn config(&self) -> &DpmmConfig {
        &self.config
    }

    #[must_use]
    pub const fn prior(&self) -> &Pr {
        &self.prior
    }
}

impl<Pr> Dpmm<Pr> {
    /// Run a single chain with the configured seed.
    pub fn fit<X, Fx>(&self, data: &[X]) -> Result<DpmmFit<Fx>, DpmmError>
    where
        X: Clone,
        Fx: Rv<X> + HasSuffStat<X> + Clone,
        Pr: ConjugatePrior<X, Fx> + Clone,
        Fx::Stat: Clone,
    {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        self.fit_with_rng(data, None, &mut rng)
    }

    /// As [`Dpmm::fit`], honoring `cancel` at sweep boundaries: a sweep
    /// in progress always completes before the flag is checked.
    pub fn fit_cancellable<X, Fx>(
        &self,
        data: &[X],
        cancel: &AtomicBool,
    ) -> Result<DpmmFit<Fx>, DpmmError>
    where
        X: Clone,
        Fx: Rv<X> + HasSuffStat<X> + Clone,
        Pr: ConjugatePrior<X, Fx> + Clone,
        Fx::Stat: Clone,
    {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        self.fit_with_rng(data, Some(cancel), &mut rng)
    }

    /// Run `n_chains` independent chains in parallel, each with a
    /// private RNG stream jumped off the configured seed and a private
    /// model state. The prior and data are shared read-only.
    pub fn fit_chains<X, Fx>(
        &self,
        data: &[X],
        n_chains: usize,
    ) -> Result<Vec<DpmmFit<Fx>>, DpmmError>
    where
        X: Clone + Sync,
        Fx: Rv<X> + HasSuffStat<X> + Clone + Send,
        Pr: ConjugatePrior<X, Fx> + Clone + Sync,
        Fx::Stat: Clone + Send,
    {
        let mut seeder = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        let rngs: Vec<Xoshiro256PlusPlus> = (0..n_chains)
            .map(|_| {
                let rng = seeder.clone();
                seeder.jump();
                rng
            })
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = rngs
                .into_iter()
                .map(|mut rng| scope.spawn(move || self.fit_with_rng(data, None, &mut rng)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("chain thread panicked"))
                .collect()
        })
    }

    fn fit_with_rng<X, Fx, R>(
        &self,
        data: &[X],
        cancel: Option<&AtomicBool>,
        rng: &mut R,
    ) -> Result<DpmmFit<Fx>, DpmmError>
    where
        X: Clone,
        Fx: Rv<X> + HasSuffStat<X> + Clone,
        Pr: ConjugatePrior<X, Fx> + Clone,
        Fx::Stat: Clone,
        R: Rng,
    {
        if data.is_empty() {
            return Err(ConfigError::EmptyData.into());
        }

        let crp = Crp::from_concentration(self.alpha);
        let collapsed = self.config.collapsed;
        let mut model = match self.config.init {
            InitStrategy::Crp => {
                DpMixture::with_crp_init(self.prior.clone(), data, crp, collapsed, rng)
            }
            InitStrategy::Random { clusters } => {
                DpMixture::with_random_init(self.prior.clone(), data, crp, collapsed, clusters, rng)
            }
        };
        debug!(
            "starting chain: n = {}, alpha = {}, {} initial clusters",
            data.len(),
            self.alpha.get(),
            model.n_clusters()
        );

        let mut sampler = PartitionGibbs::new();
        let mut monitor = ConvergenceMonitor::new();

        for sweep in 0..self.config.max_sweeps {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!("cancelled at sweep boundary {sweep}");
                return Ok(self.export(&model, monitor, StopReason::Cancelled, rng));
            }

            // Sweep a copy so a numerical abort surfaces the state as of
            // the last successful sweep.
            let mut attempt = model.clone();
            if let Err(source) = sampler.step(&mut attempt, data, rng) {
                return Err(DpmmError::Numerical {
                    sweep,
                    source,
                    assignments: model.dense_assignments(),
                    trace: monitor.into_records(),
                });
            }
            model = attempt;

            let ln_likelihood = model.ln_likelihood(data);
            monitor.record(sweep, model.n_clusters(), ln_likelihood);
            debug!(
                "sweep {sweep}: {} clusters, ln L = {ln_likelihood:.4}",
                model.n_clusters()
            );

            if monitor.converged(self.config.convergence_window, self.config.convergence_tolerance)
            {
                info!("converged after {} sweeps", sweep + 1);
                return Ok(self.export(&model, monitor, StopReason::Converged, rng));
            }
        }

        warn!(
            "sweep budget of {} exhausted without meeting the stability criterion",
            self.config.max_sweeps
        );
        Ok(self.export(&model, monitor, StopReason::BudgetExhausted, rng))
    }

    fn export<X, Fx, R>(
        &self,
        model: &DpMixture<X, Fx, Pr>,
        monitor: ConvergenceMonitor,
        stop: StopReason,
        rng: &mut R,
    ) -> DpmmFit<Fx>
    where
        X: Clone,
        Fx: Rv<X> + HasSuffStat<X> + Clone,
        Pr: ConjugatePrior<X, Fx>,
        Fx::Stat: Clone,
        R: Rng,
    {
        DpmmFit {
            assignments: model.dense_assignments(),
            params: model.cluster_params(rng),
            trace: monitor.into_records(),
            stop,
        }
    }
}
