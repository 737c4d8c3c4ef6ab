//! Nonparametric Bayesian clustering with Dirichlet process mixtures.
//!
//! The [`process`] module provides the prior over partitions in three
//! equivalent forms: the Chinese Restaurant Process, the Polya urn, and
//! stick-breaking. Inference is collapsed or instantiated Gibbs
//! sampling over a cluster arena ([`mcmc`], [`state`]), driven by a
//! validated configuration with per-sweep convergence diagnostics
//! ([`fit`], [`monitor`]). Base distributions and likelihoods plug in
//! through `rv`'s conjugate-prior traits.

pub mod error;
pub mod fit;
pub mod mcmc;
pub mod model;
pub mod monitor;
pub mod process;
pub mod state;
