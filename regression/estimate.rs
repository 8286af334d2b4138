// regression/estimate.rs

//! # Evidence Approximation
//!
//! Type-II maximum likelihood for the two precision hyperparameters of
//! Bayesian linear regression: `alpha`, the precision of the zero-mean
//! Gaussian prior on the weights, and `beta`, the precision of the Gaussian
//! observation noise. Starting from random positive values, each iteration
//!
//! 1.  computes the posterior mean of the weights at the current
//!     `(alpha, beta)` by rescaling the cached singular values,
//! 2.  re-estimates `(alpha, beta)` with either the EM update or MacKay's
//!     fixed-point update, and
//! 3.  scores the new pair with the log marginal likelihood (constants
//!     dropped), stopping once the score stops improving by more than the
//!     configured threshold.
//!
//! Everything is expressed through the economy SVD held in `Factorization`,
//! so an iteration costs one `[n, m]` matrix-vector product for the residual
//! plus `O(k)` scalar work.

use crate::data::Dataset;
use crate::factorization::Factorization;
use crate::posterior::mean_from_projection;
use crate::types::{Coefficients, Hyperparameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every failure the regression core can report.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Shape mismatch: {0}")]
    ShapeError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Numerical failure: {0}")]
    NumericalError(String),

    #[error("The model has not been fitted. Call fit before requesting predictions.")]
    NotFitted,

    #[error("Failed to read configuration file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Update rule used to re-estimate `(alpha, beta)` at each iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceMethod {
    /// Expectation-maximization: treats the weights as latent and maximizes the
    /// expected complete-data log likelihood. The evidence never decreases.
    #[serde(rename = "EM")]
    Em,
    /// MacKay's fixed-point iteration through the effective number of
    /// parameters `gamma`. Usually needs fewer iterations than EM but is not
    /// guaranteed to increase the evidence monotonically.
    #[serde(rename = "fixed-point", alias = "fixed_point")]
    FixedPoint,
}

impl EvidenceMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::Em => "EM",
            Self::FixedPoint => "fixed-point",
        }
    }
}

impl fmt::Display for EvidenceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvidenceMethod {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EM" => Ok(Self::Em),
            "fixed-point" | "fixed_point" => Ok(Self::FixedPoint),
            other => Err(EstimationError::InvalidArgument(format!(
                "unknown evidence approximation method '{other}'; expected \"EM\" or \"fixed-point\""
            ))),
        }
    }
}

/// How the iteration loop terminated. Both outcomes carry usable hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    Converged,
    MaxIterationsReached,
}

/// Everything computed during a single evidence iteration.
#[derive(Clone, Debug)]
pub struct EvidenceStep {
    /// Posterior mean at the hyperparameters the step started from.
    pub mean: Coefficients,
    /// `‖y - X mean‖²` against the centered response.
    pub residual_sum_of_squares: f64,
    /// Effective number of well-determined parameters, `gamma`.
    pub effective_parameters: f64,
    /// Hyperparameters after the update.
    pub hyperparameters: Hyperparameters,
    /// Log evidence at the updated hyperparameters.
    pub log_evidence: f64,
}

/// Outcome of the full iteration loop.
#[derive(Clone, Debug)]
pub struct EvidenceApproximation {
    pub method: EvidenceMethod,
    pub hyperparameters: Hyperparameters,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub log_evidence_trace: Vec<f64>,
}

/// Log marginal likelihood of the centered response, up to additive constants.
pub fn log_evidence(
    factorization: &Factorization,
    n_samples: usize,
    n_features: usize,
    hyperparameters: Hyperparameters,
    mean_squared_norm: f64,
    residual_sum_of_squares: f64,
) -> f64 {
    let Hyperparameters { alpha, beta } = hyperparameters;
    let log_det: f64 = factorization
        .squared_singular_values()
        .iter()
        .map(|&s| (beta * s + alpha).ln())
        .sum();
    0.5 * n_features as f64 * alpha.ln() + 0.5 * n_samples as f64 * beta.ln()
        - 0.5 * log_det
        - 0.5 * alpha * mean_squared_norm
        - 0.5 * beta * residual_sum_of_squares
}

/// Runs one iteration of the chosen update starting from `current`.
///
/// `data` must have the dimensions `factorization` was built from. The
/// posterior mean is recomputed from `data.y`, so mean and residual always
/// refer to the same response.
pub fn evidence_step(
    data: &Dataset,
    factorization: &Factorization,
    method: EvidenceMethod,
    current: Hyperparameters,
) -> Result<EvidenceStep, EstimationError> {
    factorization.check_dataset(data)?;
    let n = data.n_samples() as f64;
    let m = data.n_features() as f64;
    let Hyperparameters { alpha, beta } = current;
    let squared = factorization.squared_singular_values();

    // The mean and the residual both read `data.y`.
    let projection = factorization.project(data.y.view());
    let mean = mean_from_projection(factorization, projection.view(), current);
    let residual = &data.y - &data.x.dot(&*mean);
    let rss = residual.dot(&residual);
    let mean_sq = mean.squared_norm();

    let gamma: f64 = squared.iter().map(|&s| beta * s / (beta * s + alpha)).sum();

    let updated = match method {
        EvidenceMethod::FixedPoint => {
            if mean_sq <= 0.0 {
                return Err(EstimationError::NumericalError(
                    "posterior mean collapsed to zero; alpha would diverge".to_string(),
                ));
            }
            if rss <= 0.0 {
                return Err(EstimationError::NumericalError(
                    "residual sum of squares vanished; beta would diverge".to_string(),
                ));
            }
            Hyperparameters::new(gamma / mean_sq, (n - gamma) / rss)
        }
        EvidenceMethod::Em => {
            let weight_trace: f64 = squared.iter().map(|&s| 1.0 / (beta * s + alpha)).sum();
            let fit_trace: f64 = squared.iter().map(|&s| s / (beta * s + alpha)).sum();
            let alpha_denominator = mean_sq + weight_trace;
            let beta_denominator = rss + fit_trace;
            if alpha_denominator <= 0.0 || beta_denominator <= 0.0 {
                return Err(EstimationError::NumericalError(format!(
                    "EM denominators vanished (alpha: {alpha_denominator:e}, beta: {beta_denominator:e})"
                )));
            }
            Hyperparameters::new(m / alpha_denominator, n / beta_denominator)
        }
    };

    if !(updated.is_valid() && updated.alpha > 0.0) {
        return Err(EstimationError::NumericalError(format!(
            "hyperparameters diverged to alpha = {}, beta = {}",
            updated.alpha, updated.beta
        )));
    }

    let score = log_evidence(
        factorization,
        data.n_samples(),
        data.n_features(),
        updated,
        mean_sq,
        rss,
    );
    if !score.is_finite() {
        return Err(EstimationError::NumericalError(format!(
            "log evidence is not finite at alpha = {}, beta = {}",
            updated.alpha, updated.beta
        )));
    }

    Ok(EvidenceStep {
        mean,
        residual_sum_of_squares: rss,
        effective_parameters: gamma,
        hyperparameters: updated,
        log_evidence: score,
    })
}

/// Iterates `evidence_step` from `initial` until the log evidence stops
/// improving by at least `threshold`, or `max_iterations` is exhausted.
pub fn approximate_evidence(
    data: &Dataset,
    factorization: &Factorization,
    method: EvidenceMethod,
    initial: Hyperparameters,
    max_iterations: usize,
    threshold: f64,
) -> Result<EvidenceApproximation, EstimationError> {
    if max_iterations == 0 {
        return Err(EstimationError::InvalidArgument(
            "max_iterations must be at least 1".to_string(),
        ));
    }
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(EstimationError::InvalidArgument(format!(
            "convergence threshold must be a positive finite number, got {threshold}"
        )));
    }
    factorization.check_dataset(data)?;
    if !(initial.is_valid() && initial.alpha > 0.0) {
        return Err(EstimationError::InvalidArgument(format!(
            "initial hyperparameters must be positive, got alpha = {}, beta = {}",
            initial.alpha, initial.beta
        )));
    }

    log::info!(
        "Starting {} evidence approximation: {} samples, {} features, alpha0 = {:.4}, beta0 = {:.4}",
        method,
        data.n_samples(),
        data.n_features(),
        initial.alpha,
        initial.beta
    );

    let mut current = initial;
    let mut trace: Vec<f64> = Vec::with_capacity(max_iterations);
    let mut status = ConvergenceStatus::MaxIterationsReached;

    for iteration in 0..max_iterations {
        let step = evidence_step(data, factorization, method, current).map_err(|e| match e {
            EstimationError::NumericalError(msg) => {
                EstimationError::NumericalError(format!("iteration {}: {msg}", iteration + 1))
            }
            other => other,
        })?;
        current = step.hyperparameters;
        trace.push(step.log_evidence);

        log::debug!(
            "[{method}] iter {:>3}: alpha = {:.6e}, beta = {:.6e}, gamma = {:.4}, rss = {:.6e}, log evidence = {:.8}",
            iteration + 1,
            current.alpha,
            current.beta,
            step.effective_parameters,
            step.residual_sum_of_squares,
            step.log_evidence
        );

        if iteration >= 1 {
            let change = trace[iteration] - trace[iteration - 1];
            if change < 0.0 && method == EvidenceMethod::FixedPoint {
                log::warn!(
                    "Log evidence decreased by {:.3e} at iteration {}; stopping the fixed-point iteration",
                    -change,
                    iteration + 1
                );
            }
            if change < threshold {
                status = ConvergenceStatus::Converged;
                break;
            }
        }
    }

    match status {
        ConvergenceStatus::Converged => log::info!(
            "{method} evidence approximation converged after {} iterations: alpha = {:.6e}, beta = {:.6e}",
            trace.len(),
            current.alpha,
            current.beta
        ),
        ConvergenceStatus::MaxIterationsReached => log::warn!(
            "{method} evidence approximation stopped at the iteration cap ({max_iterations}) without converging: alpha = {:.6e}, beta = {:.6e}",
            current.alpha,
            current.beta
        ),
    }

    Ok(EvidenceApproximation {
        method,
        hyperparameters: current,
        status,
        iterations: trace.len(),
        log_evidence_trace: trace,
    })
}
