use crate::data::Dataset;
use crate::estimate::{
    ConvergenceStatus, EstimationError, EvidenceMethod, approximate_evidence,
};
use crate::factorization::Factorization;
use crate::posterior::{self, PosteriorParameters};
use crate::predict::{Prediction, predictive_distribution};
use crate::seeding::{initial_hyperparameters, seeded_rng};
use crate::types::Hyperparameters;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// --- Configuration ---

/// Settings for a fit, loadable from TOML.
///
/// ```toml
/// method = "EM"
/// max_iterations = 250
/// convergence_threshold = 1e-6
/// seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub method: EvidenceMethod,
    pub max_iterations: usize,
    /// Minimum log-evidence improvement required to keep iterating.
    pub convergence_threshold: f64,
    /// Fixes the random initial hyperparameters when set.
    pub seed: Option<u64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            method: EvidenceMethod::FixedPoint,
            max_iterations: 100,
            convergence_threshold: BayesianRegression::DEFAULT_THRESHOLD,
            seed: None,
        }
    }
}

impl FitConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EstimationError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EstimationError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), EstimationError> {
        if self.max_iterations == 0 {
            return Err(EstimationError::InvalidArgument(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        validate_threshold(self.convergence_threshold)
    }
}

fn validate_threshold(threshold: f64) -> Result<(), EstimationError> {
    if threshold.is_finite() && threshold > 0.0 {
        Ok(())
    } else {
        Err(EstimationError::InvalidArgument(format!(
            "convergence threshold must be a positive finite number, got {threshold}"
        )))
    }
}

// --- Fit result ---

/// Immutable outcome of one fit: converged hyperparameters, the weight
/// posterior they imply, and how the iteration ended.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub method: EvidenceMethod,
    pub hyperparameters: Hyperparameters,
    pub posterior: PosteriorParameters,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub log_evidence_trace: Vec<f64>,
}

impl FitResult {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    pub fn final_log_evidence(&self) -> Option<f64> {
        self.log_evidence_trace.last().copied()
    }

    /// Predictive distribution for centered query rows.
    pub fn predict(
        &self,
        factorization: &Factorization,
        x: ArrayView2<f64>,
    ) -> Result<Prediction, EstimationError> {
        predictive_distribution(factorization, &self.posterior, x)
    }
}

/// Evidence approximation followed by the posterior at the final hyperparameters.
pub fn fit<R: Rng>(
    data: &Dataset,
    factorization: &Factorization,
    method: EvidenceMethod,
    max_iterations: usize,
    threshold: f64,
    rng: &mut R,
) -> Result<FitResult, EstimationError> {
    let initial = initial_hyperparameters(rng);
    let evidence = approximate_evidence(
        data,
        factorization,
        method,
        initial,
        max_iterations,
        threshold,
    )?;
    let posterior = posterior::compute(factorization, evidence.hyperparameters)?;

    Ok(FitResult {
        method,
        hyperparameters: evidence.hyperparameters,
        posterior,
        status: evidence.status,
        iterations: evidence.iterations,
        log_evidence_trace: evidence.log_evidence_trace,
    })
}

// --- Model ---

/// Bayesian linear regression with evidence-approximated `alpha` and `beta`.
///
/// Construction centers the data and factorizes the design matrix once.
/// `fit` may be called any number of times; each call restarts from random
/// hyperparameters and replaces the previous result. A failed fit leaves the
/// model unfitted.
#[derive(Debug, Clone)]
pub struct BayesianRegression {
    data: Dataset,
    factorization: Factorization,
    threshold: f64,
    fitted: Option<FitResult>,
}

impl BayesianRegression {
    pub const DEFAULT_THRESHOLD: f64 = 1e-5;

    pub fn new(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        threshold: f64,
    ) -> Result<Self, EstimationError> {
        let data = Dataset::new(x, y)?;
        validate_threshold(threshold)?;
        let factorization = Factorization::new(&data)?;
        Ok(Self {
            data,
            factorization,
            threshold,
            fitted: None,
        })
    }

    pub fn with_default_threshold(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<Self, EstimationError> {
        Self::new(x, y, Self::DEFAULT_THRESHOLD)
    }

    /// Builds a model using the convergence threshold from `config`.
    pub fn from_config(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        config: &FitConfig,
    ) -> Result<Self, EstimationError> {
        Self::new(x, y, config.convergence_threshold)
    }

    pub fn fit(
        &mut self,
        method: EvidenceMethod,
        max_iterations: usize,
    ) -> Result<&FitResult, EstimationError> {
        self.fit_seeded(method, max_iterations, None)
    }

    /// Fits with the method, iteration cap and seed from `config`. The
    /// convergence threshold is the one the model was built with.
    pub fn fit_with(&mut self, config: &FitConfig) -> Result<&FitResult, EstimationError> {
        self.fit_seeded(config.method, config.max_iterations, config.seed)
    }

    fn fit_seeded(
        &mut self,
        method: EvidenceMethod,
        max_iterations: usize,
        seed: Option<u64>,
    ) -> Result<&FitResult, EstimationError> {
        self.fitted = None;
        let mut rng = seeded_rng(seed);
        let result = fit(
            &self.data,
            &self.factorization,
            method,
            max_iterations,
            self.threshold,
            &mut rng,
        )?;
        Ok(&*self.fitted.insert(result))
    }

    pub fn fit_result(&self) -> Option<&FitResult> {
        self.fitted.as_ref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn factorization(&self) -> &Factorization {
        &self.factorization
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Predictive mean and variance for query rows in centered feature units.
    /// Means are returned in centered response units.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Prediction, EstimationError> {
        let fitted = self.fitted.as_ref().ok_or(EstimationError::NotFitted)?;
        fitted.predict(&self.factorization, x)
    }

    pub fn predict_mean(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimationError> {
        Ok(self.predict(x)?.mean)
    }

    /// Like `predict`, but takes raw query rows and returns means in the
    /// original response units. Variances are unaffected by the shift.
    pub fn predict_original_scale(
        &self,
        x: ArrayView2<f64>,
    ) -> Result<Prediction, EstimationError> {
        if self.fitted.is_none() {
            return Err(EstimationError::NotFitted);
        }
        let centered = self.data.center_features(x)?;
        let prediction = self.predict(centered.view())?;
        Ok(Prediction {
            mean: self.data.uncenter_response(prediction.mean.view()),
            variance: prediction.variance,
        })
    }
}
