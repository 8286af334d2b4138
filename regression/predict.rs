use crate::estimate::EstimationError;
use crate::factorization::Factorization;
use crate::posterior::PosteriorParameters;
use ndarray::{Array1, ArrayView2};

/// Univariate Gaussian predictive distribution for each query row, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub mean: Array1<f64>,
    pub variance: Array1<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn standard_deviation(&self) -> Array1<f64> {
        self.variance.mapv(f64::sqrt)
    }

    /// Symmetric `mean ± z·sd` bounds, e.g. `z = 1.96` for a 95% interval.
    pub fn interval(&self, z: f64) -> (Array1<f64>, Array1<f64>) {
        let half_width = self.standard_deviation() * z;
        (&self.mean - &half_width, &self.mean + &half_width)
    }

    /// `(mean, variance)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mean.iter().copied().zip(self.variance.iter().copied())
    }
}

/// Predictive mean `x · w` and variance `(1 + x S xᵗ) / beta` for every row of `x`,
/// with `S = V diag(1 / (d² + alpha/beta)) Vᵗ`.
///
/// `S` is never formed: each row is projected onto the right singular vectors
/// and the quadratic form is a weighted sum of squares in that basis.
pub fn predictive_distribution(
    factorization: &Factorization,
    posterior: &PosteriorParameters,
    x: ArrayView2<f64>,
) -> Result<Prediction, EstimationError> {
    if x.ncols() != factorization.n_features() {
        return Err(EstimationError::ShapeError(format!(
            "query has {} columns, but the model was trained on {} features",
            x.ncols(),
            factorization.n_features()
        )));
    }
    if posterior.mean.len() != factorization.n_features()
        || posterior.precision_eigenvalues.len() != factorization.n_components()
    {
        return Err(EstimationError::ShapeError(format!(
            "posterior has {} weights and {} precision eigenvalues, but the factorization has {} features and {} components",
            posterior.mean.len(),
            posterior.precision_eigenvalues.len(),
            factorization.n_features(),
            factorization.n_components()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EstimationError::NumericalError(
            "query contains NaN or infinite values".to_string(),
        ));
    }

    let ratio = posterior.hyperparameters.ridge_ratio();
    let beta = posterior.hyperparameters.beta;
    let inverse_spectrum = factorization.squared_singular_values().mapv(|s| {
        let denominator = s + ratio;
        if denominator > 0.0 { 1.0 / denominator } else { 0.0 }
    });

    let mean = x.dot(&*posterior.mean);
    let projected = x.dot(&factorization.v());
    let quadratic = projected.mapv(|q| q * q).dot(&inverse_spectrum);
    let variance = quadratic.mapv(|q| (1.0 + q) / beta);

    Ok(Prediction { mean, variance })
}
