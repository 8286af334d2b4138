use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Prior precision of the weights (`alpha`) and precision of the observation noise (`beta`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub alpha: f64,
    pub beta: f64,
}

impl Hyperparameters {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// The ridge strength `alpha / beta` implied by the pair.
    pub fn ridge_ratio(&self) -> f64 {
        self.alpha / self.beta
    }

    /// Noise variance `1 / beta`.
    pub fn noise_variance(&self) -> f64 {
        1.0 / self.beta
    }

    pub fn is_valid(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite() && self.alpha >= 0.0 && self.beta > 0.0
    }
}

/// Posterior mean of the regression weights, one entry per feature column.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficients(pub Array1<f64>);

impl Coefficients {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn squared_norm(&self) -> f64 {
        self.0.dot(&self.0)
    }
}

impl Deref for Coefficients {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for Coefficients {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}

impl From<Coefficients> for Array1<f64> {
    fn from(values: Coefficients) -> Self {
        values.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn hyperparameter_validity() {
        assert!(Hyperparameters::new(0.0, 1.0).is_valid());
        assert!(!Hyperparameters::new(-1.0, 1.0).is_valid());
        assert!(!Hyperparameters::new(1.0, 0.0).is_valid());
        assert!(!Hyperparameters::new(f64::INFINITY, 1.0).is_valid());

        let h = Hyperparameters::new(2.0, 4.0);
        assert_eq!(h.ridge_ratio(), 0.5);
        assert_eq!(h.noise_variance(), 0.25);
    }

    #[test]
    fn coefficients_convert_to_and_from_arrays() {
        let weights = Coefficients::from(array![3.0, 4.0]);
        assert_eq!(weights.squared_norm(), 25.0);
        assert_eq!(weights.len(), 2);
        assert_eq!(weights.as_view()[1], 4.0);

        let raw: Array1<f64> = weights.clone().into();
        assert_eq!(raw, weights.0);
    }
}
