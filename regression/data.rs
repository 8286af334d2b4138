//! # Training Data Validation
//!
//! `Dataset` is the only way training data enters the estimation core. It
//! checks shapes and finiteness, centers both the design matrix and the
//! response exactly once, and keeps the removed means so that callers can
//! translate between centered and original units later on.

use crate::center::{apply_feature_means, center_matrix, center_vector};
use crate::estimate::EstimationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Centered training data together with the means removed from it.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Centered design matrix, shape `[n_samples, n_features]`.
    pub x: Array2<f64>,
    /// Centered response vector, length `n_samples`.
    pub y: Array1<f64>,
    /// Column means removed from the explanatory variables.
    pub x_means: Array1<f64>,
    /// Mean removed from the response.
    pub y_mean: f64,
}

impl Dataset {
    /// Validates and centers raw training data.
    ///
    /// Shape problems are reported before any value is inspected, so a row
    /// mismatch never reaches the factorization.
    pub fn new(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self, EstimationError> {
        if x.nrows() != y.len() {
            return Err(EstimationError::ShapeError(format!(
                "design matrix has {} rows, but the response has {} elements",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(EstimationError::ShapeError(format!(
                "design matrix must be non-empty, got shape [{}, {}]",
                x.nrows(),
                x.ncols()
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(EstimationError::NumericalError(
                "design matrix contains NaN or infinite values".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(EstimationError::NumericalError(
                "response contains NaN or infinite values".to_string(),
            ));
        }

        let (x_centered, x_means) = center_matrix(x)?;
        let (y_centered, y_mean) = center_vector(y)?;
        log::debug!(
            "Centered training data: {} samples, {} features, response mean {:.6}",
            x_centered.nrows(),
            x_centered.ncols(),
            y_mean
        );

        Ok(Self {
            x: x_centered,
            y: y_centered,
            x_means,
            y_mean,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Maps raw query rows into the centered feature space of the training data.
    pub fn center_features(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EstimationError> {
        apply_feature_means(x, self.x_means.view())
    }

    /// Adds the training response mean back to centered values.
    pub fn uncenter_response(&self, values: ArrayView1<f64>) -> Array1<f64> {
        values.mapv(|v| v + self.y_mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn row_mismatch_is_a_shape_error() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(99, |i| i as f64);
        match Dataset::new(x.view(), y.view()) {
            Err(EstimationError::ShapeError(msg)) => {
                assert!(msg.contains("100"), "unexpected message: {msg}");
                assert!(msg.contains("99"), "unexpected message: {msg}");
            }
            other => panic!("expected ShapeError, got {other:?}"),
        }
    }

    #[test]
    fn zero_width_design_is_rejected() {
        let x = Array2::<f64>::zeros((5, 0));
        let y = Array1::<f64>::zeros(5);
        assert!(matches!(
            Dataset::new(x.view(), y.view()),
            Err(EstimationError::ShapeError(_))
        ));
    }

    #[test]
    fn non_finite_values_are_numerical_errors() {
        let x = array![[1.0], [f64::NAN], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(matches!(
            Dataset::new(x.view(), y.view()),
            Err(EstimationError::NumericalError(_))
        ));

        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, f64::INFINITY, 3.0];
        assert!(matches!(
            Dataset::new(x.view(), y.view()),
            Err(EstimationError::NumericalError(_))
        ));
    }

    #[test]
    fn means_are_recorded_and_reversible() {
        let x = array![[1.0, 4.0], [3.0, 8.0]];
        let y = array![10.0, 20.0];
        let data = Dataset::new(x.view(), y.view()).unwrap();

        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.n_features(), 2);
        assert_abs_diff_eq!(data.y_mean, 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.y, array![-5.0, 5.0], epsilon = 1e-12);

        let recentered = data.center_features(x.view()).unwrap();
        assert_abs_diff_eq!(recentered, data.x, epsilon = 1e-12);

        let restored = data.uncenter_response(data.y.view());
        assert_abs_diff_eq!(restored, y, epsilon = 1e-12);
    }
}
