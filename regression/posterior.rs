//! Gaussian posterior over the regression weights.
//!
//! With `X = U diag(d) Vᵗ`, the posterior precision `beta XᵗX + alpha I` has
//! eigenvectors `V` (plus any orthogonal complement when `m > n`) and
//! eigenvalues `beta d² + alpha` (and `alpha` on the complement). Only the
//! eigenvalues are stored; the dense matrix is built on request.

use crate::estimate::EstimationError;
use crate::factorization::Factorization;
use crate::types::{Coefficients, Hyperparameters};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};

/// Posterior mean `V diag(d / (d² + alpha/beta)) Uᵗ y` for the response the
/// factorization was built from.
pub fn weight_mean(factorization: &Factorization, hyperparameters: Hyperparameters) -> Coefficients {
    mean_from_projection(
        factorization,
        factorization.projected_response.view(),
        hyperparameters,
    )
}

/// Same as `weight_mean`, but for an explicit projection `Uᵗ y`.
///
/// Directions where `d² + alpha/beta` underflows to zero carry no information
/// and contribute nothing to the mean.
pub fn mean_from_projection(
    factorization: &Factorization,
    projection: ArrayView1<f64>,
    hyperparameters: Hyperparameters,
) -> Coefficients {
    let ratio = hyperparameters.ridge_ratio();
    let shrunk = Zip::from(&factorization.singular_values)
        .and(projection)
        .map_collect(|&d, &projected| {
            let denominator = d * d + ratio;
            if denominator > 0.0 {
                d / denominator * projected
            } else {
                0.0
            }
        });
    Coefficients::new(factorization.v().dot(&shrunk))
}

/// Mean and spectral precision of the weight posterior at fixed hyperparameters.
#[derive(Clone, Debug)]
pub struct PosteriorParameters {
    pub hyperparameters: Hyperparameters,
    pub mean: Coefficients,
    /// `beta d² + alpha` for each retained singular direction.
    pub precision_eigenvalues: Array1<f64>,
}

impl PosteriorParameters {
    /// Dense `beta XᵗX + alpha I`, shape `[n_features, n_features]`.
    pub fn precision_matrix(&self, factorization: &Factorization) -> Array2<f64> {
        let Hyperparameters { alpha, beta } = self.hyperparameters;
        let v = factorization.v();
        let scaled = &v * &factorization.squared_singular_values().mapv(|s| beta * s);
        let mut precision = scaled.dot(&factorization.vt);
        precision.diag_mut().mapv_inplace(|p| p + alpha);
        precision
    }

    /// Marginal posterior variance of each weight.
    pub fn covariance_diagonal(&self, factorization: &Factorization) -> Array1<f64> {
        let alpha = self.hyperparameters.alpha;
        let v_squared = factorization.v().mapv(|x| x * x);
        let inverse = self.precision_eigenvalues.mapv(|lambda| 1.0 / lambda);
        let in_span = v_squared.dot(&inverse);
        let coverage = v_squared.sum_axis(Axis(1));
        Zip::from(&in_span)
            .and(&coverage)
            .map_collect(|&inside, &covered| inside + (1.0 - covered).max(0.0) / alpha)
    }
}

/// Posterior parameters for the given hyperparameters.
pub fn compute(
    factorization: &Factorization,
    hyperparameters: Hyperparameters,
) -> Result<PosteriorParameters, EstimationError> {
    if !(hyperparameters.is_valid() && hyperparameters.alpha > 0.0) {
        return Err(EstimationError::NumericalError(format!(
            "cannot form a posterior at alpha = {}, beta = {}",
            hyperparameters.alpha, hyperparameters.beta
        )));
    }

    let Hyperparameters { alpha, beta } = hyperparameters;
    let mean = weight_mean(factorization, hyperparameters);
    if mean.iter().any(|w| !w.is_finite()) {
        return Err(EstimationError::NumericalError(
            "posterior mean contains non-finite values".to_string(),
        ));
    }
    let precision_eigenvalues = factorization
        .squared_singular_values()
        .mapv(|s| beta * s + alpha);

    log::debug!(
        "Posterior mean: {:?}; smallest precision eigenvalue {:.6e}",
        mean.as_view().to_vec(),
        precision_eigenvalues
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min)
    );

    Ok(PosteriorParameters {
        hyperparameters,
        mean,
        precision_eigenvalues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_linalg::Solve;

    fn sample_data() -> Dataset {
        let x = array![
            [0.5, 1.0, -0.3],
            [1.5, -0.2, 0.8],
            [2.0, 0.7, 1.1],
            [-1.0, 1.9, 0.4],
            [0.3, -1.2, -0.9],
            [1.1, 0.4, 2.2],
            [-0.6, 0.9, 0.1]
        ];
        let y = array![1.2, 2.9, 4.1, -0.8, -0.2, 3.7, 0.3];
        Dataset::new(x.view(), y.view()).unwrap()
    }

    #[test]
    fn mean_matches_direct_ridge_solve() {
        let data = sample_data();
        let f = Factorization::new(&data).unwrap();
        let h = Hyperparameters::new(0.7, 2.0);
        let posterior = compute(&f, h).unwrap();

        let mut gram = data.x.t().dot(&data.x);
        gram.diag_mut().mapv_inplace(|g| g + h.ridge_ratio());
        let direct = gram.solve(&data.x.t().dot(&data.y)).unwrap();
        assert_abs_diff_eq!(*posterior.mean, direct, epsilon = 1e-10);
    }

    #[test]
    fn precision_matrix_is_beta_gram_plus_alpha() {
        let data = sample_data();
        let f = Factorization::new(&data).unwrap();
        let h = Hyperparameters::new(0.25, 3.0);
        let posterior = compute(&f, h).unwrap();

        let mut expected = data.x.t().dot(&data.x) * 3.0;
        expected.diag_mut().mapv_inplace(|p| p + 0.25);
        assert_abs_diff_eq!(posterior.precision_matrix(&f), expected, epsilon = 1e-9);
    }

    #[test]
    fn covariance_diagonal_inverts_the_precision() {
        let data = sample_data();
        let f = Factorization::new(&data).unwrap();
        let posterior = compute(&f, Hyperparameters::new(0.5, 1.5)).unwrap();
        let precision = posterior.precision_matrix(&f);

        for i in 0..3 {
            let mut unit = Array1::<f64>::zeros(3);
            unit[i] = 1.0;
            let column = precision.solve(&unit).unwrap();
            assert_abs_diff_eq!(
                posterior.covariance_diagonal(&f)[i],
                column[i],
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn wide_design_falls_back_to_prior_off_span() {
        let x = Array2::from_shape_fn((3, 5), |(i, j)| ((i + 2 * j) as f64).sin());
        let y = array![1.0, -1.0, 0.5];
        let data = Dataset::new(x.view(), y.view()).unwrap();
        let f = Factorization::new(&data).unwrap();
        let posterior = compute(&f, Hyperparameters::new(2.0, 1.0)).unwrap();

        let precision = posterior.precision_matrix(&f);
        let mut expected = data.x.t().dot(&data.x);
        expected.diag_mut().mapv_inplace(|p| p + 2.0);
        assert_abs_diff_eq!(precision, expected, epsilon = 1e-9);

        // Every marginal variance is bounded by the prior variance.
        for &variance in posterior.covariance_diagonal(&f).iter() {
            assert!(variance <= 0.5 + 1e-12);
            assert!(variance > 0.0);
        }
    }

    #[test]
    fn rank_deficient_design_has_finite_mean() {
        let x = Array2::from_shape_fn((6, 2), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(6, |i| 2.0 * i as f64);
        let data = Dataset::new(x.view(), y.view()).unwrap();
        let f = Factorization::new(&data).unwrap();
        let posterior = compute(&f, Hyperparameters::new(1e-3, 10.0)).unwrap();

        assert!(posterior.mean.iter().all(|w| w.is_finite()));
        // The slope is split evenly across the duplicated columns.
        assert_abs_diff_eq!(posterior.mean[0], posterior.mean[1], epsilon = 1e-8);
        assert_abs_diff_eq!(posterior.mean[0] + posterior.mean[1], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        let data = sample_data();
        let f = Factorization::new(&data).unwrap();
        for h in [
            Hyperparameters::new(0.0, 1.0),
            Hyperparameters::new(1.0, 0.0),
            Hyperparameters::new(f64::NAN, 1.0),
        ] {
            assert!(matches!(
                compute(&f, h),
                Err(EstimationError::NumericalError(_))
            ));
        }
    }
}
