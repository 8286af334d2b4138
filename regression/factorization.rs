//! Economy-size SVD of the centered design matrix.
//!
//! The factorization is computed once per model and every later stage
//! (evidence iterations, posterior, predictive distribution) reads from it.
//! With `X = U diag(d) Vᵗ`, a ridge solve at any ratio `alpha / beta` reduces
//! to rescaling `d`, so no iteration ever touches `XᵗX` or a linear solver.

use crate::data::Dataset;
use crate::estimate::EstimationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::{JobSvd, SVDDC};

/// Immutable `U diag(d) Vᵗ` factorization with `k = min(n, m)` retained directions.
#[derive(Debug, Clone)]
pub struct Factorization {
    /// Left singular vectors, shape `[n_samples, k]`.
    pub u: Array2<f64>,
    /// Singular values in descending order, length `k`.
    pub singular_values: Array1<f64>,
    /// Right singular vectors stored as rows, shape `[k, n_features]`.
    pub vt: Array2<f64>,
    /// `Uᵗ y` for the centered response of the dataset this was built from.
    pub projected_response: Array1<f64>,
}

impl Factorization {
    /// Factorizes the centered design of `data`. Finiteness of the inputs is
    /// guaranteed by `Dataset::new`; only the factors themselves are checked.
    pub fn new(data: &Dataset) -> Result<Self, EstimationError> {
        let (u, singular_values, vt) = data.x.svddc(JobSvd::Some).map_err(|e| {
            EstimationError::NumericalError(format!("SVD of the design matrix failed: {e}"))
        })?;
        let u = u.ok_or_else(|| {
            EstimationError::NumericalError("SVD did not return left singular vectors".to_string())
        })?;
        let vt = vt.ok_or_else(|| {
            EstimationError::NumericalError(
                "SVD did not return right singular vectors".to_string(),
            )
        })?;

        let finite = u.iter().all(|v| v.is_finite())
            && singular_values.iter().all(|v| v.is_finite())
            && vt.iter().all(|v| v.is_finite());
        if !finite {
            return Err(EstimationError::NumericalError(
                "SVD produced non-finite factors".to_string(),
            ));
        }

        let projected_response = u.t().dot(&data.y);
        let factorization = Self {
            u,
            singular_values,
            vt,
            projected_response,
        };

        let k = factorization.n_components();
        let rank = factorization.rank(1e-12);
        if rank < k {
            log::debug!(
                "Design matrix is rank deficient: {rank} of {k} singular values above tolerance"
            );
        }
        log::debug!(
            "Factorized centered design [{}, {}] into {k} components",
            data.n_samples(),
            data.n_features()
        );

        Ok(factorization)
    }

    /// Number of retained singular directions, `min(n_samples, n_features)`.
    pub fn n_components(&self) -> usize {
        self.singular_values.len()
    }

    pub fn n_samples(&self) -> usize {
        self.u.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.vt.ncols()
    }

    /// Squared singular values, the eigenvalues of `XᵗX` on the retained subspace.
    pub fn squared_singular_values(&self) -> Array1<f64> {
        self.singular_values.mapv(|d| d * d)
    }

    /// Right singular vectors as columns, shape `[n_features, k]`.
    pub fn v(&self) -> ArrayView2<'_, f64> {
        self.vt.t()
    }

    /// Count of singular values larger than `tolerance` times the largest one.
    pub fn rank(&self, tolerance: f64) -> usize {
        let largest = self.singular_values.iter().cloned().fold(0.0_f64, f64::max);
        if largest == 0.0 {
            return 0;
        }
        self.singular_values
            .iter()
            .filter(|&&d| d > tolerance * largest)
            .count()
    }

    /// `Uᵗ y` for a response with one entry per training row.
    pub fn project(&self, y: ArrayView1<f64>) -> Array1<f64> {
        self.u.t().dot(&y)
    }

    /// Fails with `ShapeError` unless `data` has the dimensions this
    /// factorization was built from.
    pub fn check_dataset(&self, data: &Dataset) -> Result<(), EstimationError> {
        if data.n_samples() != self.n_samples() || data.n_features() != self.n_features() {
            return Err(EstimationError::ShapeError(format!(
                "dataset is [{}, {}], but the factorization was built from [{}, {}]",
                data.n_samples(),
                data.n_features(),
                self.n_samples(),
                self.n_features()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn dataset(x: Array2<f64>) -> Dataset {
        let y = Array1::from_shape_fn(x.nrows(), |i| (i as f64).sin());
        Dataset::new(x.view(), y.view()).unwrap()
    }

    #[test]
    fn economy_shapes_for_tall_and_wide_designs() {
        let tall = dataset(Array2::from_shape_fn((7, 3), |(i, j)| ((i * 3 + j) as f64).cos()));
        let f = Factorization::new(&tall).unwrap();
        assert_eq!(f.u.dim(), (7, 3));
        assert_eq!(f.singular_values.len(), 3);
        assert_eq!(f.vt.dim(), (3, 3));
        assert_eq!(f.projected_response.len(), 3);

        let wide = dataset(Array2::from_shape_fn((4, 6), |(i, j)| ((i * 6 + j) as f64).sin()));
        let f = Factorization::new(&wide).unwrap();
        assert_eq!(f.u.dim(), (4, 4));
        assert_eq!(f.vt.dim(), (4, 6));
        assert_eq!(f.n_components(), 4);
        assert_eq!(f.n_features(), 6);
        assert_eq!(f.n_samples(), 4);
    }

    #[test]
    fn reconstruction_matches_centered_design() {
        let data = dataset(array![
            [1.0, 2.0, 0.5],
            [2.0, 0.0, 1.5],
            [4.0, 1.0, -1.0],
            [0.5, 3.0, 2.0],
            [3.0, -1.0, 0.0]
        ]);
        let f = Factorization::new(&data).unwrap();
        let rebuilt = (&f.u * &f.singular_values).dot(&f.vt);
        assert_abs_diff_eq!(rebuilt, data.x, epsilon = 1e-10);

        let gram = f.u.t().dot(&f.u);
        assert_abs_diff_eq!(gram, Array2::<f64>::eye(3), epsilon = 1e-10);
        assert_abs_diff_eq!(f.projected_response, f.u.t().dot(&data.y), epsilon = 1e-12);
        assert_abs_diff_eq!(f.project(data.y.view()), f.projected_response, epsilon = 0.0);
    }

    #[test]
    fn duplicated_column_reduces_rank() {
        let data = dataset(Array2::from_shape_fn((6, 2), |(i, _)| i as f64));
        let f = Factorization::new(&data).unwrap();
        assert_eq!(f.n_components(), 2);
        assert_eq!(f.rank(1e-10), 1);
    }

    #[test]
    fn constant_design_has_zero_rank() {
        let data = dataset(Array2::from_elem((5, 2), 3.0));
        let f = Factorization::new(&data).unwrap();
        assert_eq!(f.rank(1e-10), 0);
    }

    #[test]
    fn datasets_of_another_shape_are_rejected() {
        let f = Factorization::new(&dataset(Array2::from_shape_fn((6, 2), |(i, j)| {
            ((i + 3 * j) as f64).sin()
        })))
        .unwrap();
        let wider = dataset(Array2::from_shape_fn((6, 3), |(i, j)| ((i * j) as f64).cos()));
        let shorter = dataset(Array2::from_shape_fn((5, 2), |(i, j)| ((i + j) as f64).sqrt()));

        for other in [&wider, &shorter] {
            assert!(matches!(
                f.check_dataset(other),
                Err(EstimationError::ShapeError(_))
            ));
        }
    }
}
