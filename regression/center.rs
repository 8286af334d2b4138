//! Mean removal for explanatory and response data.
//!
//! Every downstream computation assumes zero-mean columns, which removes the
//! intercept from the regression and lets the SVD of the design matrix carry
//! all of the information the evidence approximation needs. The removed means
//! are returned alongside the centered data so callers can map query rows and
//! predictions between centered and original units.

use crate::estimate::EstimationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Subtracts the per-column mean from `x`, returning the centered copy and the means.
pub fn center_matrix(x: ArrayView2<f64>) -> Result<(Array2<f64>, Array1<f64>), EstimationError> {
    let means = x.mean_axis(Axis(0)).ok_or_else(|| {
        EstimationError::ShapeError(format!(
            "cannot center a matrix with {} rows and {} columns",
            x.nrows(),
            x.ncols()
        ))
    })?;
    let centered = &x - &means;
    Ok((centered, means))
}

/// Subtracts the overall mean from `y`, returning the centered copy and the mean.
pub fn center_vector(y: ArrayView1<f64>) -> Result<(Array1<f64>, f64), EstimationError> {
    let mean = y
        .mean()
        .ok_or_else(|| EstimationError::ShapeError("cannot center an empty vector".to_string()))?;
    Ok((y.mapv(|v| v - mean), mean))
}

/// Applies previously recorded column means to new rows.
pub fn apply_feature_means(
    x: ArrayView2<f64>,
    means: ArrayView1<f64>,
) -> Result<Array2<f64>, EstimationError> {
    if x.ncols() != means.len() {
        return Err(EstimationError::ShapeError(format!(
            "query has {} columns, but {} feature means were recorded",
            x.ncols(),
            means.len()
        )));
    }
    Ok(&x - &means)
}
