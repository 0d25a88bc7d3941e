//! Dense matrix routines for full-covariance Gaussians.
//!
//! Inversion goes through an LU decomposition so the determinant comes out
//! of the same factorisation as the inverse.

use crate::errors::{MixtureError, MixtureResult};
use nalgebra::{DMatrix, DVector};

/// Validates that a matrix is square with finite entries
fn ensure_square_finite(m: &DMatrix<f64>, operation: &str) -> MixtureResult<()> {
    if m.nrows() != m.ncols() {
        return Err(MixtureError::DimensionMismatch {
            expected: m.nrows(),
            actual: m.ncols(),
            context: format!("{} (non-square matrix)", operation),
        });
    }
    if let Some(value) = m.iter().find(|v| !v.is_finite()) {
        return Err(MixtureError::InvalidParameter {
            parameter: format!("{} matrix entry", operation),
            value: *value,
            constraint: "a finite value".to_string(),
        });
    }
    Ok(())
}

/// Invert `m` and return `(inverse, determinant)`.
///
/// Fails with [`MixtureError::SingularCovariance`] when the LU factorisation
/// has a zero pivot.
pub fn invert_with_determinant(m: &DMatrix<f64>) -> MixtureResult<(DMatrix<f64>, f64)> {
    ensure_square_finite(m, "invert_with_determinant")?;

    let lu = m.clone().lu();
    let det = lu.determinant();
    let inverse = lu
        .try_inverse()
        .ok_or(MixtureError::SingularCovariance { determinant: det })?;

    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(MixtureError::SingularCovariance { determinant: det });
    }

    Ok((inverse, det))
}

/// Quadratic form `Σ_i (Σ_j d_j · m[i][j]) · d_i`.
///
/// The summation order is fixed so scores are reproducible across calls.
#[inline]
pub fn quadratic_form(m: &DMatrix<f64>, d: &[f64]) -> f64 {
    let mut total = 0.0;
    for i in 0..d.len() {
        let mut row = 0.0;
        for j in 0..d.len() {
            row += d[j] * m[(i, j)];
        }
        total += row * d[i];
    }
    total
}

/// Accumulate `scale · x · xᵗ` into `acc`.
pub fn add_scaled_outer_product(acc: &mut DMatrix<f64>, x: &[f64], scale: f64) {
    let v = DVector::from_column_slice(x);
    acc.ger(scale, &v, &v, 1.0);
}
