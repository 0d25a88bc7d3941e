//! Full-covariance Gaussian distributions.
//!
//! Same two-state protocol as [`crate::distrib_gd`]: a [`RawDistribGF`]
//! holds the `D×D` covariance, [`RawDistribGF::compute_all`] inverts it and
//! yields a [`DistribGF`].

use crate::{
    config::MixtureConfig,
    distrib_gd::univariate_lk,
    errors::{validate_dimension, validate_index, MixtureError, MixtureResult},
    linear_algebra::{invert_with_determinant, quadratic_form},
    math_utils::{constants, float_ops::floor_lk, gaussian_cst},
    random_init::ParamRng,
};
use nalgebra::DMatrix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

fn floor_cov(value: f64) -> f64 {
    if value < constants::MIN_COV {
        constants::MIN_COV
    } else {
        value
    }
}

/// Editable full-covariance Gaussian parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDistribGFRecord"))]
pub struct RawDistribGF {
    mean: Vec<f64>,
    cov: DMatrix<f64>,
}

// covariance shape is checked against the mean on load
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawDistribGFRecord {
    mean: Vec<f64>,
    cov: DMatrix<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDistribGFRecord> for RawDistribGF {
    type Error = MixtureError;

    fn try_from(record: RawDistribGFRecord) -> MixtureResult<Self> {
        Self::from_parts(record.mean, record.cov)
    }
}

impl RawDistribGF {
    /// Zero mean, identity covariance.
    pub fn new(vect_size: usize) -> Self {
        Self {
            mean: vec![0.0; vect_size],
            cov: DMatrix::identity(vect_size, vect_size),
        }
    }

    /// Mean in `[-1, 1)`, diagonal covariance in `(0, 1]`, zero correlations.
    pub fn random(vect_size: usize, rng: &mut ParamRng) -> Self {
        let mean = (0..vect_size).map(|_| rng.mean_value()).collect();
        let mut cov = DMatrix::zeros(vect_size, vect_size);
        for i in 0..vect_size {
            cov[(i, i)] = rng.cov_value();
        }
        Self { mean, cov }
    }

    /// Build from an explicit mean and covariance, stored as given.
    pub fn from_parts(mean: Vec<f64>, cov: DMatrix<f64>) -> MixtureResult<Self> {
        validate_dimension(mean.len(), cov.nrows(), "RawDistribGF::from_parts (rows)")?;
        validate_dimension(mean.len(), cov.ncols(), "RawDistribGF::from_parts (cols)")?;
        Ok(Self { mean, cov })
    }

    /// Vector dimension.
    pub fn vect_size(&self) -> usize {
        self.mean.len()
    }

    /// Mean component `index`.
    pub fn mean(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.mean.len(), "RawDistribGF::mean")?;
        Ok(self.mean[index])
    }

    /// Mean vector.
    pub fn means(&self) -> &[f64] {
        &self.mean
    }

    /// Covariance matrix.
    pub fn cov_matrix(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Covariance entry at (`row`, `col`).
    pub fn cov(&self, col: usize, row: usize) -> MixtureResult<f64> {
        validate_index(col, self.mean.len(), "RawDistribGF::cov (col)")?;
        validate_index(row, self.mean.len(), "RawDistribGF::cov (row)")?;
        Ok(self.cov[(row, col)])
    }

    /// Set mean component `index`.
    pub fn set_mean(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.mean.len(), "RawDistribGF::set_mean")?;
        self.mean[index] = value;
        Ok(())
    }

    /// Set covariance entry (`row`, `col`).
    ///
    /// Any value below `MIN_COV` is stored as `MIN_COV`, off-diagonal
    /// entries included. Model files produced by other tools rely on this,
    /// so negative correlations cannot be expressed through this setter.
    pub fn set_cov(&mut self, value: f64, col: usize, row: usize) -> MixtureResult<()> {
        validate_index(col, self.mean.len(), "RawDistribGF::set_cov (col)")?;
        validate_index(row, self.mean.len(), "RawDistribGF::set_cov (row)")?;
        self.cov[(row, col)] = floor_cov(value);
        Ok(())
    }

    /// Invert the covariance and derive `det` and `cst`.
    pub fn compute_all(&self) -> MixtureResult<DistribGF> {
        let (inv_cov, det) = invert_with_determinant(&self.cov)?;
        Ok(DistribGF {
            mean: self.mean.clone(),
            inv_cov,
            det,
            cst: gaussian_cst(det, self.mean.len()),
        })
    }
}

/// Full-covariance Gaussian ready for likelihood computation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "DistribGFRecord"))]
pub struct DistribGF {
    mean: Vec<f64>,
    inv_cov: DMatrix<f64>,
    det: f64,
    cst: f64,
}

// inverse covariance shape is checked against the mean on load
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct DistribGFRecord {
    mean: Vec<f64>,
    inv_cov: DMatrix<f64>,
    det: f64,
    cst: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<DistribGFRecord> for DistribGF {
    type Error = MixtureError;

    fn try_from(record: DistribGFRecord) -> MixtureResult<Self> {
        Self::from_parts(record.mean, record.inv_cov, record.det, record.cst)
    }
}

impl DistribGF {
    /// Randomly initialised distribution of dimension `vect_size`.
    pub fn random(vect_size: usize, rng: &mut ParamRng) -> MixtureResult<Self> {
        if vect_size == 0 {
            return Err(MixtureError::InvalidParameter {
                parameter: "vect_size".to_string(),
                value: 0.0,
                constraint: "a positive vector size".to_string(),
            });
        }
        RawDistribGF::random(vect_size, rng).compute_all()
    }

    /// Randomly initialised distribution sized from the configuration.
    pub fn from_config(config: &MixtureConfig, rng: &mut ParamRng) -> MixtureResult<Self> {
        let vect_size = config.vect_size.ok_or_else(|| MixtureError::UndefinedState {
            reason: "vect_size is not set in the configuration".to_string(),
        })?;
        Self::random(vect_size, rng)
    }

    /// Restore a distribution from persisted parameters without recomputation.
    pub fn from_parts(
        mean: Vec<f64>,
        inv_cov: DMatrix<f64>,
        det: f64,
        cst: f64,
    ) -> MixtureResult<Self> {
        validate_dimension(mean.len(), inv_cov.nrows(), "DistribGF::from_parts (rows)")?;
        validate_dimension(mean.len(), inv_cov.ncols(), "DistribGF::from_parts (cols)")?;
        Ok(Self {
            mean,
            inv_cov,
            det,
            cst,
        })
    }

    /// Vector dimension.
    pub fn vect_size(&self) -> usize {
        self.mean.len()
    }

    /// Mean component `index`.
    pub fn mean(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.mean.len(), "DistribGF::mean")?;
        Ok(self.mean[index])
    }

    /// Mean vector.
    pub fn means(&self) -> &[f64] {
        &self.mean
    }

    /// Set mean component `index`.
    pub fn set_mean(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.mean.len(), "DistribGF::set_mean")?;
        self.mean[index] = value;
        Ok(())
    }

    /// Inverse covariance entry at (`row`, `col`).
    pub fn inv_cov(&self, col: usize, row: usize) -> MixtureResult<f64> {
        validate_index(col, self.mean.len(), "DistribGF::inv_cov (col)")?;
        validate_index(row, self.mean.len(), "DistribGF::inv_cov (row)")?;
        Ok(self.inv_cov[(row, col)])
    }

    /// Inverse covariance matrix.
    pub fn inv_cov_matrix(&self) -> &DMatrix<f64> {
        &self.inv_cov
    }

    /// Covariance rebuilt by inverting the inverse, every entry floored at
    /// `MIN_COV`.
    pub fn cov_matrix(&self) -> MixtureResult<DMatrix<f64>> {
        let (cov, _) = invert_with_determinant(&self.inv_cov)?;
        Ok(cov.map(floor_cov))
    }

    /// Covariance entry at (`row`, `col`). Inverts the whole matrix; use
    /// [`DistribGF::cov_matrix`] to read many entries.
    pub fn cov(&self, col: usize, row: usize) -> MixtureResult<f64> {
        validate_index(col, self.mean.len(), "DistribGF::cov (col)")?;
        validate_index(row, self.mean.len(), "DistribGF::cov (row)")?;
        Ok(self.cov_matrix()?[(row, col)])
    }

    /// Covariance determinant.
    pub fn det(&self) -> f64 {
        self.det
    }

    /// Normalisation constant.
    pub fn cst(&self) -> f64 {
        self.cst
    }

    /// Likelihood of `feature`, never NaN and never below `EPS_LK`.
    pub fn compute_lk(&self, feature: &[f64]) -> MixtureResult<f64> {
        validate_dimension(self.mean.len(), feature.len(), "DistribGF::compute_lk")?;
        Ok(self.lk_unchecked(feature))
    }

    #[inline]
    pub(crate) fn lk_unchecked(&self, feature: &[f64]) -> f64 {
        let diff: Vec<f64> = feature.iter().zip(&self.mean).map(|(f, m)| f - m).collect();
        let q = quadratic_form(&self.inv_cov, &diff);
        floor_lk(self.cst * (-0.5 * q).exp())
    }

    /// Univariate likelihood of `feature[index]` using only the diagonal
    /// inverse entry. This is not the marginal of a correlated Gaussian;
    /// top-N pruning thresholds are tuned against this value.
    pub fn compute_lk_dim(&self, feature: &[f64], index: usize) -> MixtureResult<f64> {
        validate_dimension(self.mean.len(), feature.len(), "DistribGF::compute_lk_dim")?;
        validate_index(index, self.mean.len(), "DistribGF::compute_lk_dim")?;
        Ok(univariate_lk(
            feature[index],
            self.mean[index],
            self.inv_cov[(index, index)],
        ))
    }

    /// Editable copy; covariance is rebuilt from the inverse.
    pub fn to_raw(&self) -> MixtureResult<RawDistribGF> {
        Ok(RawDistribGF {
            mean: self.mean.clone(),
            cov: self.cov_matrix()?,
        })
    }

    /// Copy every parameter of `other` into `self`.
    pub fn assign_from(&mut self, other: &DistribGF) -> MixtureResult<()> {
        validate_dimension(self.vect_size(), other.vect_size(), "DistribGF::assign_from")?;
        self.mean.copy_from_slice(&other.mean);
        self.inv_cov.copy_from(&other.inv_cov);
        self.det = other.det;
        self.cst = other.cst;
        Ok(())
    }
}

impl PartialEq for DistribGF {
    fn eq(&self, other: &Self) -> bool {
        self.mean == other.mean && self.inv_cov == other.inv_cov
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distrib_gd::RawDistribGD;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_diagonal_full_matches_diagonal_variant() {
        let mut gf = RawDistribGF::new(5);
        let mut gd = RawDistribGD::new(5);
        for i in 0..5 {
            gf.set_mean(i as f64 + 2.0, i).unwrap();
            gd.set_mean(i as f64 + 2.0, i).unwrap();
            gd.set_cov(i as f64 + 1.0, i).unwrap();
        }
        let mut cov = DMatrix::zeros(5, 5);
        for i in 0..5 {
            cov[(i, i)] = i as f64 + 1.0;
        }
        let gf = RawDistribGF::from_parts(gf.means().to_vec(), cov)
            .unwrap()
            .compute_all()
            .unwrap();
        let gd = gd.compute_all().unwrap();

        assert_approx_eq!(gf.det(), 120.0, 1e-9);
        assert_approx_eq!(gf.cst(), gd.cst(), 1e-15);
        let f = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx_eq!(gf.compute_lk(&f).unwrap(), gd.compute_lk(&f).unwrap(), 1e-15);
    }

    #[test]
    fn test_correlated_likelihood() {
        // Σ = [[2, 1], [1, 2]], det 3, Σ⁻¹ = [[2, -1], [-1, 2]] / 3
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let d = RawDistribGF::from_parts(vec![0.0, 0.0], cov)
            .unwrap()
            .compute_all()
            .unwrap();
        assert_approx_eq!(d.det(), 3.0, 1e-12);

        let f = [1.0, 1.0];
        let q: f64 = (2.0 - 1.0 - 1.0 + 2.0) / 3.0;
        let expected = (-0.5 * q).exp() / (constants::TWO_PI * 3.0f64.sqrt());
        assert_approx_eq!(d.compute_lk(&f).unwrap(), expected, 1e-14);
    }

    #[test]
    fn test_set_cov_floors_off_diagonal() {
        let mut raw = RawDistribGF::new(2);
        raw.set_cov(-0.5, 0, 1).unwrap();
        assert_eq!(raw.cov(0, 1).unwrap(), constants::MIN_COV);
        raw.set_cov(0.3, 1, 0).unwrap();
        assert_eq!(raw.cov(1, 0).unwrap(), 0.3);
        assert!(raw.set_cov(1.0, 2, 0).is_err());
    }

    #[test]
    fn test_singular_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let raw = RawDistribGF::from_parts(vec![0.0, 0.0], cov).unwrap();
        assert!(matches!(
            raw.compute_all(),
            Err(MixtureError::SingularCovariance { .. })
        ));
    }

    #[test]
    fn test_compute_lk_dim_uses_diagonal_inverse_only() {
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let d = RawDistribGF::from_parts(vec![0.0, 0.0], cov)
            .unwrap()
            .compute_all()
            .unwrap();
        let inv00 = d.inv_cov(0, 0).unwrap();
        let lk = d.compute_lk_dim(&[0.0, 5.0], 0).unwrap();
        assert_approx_eq!(lk, (inv00 / constants::TWO_PI).sqrt(), 1e-14);
    }

    #[test]
    fn test_cov_rebuilt_from_inverse() {
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let d = RawDistribGF::from_parts(vec![0.0, 0.0], cov)
            .unwrap()
            .compute_all()
            .unwrap();
        assert_approx_eq!(d.cov(0, 0).unwrap(), 2.0, 1e-12);
        assert_approx_eq!(d.cov(1, 0).unwrap(), 0.5, 1e-12);
        assert_approx_eq!(d.cov(1, 1).unwrap(), 1.0, 1e-12);

        let again = d.to_raw().unwrap().compute_all().unwrap();
        assert_approx_eq!(again.det(), d.det(), 1e-12);
    }
}
