//! Diagonal-covariance Gaussian distributions.
//!
//! [`RawDistribGD`] holds editable parameters (mean and covariance);
//! [`RawDistribGD::compute_all`] turns it into a [`DistribGD`], the only form
//! that answers likelihood queries. A `DistribGD` keeps the inverse
//! covariance, determinant and normalisation constant, and rebuilds the
//! covariance from the inverse on demand.

use crate::{
    config::MixtureConfig,
    errors::{validate_dimension, validate_index, MixtureError, MixtureResult},
    math_utils::{constants, float_ops::floor_lk, gaussian_cst},
    random_init::ParamRng,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Editable diagonal Gaussian parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDistribGDRecord"))]
pub struct RawDistribGD {
    mean: Vec<f64>,
    cov: Vec<f64>,
}

// mean and covariance lengths are checked on load
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawDistribGDRecord {
    mean: Vec<f64>,
    cov: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDistribGDRecord> for RawDistribGD {
    type Error = MixtureError;

    fn try_from(record: RawDistribGDRecord) -> MixtureResult<Self> {
        Self::from_vectors(record.mean, record.cov)
    }
}

impl RawDistribGD {
    /// Zero mean, unit covariance.
    pub fn new(vect_size: usize) -> Self {
        Self {
            mean: vec![0.0; vect_size],
            cov: vec![1.0; vect_size],
        }
    }

    /// Mean in `[-1, 1)`, covariance in `(0, 1]`.
    pub fn random(vect_size: usize, rng: &mut ParamRng) -> Self {
        let mean = (0..vect_size).map(|_| rng.mean_value()).collect();
        let cov = (0..vect_size).map(|_| rng.cov_value()).collect();
        Self { mean, cov }
    }

    /// Build from explicit vectors. Covariances are stored as given, without
    /// the `MIN_COV` floor.
    pub fn from_vectors(mean: Vec<f64>, cov: Vec<f64>) -> MixtureResult<Self> {
        validate_dimension(mean.len(), cov.len(), "RawDistribGD::from_vectors")?;
        Ok(Self { mean, cov })
    }

    /// Vector dimension.
    pub fn vect_size(&self) -> usize {
        self.mean.len()
    }

    /// Mean component `index`.
    pub fn mean(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.mean.len(), "RawDistribGD::mean")?;
        Ok(self.mean[index])
    }

    /// Covariance component `index`.
    pub fn cov(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.cov.len(), "RawDistribGD::cov")?;
        Ok(self.cov[index])
    }

    /// Mean vector.
    pub fn means(&self) -> &[f64] {
        &self.mean
    }

    /// Covariance vector.
    pub fn covs(&self) -> &[f64] {
        &self.cov
    }

    /// Set mean component `index`.
    pub fn set_mean(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.mean.len(), "RawDistribGD::set_mean")?;
        self.mean[index] = value;
        Ok(())
    }

    /// Set covariance component `index`; values below `MIN_COV` are stored
    /// as `MIN_COV`.
    pub fn set_cov(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.cov.len(), "RawDistribGD::set_cov")?;
        self.cov[index] = if value < constants::MIN_COV {
            constants::MIN_COV
        } else {
            value
        };
        Ok(())
    }

    /// Derive inverse covariance, determinant and `cst`.
    pub fn compute_all(&self) -> MixtureResult<DistribGD> {
        let det: f64 = self.cov.iter().product();

        let mut inv_cov = Vec::with_capacity(self.cov.len());
        for (index, &c) in self.cov.iter().enumerate() {
            if c == 0.0 {
                return Err(MixtureError::DivisionByZero { index });
            }
            inv_cov.push(1.0 / c);
        }

        Ok(DistribGD {
            mean: self.mean.clone(),
            inv_cov,
            det,
            cst: gaussian_cst(det, self.cov.len()),
        })
    }
}

/// Diagonal Gaussian ready for likelihood computation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "DistribGDRecord"))]
pub struct DistribGD {
    mean: Vec<f64>,
    inv_cov: Vec<f64>,
    det: f64,
    cst: f64,
}

// mean and inverse covariance lengths are checked on load
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct DistribGDRecord {
    mean: Vec<f64>,
    inv_cov: Vec<f64>,
    det: f64,
    cst: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<DistribGDRecord> for DistribGD {
    type Error = MixtureError;

    fn try_from(record: DistribGDRecord) -> MixtureResult<Self> {
        Self::from_parts(record.mean, record.inv_cov, record.det, record.cst)
    }
}

impl DistribGD {
    /// Randomly initialised distribution of dimension `vect_size`.
    pub fn random(vect_size: usize, rng: &mut ParamRng) -> MixtureResult<Self> {
        if vect_size == 0 {
            return Err(MixtureError::InvalidParameter {
                parameter: "vect_size".to_string(),
                value: 0.0,
                constraint: "a positive vector size".to_string(),
            });
        }
        RawDistribGD::random(vect_size, rng).compute_all()
    }

    /// Randomly initialised distribution sized from the configuration.
    pub fn from_config(config: &MixtureConfig, rng: &mut ParamRng) -> MixtureResult<Self> {
        let vect_size = config.vect_size.ok_or_else(|| MixtureError::UndefinedState {
            reason: "vect_size is not set in the configuration".to_string(),
        })?;
        Self::random(vect_size, rng)
    }

    /// Restore a distribution from persisted parameters without recomputation.
    pub fn from_parts(mean: Vec<f64>, inv_cov: Vec<f64>, det: f64, cst: f64) -> MixtureResult<Self> {
        validate_dimension(mean.len(), inv_cov.len(), "DistribGD::from_parts")?;
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
        validate_index(index, self.mean.len(), "DistribGD::mean")?;
        Ok(self.mean[index])
    }

    /// Mean vector.
    pub fn means(&self) -> &[f64] {
        &self.mean
    }

    /// Set mean component `index`. The derived caches do not depend on the
    /// mean, so the distribution stays valid.
    pub fn set_mean(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.mean.len(), "DistribGD::set_mean")?;
        self.mean[index] = value;
        Ok(())
    }

    /// Inverse covariance component `index`.
    pub fn inv_cov(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.inv_cov.len(), "DistribGD::inv_cov")?;
        Ok(self.inv_cov[index])
    }

    /// Inverse covariance vector.
    pub fn inv_covs(&self) -> &[f64] {
        &self.inv_cov
    }

    /// Covariance component `index`, rebuilt from the inverse and floored at
    /// `MIN_COV`.
    pub fn cov(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.inv_cov.len(), "DistribGD::cov")?;
        Ok(Self::cov_from_inverse(self.inv_cov[index]))
    }

    fn cov_from_inverse(inv: f64) -> f64 {
        let c = 1.0 / inv;
        if c < constants::MIN_COV {
            constants::MIN_COV
        } else {
            c
        }
    }

    /// Product of the covariance components.
    pub fn det(&self) -> f64 {
        self.det
    }

    /// Normalisation constant.
    pub fn cst(&self) -> f64 {
        self.cst
    }

    /// Likelihood of `feature`, never NaN and never below `EPS_LK`.
    pub fn compute_lk(&self, feature: &[f64]) -> MixtureResult<f64> {
        validate_dimension(self.mean.len(), feature.len(), "DistribGD::compute_lk")?;
        Ok(self.lk_unchecked(feature))
    }

    /// Likelihood with the dimension already checked by the caller.
    #[inline]
    pub(crate) fn lk_unchecked(&self, feature: &[f64]) -> f64 {
        let mut sum = 0.0;
        for ((f, m), ic) in feature.iter().zip(&self.mean).zip(&self.inv_cov) {
            let d = f - m;
            sum += d * d * ic;
        }
        floor_lk(self.cst * (-0.5 * sum).exp())
    }

    /// Univariate likelihood of `feature[index]` under dimension `index`.
    pub fn compute_lk_dim(&self, feature: &[f64], index: usize) -> MixtureResult<f64> {
        validate_dimension(self.mean.len(), feature.len(), "DistribGD::compute_lk_dim")?;
        validate_index(index, self.mean.len(), "DistribGD::compute_lk_dim")?;
        Ok(univariate_lk(feature[index], self.mean[index], self.inv_cov[index]))
    }

    /// Editable copy; covariance is rebuilt from the inverse.
    pub fn to_raw(&self) -> RawDistribGD {
        RawDistribGD {
            mean: self.mean.clone(),
            cov: self
                .inv_cov
                .iter()
                .map(|&ic| Self::cov_from_inverse(ic))
                .collect(),
        }
    }

    /// Copy every parameter of `other` into `self`.
    pub fn assign_from(&mut self, other: &DistribGD) -> MixtureResult<()> {
        validate_dimension(self.vect_size(), other.vect_size(), "DistribGD::assign_from")?;
        self.mean.copy_from_slice(&other.mean);
        self.inv_cov.copy_from_slice(&other.inv_cov);
        self.det = other.det;
        self.cst = other.cst;
        Ok(())
    }
}

/// Equal when mean and inverse covariance are identical; `det` and `cst`
/// follow from the inverse.
impl PartialEq for DistribGD {
    fn eq(&self, other: &Self) -> bool {
        self.mean == other.mean && self.inv_cov == other.inv_cov
    }
}

/// `sqrt(inv / 2π) · exp(-0.5 · (x - m)² · inv)`, floored at `EPS_LK`.
#[inline]
pub(crate) fn univariate_lk(x: f64, mean: f64, inv_cov: f64) -> f64 {
    let d = x - mean;
    let cst = (inv_cov / constants::TWO_PI).sqrt();
    floor_lk(cst * (-0.5 * d * d * inv_cov).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn reference_distrib() -> DistribGD {
        let mut raw = RawDistribGD::new(5);
        for i in 0..5 {
            raw.set_mean(i as f64 + 2.0, i).unwrap();
            raw.set_cov(i as f64 + 1.0, i).unwrap();
        }
        raw.compute_all().unwrap()
    }

    #[test]
    fn test_reference_values() {
        let d = reference_distrib();
        assert_eq!(d.det(), 120.0);
        assert_approx_eq!(d.cst(), 0.00092248583478473, 1e-15);
        let lk = d.compute_lk(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_approx_eq!(lk, 0.000294537, 1e-9);
    }

    #[test]
    fn test_set_cov_floor() {
        let mut raw = RawDistribGD::new(3);
        raw.set_cov(0.25, 0).unwrap();
        raw.set_cov(0.0, 1).unwrap();
        raw.set_cov(-4.0, 2).unwrap();
        assert_eq!(raw.cov(0).unwrap(), 0.25);
        assert_eq!(raw.cov(1).unwrap(), constants::MIN_COV);
        assert_eq!(raw.cov(2).unwrap(), constants::MIN_COV);
    }

    #[test]
    fn test_zero_covariance_from_low_level_path() {
        let raw = RawDistribGD::from_vectors(vec![0.0, 0.0], vec![1.0, 0.0]).unwrap();
        assert!(matches!(
            raw.compute_all(),
            Err(MixtureError::DivisionByZero { index: 1 })
        ));
    }

    #[test]
    fn test_far_feature_is_floored_not_nan() {
        let d = reference_distrib();
        let lk = d.compute_lk(&[1e150, -1e150, 1e150, 0.0, 0.0]).unwrap();
        assert_eq!(lk, constants::EPS_LK);
    }

    #[test]
    fn test_dimension_mismatch() {
        let d = reference_distrib();
        assert!(matches!(
            d.compute_lk(&[1.0, 2.0]),
            Err(MixtureError::DimensionMismatch {
                expected: 5,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_compute_lk_dim() {
        let d = reference_distrib();
        let f = [2.0, 3.0, 4.0, 5.0, 6.0];
        // at the mean: 1 / sqrt(2π σ²) with σ² = 3
        let lk = d.compute_lk_dim(&f, 2).unwrap();
        assert_approx_eq!(lk, 1.0 / (constants::TWO_PI * 3.0).sqrt(), 1e-14);
        assert!(d.compute_lk_dim(&f, 5).is_err());
    }

    #[test]
    fn test_cov_rebuilt_from_inverse() {
        let d = reference_distrib();
        for i in 0..5 {
            assert_approx_eq!(d.cov(i).unwrap(), i as f64 + 1.0, 1e-12);
        }
        let raw = d.to_raw();
        assert_eq!(raw.means(), d.means());
    }

    #[test]
    fn test_equality_ignores_det_and_cst() {
        let a = reference_distrib();
        let b = DistribGD::from_parts(a.means().to_vec(), a.inv_covs().to_vec(), 1.0, 1.0).unwrap();
        assert_eq!(a, b);

        let mut c = a.clone();
        c.set_mean(0.0, 0).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_assign_from_dimension_check() {
        let mut rng = ParamRng::with_seed(1);
        let mut a = DistribGD::random(3, &mut rng).unwrap();
        let b = DistribGD::random(3, &mut rng).unwrap();
        let c = DistribGD::random(4, &mut rng).unwrap();
        a.assign_from(&b).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.det(), b.det());
        assert!(a.assign_from(&c).is_err());
    }
}
