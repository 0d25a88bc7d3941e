//! Closed set of distribution kinds.
//!
//! Mixtures and pools store [`Distrib`] values and dispatch kind-specific
//! work (vector vs. matrix covariance) by matching on the variant.

use crate::{
    config::MixtureConfig,
    distrib_gd::{DistribGD, RawDistribGD},
    distrib_gf::{DistribGF, RawDistribGF},
    errors::{validate_dimension, validate_kind, MixtureResult},
    random_init::ParamRng,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Covariance structure of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistribKind {
    /// Diagonal covariance (`DistribGD`)
    Diagonal,
    /// Full covariance (`DistribGF`)
    Full,
}

impl fmt::Display for DistribKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistribKind::Diagonal => write!(f, "diagonal"),
            DistribKind::Full => write!(f, "full"),
        }
    }
}

/// A Gaussian distribution in its computed, scoreable form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Distrib {
    /// Diagonal covariance
    Diagonal(DistribGD),
    /// Full covariance
    Full(DistribGF),
}

impl Distrib {
    /// Randomly initialised distribution of the given kind.
    pub fn random(kind: DistribKind, vect_size: usize, rng: &mut ParamRng) -> MixtureResult<Self> {
        Ok(match kind {
            DistribKind::Diagonal => Distrib::Diagonal(DistribGD::random(vect_size, rng)?),
            DistribKind::Full => Distrib::Full(DistribGF::random(vect_size, rng)?),
        })
    }

    /// Randomly initialised distribution of the configured kind and size.
    pub fn from_config(config: &MixtureConfig, rng: &mut ParamRng) -> MixtureResult<Self> {
        Ok(match config.distrib_kind {
            DistribKind::Diagonal => Distrib::Diagonal(DistribGD::from_config(config, rng)?),
            DistribKind::Full => Distrib::Full(DistribGF::from_config(config, rng)?),
        })
    }

    /// Kind tag.
    pub fn kind(&self) -> DistribKind {
        match self {
            Distrib::Diagonal(_) => DistribKind::Diagonal,
            Distrib::Full(_) => DistribKind::Full,
        }
    }

    /// Vector dimension.
    pub fn vect_size(&self) -> usize {
        match self {
            Distrib::Diagonal(d) => d.vect_size(),
            Distrib::Full(d) => d.vect_size(),
        }
    }

    /// Diagonal view, if this is a diagonal distribution.
    pub fn as_diagonal(&self) -> Option<&DistribGD> {
        match self {
            Distrib::Diagonal(d) => Some(d),
            Distrib::Full(_) => None,
        }
    }

    /// Full-covariance view, if this is a full distribution.
    pub fn as_full(&self) -> Option<&DistribGF> {
        match self {
            Distrib::Full(d) => Some(d),
            Distrib::Diagonal(_) => None,
        }
    }

    /// Mean vector.
    pub fn means(&self) -> &[f64] {
        match self {
            Distrib::Diagonal(d) => d.means(),
            Distrib::Full(d) => d.means(),
        }
    }

    /// Mean component `index`.
    pub fn mean(&self, index: usize) -> MixtureResult<f64> {
        match self {
            Distrib::Diagonal(d) => d.mean(index),
            Distrib::Full(d) => d.mean(index),
        }
    }

    /// Set mean component `index`.
    pub fn set_mean(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        match self {
            Distrib::Diagonal(d) => d.set_mean(value, index),
            Distrib::Full(d) => d.set_mean(value, index),
        }
    }

    /// Covariance determinant.
    pub fn det(&self) -> f64 {
        match self {
            Distrib::Diagonal(d) => d.det(),
            Distrib::Full(d) => d.det(),
        }
    }

    /// Normalisation constant.
    pub fn cst(&self) -> f64 {
        match self {
            Distrib::Diagonal(d) => d.cst(),
            Distrib::Full(d) => d.cst(),
        }
    }

    /// Likelihood of `feature`.
    pub fn compute_lk(&self, feature: &[f64]) -> MixtureResult<f64> {
        match self {
            Distrib::Diagonal(d) => d.compute_lk(feature),
            Distrib::Full(d) => d.compute_lk(feature),
        }
    }

    #[inline]
    pub(crate) fn lk_unchecked(&self, feature: &[f64]) -> f64 {
        match self {
            Distrib::Diagonal(d) => d.lk_unchecked(feature),
            Distrib::Full(d) => d.lk_unchecked(feature),
        }
    }

    /// Univariate likelihood along dimension `index`.
    pub fn compute_lk_dim(&self, feature: &[f64], index: usize) -> MixtureResult<f64> {
        match self {
            Distrib::Diagonal(d) => d.compute_lk_dim(feature, index),
            Distrib::Full(d) => d.compute_lk_dim(feature, index),
        }
    }

    /// Editable copy of the parameters.
    pub fn to_raw(&self) -> MixtureResult<RawDistrib> {
        Ok(match self {
            Distrib::Diagonal(d) => RawDistrib::Diagonal(d.to_raw()),
            Distrib::Full(d) => RawDistrib::Full(d.to_raw()?),
        })
    }

    /// Copy the state of `other` into `self`; kinds and sizes must match.
    pub fn assign_from(&mut self, other: &Distrib) -> MixtureResult<()> {
        match (self, other) {
            (Distrib::Diagonal(a), Distrib::Diagonal(b)) => a.assign_from(b),
            (Distrib::Full(a), Distrib::Full(b)) => a.assign_from(b),
            (this, other) => validate_kind(this.kind(), other.kind()),
        }
    }

    /// Replace the parameters with `raw`, recomputing the derived caches.
    pub fn set_params(&mut self, raw: &RawDistrib) -> MixtureResult<()> {
        validate_kind(self.kind(), raw.kind())?;
        validate_dimension(self.vect_size(), raw.vect_size(), "Distrib::set_params")?;
        *self = raw.compute_all()?;
        Ok(())
    }
}

/// A distribution in its editable form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RawDistrib {
    /// Diagonal covariance
    Diagonal(RawDistribGD),
    /// Full covariance
    Full(RawDistribGF),
}

impl RawDistrib {
    /// Zero mean, unit covariance.
    pub fn new(kind: DistribKind, vect_size: usize) -> Self {
        match kind {
            DistribKind::Diagonal => RawDistrib::Diagonal(RawDistribGD::new(vect_size)),
            DistribKind::Full => RawDistrib::Full(RawDistribGF::new(vect_size)),
        }
    }

    /// Kind tag.
    pub fn kind(&self) -> DistribKind {
        match self {
            RawDistrib::Diagonal(_) => DistribKind::Diagonal,
            RawDistrib::Full(_) => DistribKind::Full,
        }
    }

    /// Vector dimension.
    pub fn vect_size(&self) -> usize {
        match self {
            RawDistrib::Diagonal(d) => d.vect_size(),
            RawDistrib::Full(d) => d.vect_size(),
        }
    }

    /// Set mean component `index`.
    pub fn set_mean(&mut self, value: f64, index: usize) -> MixtureResult<()> {
        match self {
            RawDistrib::Diagonal(d) => d.set_mean(value, index),
            RawDistrib::Full(d) => d.set_mean(value, index),
        }
    }

    /// Derive the scoreable form.
    pub fn compute_all(&self) -> MixtureResult<Distrib> {
        Ok(match self {
            RawDistrib::Diagonal(d) => Distrib::Diagonal(d.compute_all()?),
            RawDistrib::Full(d) => Distrib::Full(d.compute_all()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MixtureError;

    #[test]
    fn test_kind_dispatch() {
        let mut rng = ParamRng::with_seed(11);
        let gd = Distrib::random(DistribKind::Diagonal, 4, &mut rng).unwrap();
        let gf = Distrib::random(DistribKind::Full, 4, &mut rng).unwrap();
        assert_eq!(gd.kind(), DistribKind::Diagonal);
        assert_eq!(gf.kind(), DistribKind::Full);
        assert!(gd.as_diagonal().is_some());
        assert!(gd.as_full().is_none());
        assert_eq!(gf.vect_size(), 4);
    }

    #[test]
    fn test_assign_across_kinds_fails() {
        let mut rng = ParamRng::with_seed(12);
        let mut gd = Distrib::random(DistribKind::Diagonal, 3, &mut rng).unwrap();
        let gf = Distrib::random(DistribKind::Full, 3, &mut rng).unwrap();
        assert!(matches!(
            gd.assign_from(&gf),
            Err(MixtureError::TypeMismatch {
                expected: DistribKind::Diagonal,
                actual: DistribKind::Full
            })
        ));
    }

    #[test]
    fn test_assign_across_sizes_fails() {
        let mut rng = ParamRng::with_seed(13);
        let mut a = Distrib::random(DistribKind::Full, 3, &mut rng).unwrap();
        let b = Distrib::random(DistribKind::Full, 2, &mut rng).unwrap();
        assert!(matches!(
            a.assign_from(&b),
            Err(MixtureError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_kinds_never_compare_equal() {
        let mut rng = ParamRng::with_seed(14);
        let gd = Distrib::random(DistribKind::Diagonal, 2, &mut rng).unwrap();
        let raw = RawDistrib::new(DistribKind::Full, 2);
        let gf = raw.compute_all().unwrap();
        assert_ne!(gd, gf);
    }

    #[test]
    fn test_set_params_recomputes() {
        let mut rng = ParamRng::with_seed(15);
        let mut d = Distrib::random(DistribKind::Diagonal, 2, &mut rng).unwrap();
        let raw = RawDistrib::new(DistribKind::Diagonal, 2);
        d.set_params(&raw).unwrap();
        assert_eq!(d.det(), 1.0);
        assert_eq!(d.means(), &[0.0, 0.0]);

        let wrong = RawDistrib::new(DistribKind::Full, 2);
        assert!(d.set_params(&wrong).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DistribKind::Diagonal.to_string(), "diagonal");
        assert_eq!(DistribKind::Full.to_string(), "full");
    }
}
