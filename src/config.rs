//! # Engine Configuration
//!
//! Configuration structures controlling how pools create mixtures and how
//! accumulators score frames. Values that other tools persist alongside
//! models (`min_llk`, `max_llk`, the top-N size) live here rather than as
//! constants so experiments can override them.

use crate::{
    distrib::DistribKind,
    errors::{MixtureError, MixtureResult},
    math_utils::constants,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration shared by [`crate::MixtureServer`] and [`crate::StatServer`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MixtureConfig {
    /// Feature vector size. `None` lets the first explicit creation fix it.
    pub vect_size: Option<usize>,
    /// Number of components used by [`crate::MixtureServer::create_default_mixture`]
    pub distrib_count: usize,
    /// Kind of distribution created by default
    pub distrib_kind: DistribKind,
    /// Capacity of the top-N selector
    pub top_distribs_count: usize,
    /// Lower clamp applied to every frame log-likelihood
    pub min_llk: f64,
    /// Upper clamp applied to every frame log-likelihood
    pub max_llk: f64,
    /// Seed for random parameter initialization (OS entropy when `None`)
    pub seed: Option<u64>,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            vect_size: None,
            distrib_count: 1,
            distrib_kind: DistribKind::Diagonal,
            top_distribs_count: constants::DEFAULT_TOP_DISTRIBS_COUNT,
            min_llk: constants::DEFAULT_MIN_LLK,
            max_llk: constants::DEFAULT_MAX_LLK,
            seed: None,
        }
    }
}

impl MixtureConfig {
    /// Configuration with a fixed feature vector size.
    pub fn new(vect_size: usize) -> Self {
        Self {
            vect_size: Some(vect_size),
            ..Self::default()
        }
    }

    /// Seeded configuration for unit and scenario tests.
    pub fn test() -> Self {
        Self {
            vect_size: Some(2),
            distrib_count: 3,
            seed: Some(12345),
            ..Self::default()
        }
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> MixtureResult<()> {
        if let Some(0) = self.vect_size {
            return Err(MixtureError::InvalidParameter {
                parameter: "vect_size".to_string(),
                value: 0.0,
                constraint: "a positive vector size".to_string(),
            });
        }
        if self.top_distribs_count == 0 {
            return Err(MixtureError::InvalidParameter {
                parameter: "top_distribs_count".to_string(),
                value: 0.0,
                constraint: "at least one component".to_string(),
            });
        }
        if !self.min_llk.is_finite() || !self.max_llk.is_finite() || self.min_llk >= self.max_llk {
            return Err(MixtureError::InvalidParameter {
                parameter: "min_llk".to_string(),
                value: self.min_llk,
                constraint: format!("a finite value below max_llk ({})", self.max_llk),
            });
        }
        Ok(())
    }

    /// Scoring subset of this configuration.
    pub fn stat_config(&self) -> StatConfig {
        StatConfig {
            top_distribs_count: self.top_distribs_count,
            min_llk: self.min_llk,
            max_llk: self.max_llk,
        }
    }
}

/// Scoring parameters copied into every [`crate::MixtureStat`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatConfig {
    /// Capacity of the top-N selector
    pub top_distribs_count: usize,
    /// Lower log-likelihood clamp
    pub min_llk: f64,
    /// Upper log-likelihood clamp
    pub max_llk: f64,
}

impl Default for StatConfig {
    fn default() -> Self {
        MixtureConfig::default().stat_config()
    }
}

/// Builder for [`MixtureConfig`] with validation on `build`.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: MixtureConfig,
}

impl ConfigBuilder {
    /// Start building from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the feature vector size.
    pub fn vect_size(mut self, vect_size: usize) -> Self {
        self.config.vect_size = Some(vect_size);
        self
    }

    /// Set the default component count.
    pub fn distrib_count(mut self, count: usize) -> Self {
        self.config.distrib_count = count;
        self
    }

    /// Set the default distribution kind.
    pub fn distrib_kind(mut self, kind: DistribKind) -> Self {
        self.config.distrib_kind = kind;
        self
    }

    /// Set the top-N selector capacity.
    pub fn top_distribs_count(mut self, count: usize) -> Self {
        self.config.top_distribs_count = count;
        self
    }

    /// Set both log-likelihood clamps.
    pub fn llk_bounds(mut self, min_llk: f64, max_llk: f64) -> Self {
        self.config.min_llk = min_llk;
        self.config.max_llk = max_llk;
        self
    }

    /// Set the initialization seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> MixtureResult<MixtureConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
