//! Numeric floors, constants and small helpers shared by the scoring code.

/// Numerical constants of the Gaussian engine.
///
/// `MIN_COV` and `EPS_LK` are part of the compatibility contract: model files
/// written by other tools assume exactly these floors.
pub mod constants {
    /// Minimum value stored for any covariance entry
    pub const MIN_COV: f64 = 1e-200;

    /// Floor for determinants (in `cst`) and for every likelihood value
    pub const EPS_LK: f64 = 1e-200;

    /// Default lower clamp for a frame log-likelihood
    pub const DEFAULT_MIN_LLK: f64 = -200.0;

    /// Default upper clamp for a frame log-likelihood
    pub const DEFAULT_MAX_LLK: f64 = 200.0;

    /// Default number of components kept by the top-N selector
    pub const DEFAULT_TOP_DISTRIBS_COUNT: usize = 10;

    /// 2π
    pub const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

    /// ln(2π)
    pub const LN_TWO_PI: f64 = 1.837_877_066_409_345_5;
}

/// Floor helpers for likelihood values.
pub mod float_ops {
    use super::constants::EPS_LK;

    /// Replace NaN, negative or underflowed likelihoods with `EPS_LK`.
    #[inline]
    pub fn floor_lk(lk: f64) -> f64 {
        // `!(lk >= EPS_LK)` also catches NaN
        if !(lk >= EPS_LK) {
            EPS_LK
        } else {
            lk
        }
    }

    /// Natural log of a likelihood after flooring it.
    #[inline]
    pub fn floored_ln(lk: f64) -> f64 {
        floor_lk(lk).ln()
    }

    /// Check if two floating point numbers are approximately equal with custom epsilon
    #[inline]
    pub fn approx_eq_eps(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }
}

/// Gaussian normalisation constant `1 / (sqrt(det) * (2π)^(D/2))`.
///
/// The determinant is floored at `EPS_LK` first, so a degenerate covariance
/// yields a large but finite constant instead of a division by zero.
pub fn gaussian_cst(det: f64, vect_size: usize) -> f64 {
    let det = if det < constants::EPS_LK {
        log::warn!(
            "Determinant {:.3e} below EPS_LK, flooring for normalisation constant",
            det
        );
        constants::EPS_LK
    } else {
        det
    };
    1.0 / (det.sqrt() * constants::TWO_PI.powf(vect_size as f64 / 2.0))
}

/// Clamp a log-likelihood to `[min_llk, max_llk]`.
#[inline]
pub fn clamp_llk(llk: f64, min_llk: f64, max_llk: f64) -> f64 {
    if llk < min_llk {
        min_llk
    } else if llk > max_llk {
        max_llk
    } else {
        llk
    }
}
