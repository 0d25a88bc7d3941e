//! # Mixture Statistics Accumulator
//!
//! A [`MixtureStat`] scores feature vectors against one pooled mixture and
//! keeps three independent sets of running sums:
//!
//! - **LLK**: weighted sum of frame log-likelihoods and the weighted frame
//!   count, for mean log-likelihood scoring.
//! - **Occupancy**: per-component posterior responsibilities, summed over
//!   frames.
//! - **EM**: per-component zeroth, first and second order sufficient
//!   statistics, read out by [`MixtureStat::get_em`] as a re-estimated
//!   [`MixtureSnapshot`].
//!
//! The accumulator only reads the mixture. Committing an EM estimate is a
//! separate, explicit step on the pool
//! ([`MixtureServer::assign_mixture`](crate::MixtureServer::assign_mixture)),
//! which lets several accumulators run over the same parameters on
//! different threads and be merged with [`MixtureStat::add_acc_em`].
//!
//! Frame log-likelihoods are `ln(max(lk, EPS_LK))` clamped to the configured
//! `[min_llk, max_llk]` range.

use crate::{
    config::StatConfig,
    distrib::{Distrib, DistribKind, RawDistrib},
    distrib_gd::RawDistribGD,
    distrib_gf::RawDistribGF,
    errors::{validate_dimension, validate_index, validate_kind, MixtureError, MixtureResult},
    feature::FeatureSource,
    linear_algebra::add_scaled_outer_product,
    math_utils::{clamp_llk, float_ops::floor_lk, float_ops::floored_ln},
    mixture::{MixtureComponents, MixtureSnapshot, MixtureView},
    top_distribs::TopDistribsAction,
};
use nalgebra::DMatrix;

#[derive(Debug, Clone)]
enum SecondMoments {
    Diagonal(Vec<Vec<f64>>),
    Full(Vec<DMatrix<f64>>),
}

impl SecondMoments {
    fn zeros(kind: DistribKind, distrib_count: usize, vect_size: usize) -> Self {
        match kind {
            DistribKind::Diagonal => {
                SecondMoments::Diagonal(vec![vec![0.0; vect_size]; distrib_count])
            }
            DistribKind::Full => {
                SecondMoments::Full(vec![DMatrix::zeros(vect_size, vect_size); distrib_count])
            }
        }
    }

    fn accumulate(&mut self, c: usize, feature: &[f64], occ: f64) {
        match self {
            SecondMoments::Diagonal(sums) => {
                for (s, &x) in sums[c].iter_mut().zip(feature) {
                    *s += occ * x * x;
                }
            }
            SecondMoments::Full(sums) => add_scaled_outer_product(&mut sums[c], feature, occ),
        }
    }

    fn kind(&self) -> DistribKind {
        match self {
            SecondMoments::Diagonal(_) => DistribKind::Diagonal,
            SecondMoments::Full(_) => DistribKind::Full,
        }
    }

    fn add(&mut self, other: &SecondMoments) -> MixtureResult<()> {
        match (self, other) {
            (SecondMoments::Diagonal(a), SecondMoments::Diagonal(b)) => {
                for (ra, rb) in a.iter_mut().zip(b) {
                    for (x, y) in ra.iter_mut().zip(rb) {
                        *x += y;
                    }
                }
            }
            (SecondMoments::Full(a), SecondMoments::Full(b)) => {
                for (ma, mb) in a.iter_mut().zip(b) {
                    *ma += mb;
                }
            }
            (mine, theirs) => {
                return Err(MixtureError::TypeMismatch {
                    expected: mine.kind(),
                    actual: theirs.kind(),
                })
            }
        }
        Ok(())
    }
}

/// EM sufficient statistics for every component of a mixture.
#[derive(Debug, Clone)]
struct EmAccumulator {
    occ: Vec<f64>,
    mean_sums: Vec<Vec<f64>>,
    second: SecondMoments,
    frame_count: f64,
}

impl EmAccumulator {
    fn zeros(kind: DistribKind, distrib_count: usize, vect_size: usize) -> Self {
        Self {
            occ: vec![0.0; distrib_count],
            mean_sums: vec![vec![0.0; vect_size]; distrib_count],
            second: SecondMoments::zeros(kind, distrib_count, vect_size),
            frame_count: 0.0,
        }
    }
}

/// Likelihood, occupancy and EM accumulator bound to one pooled mixture.
#[derive(Debug, Clone)]
pub struct MixtureStat<'a> {
    view: MixtureView<'a>,
    config: StatConfig,
    weights: Vec<f64>,
    // weighted component likelihoods of the last scored frame
    lks: Vec<f64>,

    llk: Option<f64>,
    accumulated_llk: f64,
    llk_frame_count: f64,

    occ: Vec<f64>,
    accumulated_occ: Vec<f64>,
    occ_frame_count: f64,

    em: EmAccumulator,
}

impl<'a> MixtureStat<'a> {
    /// Fresh accumulator with every statistic reset.
    pub fn new(view: MixtureView<'a>, config: StatConfig) -> Self {
        let n = view.distrib_count();
        let weights = view.iter().map(|(w, _)| w).collect();
        Self {
            view,
            config,
            weights,
            lks: Vec::with_capacity(n),
            llk: None,
            accumulated_llk: 0.0,
            llk_frame_count: 0.0,
            occ: vec![0.0; n],
            accumulated_occ: vec![0.0; n],
            occ_frame_count: 0.0,
            em: EmAccumulator::zeros(view.kind(), n, view.vect_size()),
        }
    }

    /// Mixture being scored.
    pub fn view(&self) -> MixtureView<'a> {
        self.view
    }

    /// Scoring parameters.
    pub fn config(&self) -> &StatConfig {
        &self.config
    }

    /// Fill `self.lks` with weighted component likelihoods; returns their sum.
    fn score_components(&mut self, feature: &[f64]) -> MixtureResult<f64> {
        validate_dimension(self.view.vect_size(), feature.len(), "MixtureStat feature")?;
        let view = self.view;
        self.lks.clear();
        let mut total = 0.0;
        for (w, d) in view.iter() {
            let lk = w * d.lk_unchecked(feature);
            self.lks.push(lk);
            total += lk;
        }
        Ok(total)
    }

    /// Mixture likelihood of `feature`, floored at `EPS_LK`.
    ///
    /// With [`TopDistribsAction::Determine`] every component is scored, the
    /// best ones are recorded in the selector and the returned value is the
    /// sum over the retained components only. It is exact when the selector
    /// keeps every component. The excluded mass stays in the selector. With
    /// [`TopDistribsAction::Use`] only the recorded components are scored
    /// against this mixture and the recorded excluded mass is added.
    pub fn compute_lk(
        &mut self,
        feature: &[f64],
        action: TopDistribsAction<'_>,
    ) -> MixtureResult<f64> {
        match action {
            TopDistribsAction::NoAction => Ok(floor_lk(self.score_components(feature)?)),
            TopDistribsAction::Determine(top) => {
                self.score_components(feature)?;
                let kept = top.determine(&self.lks, &self.weights);
                Ok(floor_lk(kept))
            }
            TopDistribsAction::Use(top) => {
                validate_dimension(self.view.vect_size(), feature.len(), "MixtureStat feature")?;
                if !top.is_determined() {
                    return Err(MixtureError::UndefinedState {
                        reason: "top distributions used before any were determined".to_string(),
                    });
                }
                let count = self.view.distrib_count();
                let mut lk = top.non_top_lk();
                for index in top.indices() {
                    validate_index(index, count, "MixtureStat top distribution")?;
                    let distrib = self.view.distrib(index)?;
                    lk += self.weights[index] * distrib.lk_unchecked(feature);
                }
                Ok(floor_lk(lk))
            }
        }
    }

    /// Clamped natural log-likelihood of `feature`; no accumulation.
    pub fn compute_llk(
        &mut self,
        feature: &[f64],
        action: TopDistribsAction<'_>,
    ) -> MixtureResult<f64> {
        let lk = self.compute_lk(feature, action)?;
        Ok(clamp_llk(floored_ln(lk), self.config.min_llk, self.config.max_llk))
    }

    // ---- log-likelihood ----

    /// Zero the accumulated log-likelihood and frame count.
    pub fn reset_llk(&mut self) {
        self.llk = None;
        self.accumulated_llk = 0.0;
        self.llk_frame_count = 0.0;
    }

    /// Score `feature` and add `weight · llk` to the running sum.
    pub fn compute_and_accumulate_llk(
        &mut self,
        feature: &[f64],
        weight: f64,
        action: TopDistribsAction<'_>,
    ) -> MixtureResult<f64> {
        let llk = self.compute_llk(feature, action)?;
        self.llk = Some(llk);
        self.accumulate_llk(llk, weight);
        Ok(llk)
    }

    /// Add an externally computed frame log-likelihood.
    pub fn accumulate_llk(&mut self, llk: f64, weight: f64) {
        self.accumulated_llk += weight * llk;
        self.llk_frame_count += weight;
    }

    /// Log-likelihood of the last scored frame.
    pub fn get_llk(&self) -> MixtureResult<f64> {
        self.llk.ok_or_else(|| MixtureError::EmptyAccumulator {
            statistic: "frame log-likelihood".to_string(),
        })
    }

    /// Weighted sum of accumulated log-likelihoods.
    pub fn get_accumulated_llk(&self) -> MixtureResult<f64> {
        ensure_frames(self.llk_frame_count, "accumulated log-likelihood")?;
        Ok(self.accumulated_llk)
    }

    /// Weighted number of frames accumulated into the log-likelihood.
    pub fn get_accumulated_llk_frame_count(&self) -> f64 {
        self.llk_frame_count
    }

    /// Accumulated log-likelihood divided by the weighted frame count.
    pub fn get_mean_llk(&self) -> MixtureResult<f64> {
        ensure_frames(self.llk_frame_count, "mean log-likelihood")?;
        Ok(self.accumulated_llk / self.llk_frame_count)
    }

    // ---- occupancy ----

    /// Zero the accumulated occupancy vector and frame count.
    pub fn reset_occ(&mut self) {
        self.occ.iter_mut().for_each(|o| *o = 0.0);
        self.accumulated_occ.iter_mut().for_each(|o| *o = 0.0);
        self.occ_frame_count = 0.0;
    }

    /// Compute per-component responsibilities for `feature` and add
    /// `weight · occ` to the accumulated vector. Returns the frame
    /// likelihood.
    pub fn compute_and_accumulate_occ(&mut self, feature: &[f64], weight: f64) -> MixtureResult<f64> {
        let total = self.score_components(feature)?;
        for (c, o) in self.occ.iter_mut().enumerate() {
            *o = if total > 0.0 { self.lks[c] / total } else { 0.0 };
            self.accumulated_occ[c] += weight * *o;
        }
        self.occ_frame_count += weight;
        Ok(floor_lk(total))
    }

    /// Responsibilities of the last frame.
    pub fn get_occ_vect(&self) -> &[f64] {
        &self.occ
    }

    /// Weighted sum of responsibilities.
    pub fn get_accumulated_occ_vect(&self) -> MixtureResult<&[f64]> {
        ensure_frames(self.occ_frame_count, "accumulated occupancy")?;
        Ok(&self.accumulated_occ)
    }

    /// Accumulated responsibilities divided by the weighted frame count.
    pub fn get_mean_occ_vect(&self) -> MixtureResult<Vec<f64>> {
        ensure_frames(self.occ_frame_count, "mean occupancy")?;
        Ok(self
            .accumulated_occ
            .iter()
            .map(|o| o / self.occ_frame_count)
            .collect())
    }

    /// Weighted number of frames accumulated into the occupancy vector.
    pub fn get_occ_frame_count(&self) -> f64 {
        self.occ_frame_count
    }

    // ---- EM ----

    /// Zero the EM sufficient statistics.
    pub fn reset_em(&mut self) {
        self.em = EmAccumulator::zeros(
            self.view.kind(),
            self.view.distrib_count(),
            self.view.vect_size(),
        );
    }

    /// Accumulate the sufficient statistics of `feature` with frame weight
    /// `weight`. Returns the occupancy mass added over all components,
    /// which is `weight` unless the frame likelihood vanished.
    pub fn compute_and_accumulate_em(&mut self, feature: &[f64], weight: f64) -> MixtureResult<f64> {
        let total = self.score_components(feature)?;
        self.em.frame_count += weight;
        if total <= 0.0 {
            return Ok(0.0);
        }

        let mut added = 0.0;
        for c in 0..self.lks.len() {
            let occ = weight * self.lks[c] / total;
            if occ == 0.0 {
                continue;
            }
            self.em.occ[c] += occ;
            for (s, &x) in self.em.mean_sums[c].iter_mut().zip(feature) {
                *s += occ * x;
            }
            self.em.second.accumulate(c, feature, occ);
            added += occ;
        }
        Ok(added)
    }

    /// Weighted number of frames seen by the EM accumulator.
    pub fn get_em_frame_count(&self) -> f64 {
        self.em.frame_count
    }

    /// Per-component occupancy accumulated for EM.
    pub fn get_em_occ_vect(&self) -> &[f64] {
        &self.em.occ
    }

    /// Re-estimated mixture from the EM statistics.
    ///
    /// Component `c` gets mean `Σ occ·x / Σ occ`, covariance
    /// `Σ occ·x² / Σ occ − mean²` (floored at `MIN_COV`) and weight
    /// `Σ occ / frames`. Components that received no occupancy keep their
    /// current parameters with weight 0.
    pub fn get_em(&self) -> MixtureResult<MixtureSnapshot> {
        ensure_frames(self.em.frame_count, "EM statistics")?;
        let vect_size = self.view.vect_size();
        let mut snapshot = MixtureSnapshot::new(self.view.id(), self.view.kind(), vect_size);

        for (c, (_, current)) in self.view.iter().enumerate() {
            let occ = self.em.occ[c];
            let weight = occ / self.em.frame_count;
            if occ <= 0.0 {
                snapshot.add_distrib(current.clone(), 0.0)?;
                continue;
            }
            let mean: Vec<f64> = self.em.mean_sums[c].iter().map(|s| s / occ).collect();
            let distrib = self.estimate_distrib(c, occ, &mean, current)?;
            snapshot.add_distrib(distrib, weight)?;
        }
        Ok(snapshot)
    }

    fn estimate_distrib(
        &self,
        c: usize,
        occ: f64,
        mean: &[f64],
        current: &Distrib,
    ) -> MixtureResult<Distrib> {
        let vect_size = mean.len();
        let raw = match &self.em.second {
            SecondMoments::Diagonal(sums) => {
                let mut raw = RawDistribGD::new(vect_size);
                for i in 0..vect_size {
                    raw.set_mean(mean[i], i)?;
                    raw.set_cov(sums[c][i] / occ - mean[i] * mean[i], i)?;
                }
                RawDistrib::Diagonal(raw)
            }
            SecondMoments::Full(sums) => {
                let mut raw = RawDistribGF::new(vect_size);
                for row in 0..vect_size {
                    raw.set_mean(mean[row], row)?;
                    for col in 0..vect_size {
                        let value = sums[c][(row, col)] / occ - mean[row] * mean[col];
                        raw.set_cov(value, col, row)?;
                    }
                }
                RawDistrib::Full(raw)
            }
        };

        match raw.compute_all() {
            Ok(distrib) => Ok(distrib),
            Err(MixtureError::SingularCovariance { determinant }) => {
                log::warn!(
                    "Component {} of mixture '{}': singular re-estimated covariance \
                     (det = {:.3e}), keeping the previous one",
                    c,
                    self.view.id(),
                    determinant
                );
                let mut kept = current.clone();
                for (i, &m) in mean.iter().enumerate() {
                    kept.set_mean(m, i)?;
                }
                Ok(kept)
            }
            Err(e) => Err(e),
        }
    }

    /// Merge the EM statistics of `other` into this accumulator.
    pub fn add_acc_em(&mut self, other: &MixtureStat<'_>) -> MixtureResult<()> {
        validate_kind(self.view.kind(), other.view.kind())?;
        validate_dimension(self.view.vect_size(), other.view.vect_size(), "MixtureStat::add_acc_em")?;
        validate_dimension(
            self.view.distrib_count(),
            other.view.distrib_count(),
            "MixtureStat::add_acc_em component count",
        )?;

        self.em.second.add(&other.em.second)?;
        for (a, b) in self.em.occ.iter_mut().zip(&other.em.occ) {
            *a += b;
        }
        for (ra, rb) in self.em.mean_sums.iter_mut().zip(&other.em.mean_sums) {
            for (a, b) in ra.iter_mut().zip(rb) {
                *a += b;
            }
        }
        self.em.frame_count += other.em.frame_count;
        Ok(())
    }

    // ---- feature streams ----

    fn check_source<S: FeatureSource + ?Sized>(&self, source: &S) -> MixtureResult<()> {
        validate_dimension(
            self.view.vect_size(),
            source.vect_size(),
            "MixtureStat feature source",
        )
    }

    /// Rewind `source` and accumulate the log-likelihood of every valid
    /// frame with unit weight. Returns the number of frames used.
    pub fn accumulate_llk_from_source<S: FeatureSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> MixtureResult<usize> {
        self.check_source(source)?;
        source.reset();
        let mut used = 0;
        while let Some(feature) = source.read_feature() {
            if feature.valid {
                self.compute_and_accumulate_llk(&feature.data, 1.0, TopDistribsAction::NoAction)?;
                used += 1;
            }
        }
        Ok(used)
    }

    /// Rewind `source` and accumulate EM statistics of every valid frame
    /// with unit weight. Returns the number of frames used.
    pub fn accumulate_em_from_source<S: FeatureSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> MixtureResult<usize> {
        self.check_source(source)?;
        source.reset();
        let mut used = 0;
        while let Some(feature) = source.read_feature() {
            if feature.valid {
                self.compute_and_accumulate_em(&feature.data, 1.0)?;
                used += 1;
            }
        }
        Ok(used)
    }
}

fn ensure_frames(frame_count: f64, statistic: &str) -> MixtureResult<()> {
    if frame_count == 0.0 {
        return Err(MixtureError::EmptyAccumulator {
            statistic: statistic.to_string(),
        });
    }
    Ok(())
}
