//! Weighted mixtures of Gaussian distributions.
//!
//! A [`Mixture`] stored in a pool refers to its components by
//! [`DistribHandle`]; several mixtures may point at the same distribution.
//! [`MixtureView`] pairs a mixture with its pool for read access to the
//! component parameters, and [`MixtureSnapshot`] is a detached mixture that
//! owns its distributions (EM estimates, serialization, cross-pool copies).
//!
//! Equality between any two of these compares kind, component count,
//! weights and component parameters. Identifiers are not compared.

use crate::{
    distrib::{Distrib, DistribKind},
    errors::{validate_dimension, validate_index, validate_kind, validate_weight, MixtureResult},
    math_utils::float_ops::floor_lk,
    mixture_server::{DistribHandle, MixtureHandle, MixtureServer},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What happens to the member distributions when a mixture is duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicationPolicy {
    /// Deep-copy every member; the copy is re-estimated independently
    DuplicateDistribs,
    /// Point the copy at the same distributions
    ShareDistribs,
}

/// One weighted member of a pooled mixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    /// Pool handle of the distribution
    pub distrib: DistribHandle,
    /// Mixture weight
    pub weight: f64,
}

/// Pooled mixture: identifier, kind, dimension and weighted handles.
#[derive(Debug, Clone)]
pub struct Mixture {
    id: String,
    kind: DistribKind,
    vect_size: usize,
    components: Vec<Component>,
}

impl Mixture {
    pub(crate) fn new(id: String, kind: DistribKind, vect_size: usize) -> Self {
        Self {
            id,
            kind,
            vect_size,
            components: Vec::new(),
        }
    }

    /// Identifier, unique within the owning pool.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Kind shared by every member.
    pub fn kind(&self) -> DistribKind {
        self.kind
    }

    /// Vector dimension shared by every member.
    pub fn vect_size(&self) -> usize {
        self.vect_size
    }

    /// Number of components.
    pub fn distrib_count(&self) -> usize {
        self.components.len()
    }

    /// Weighted handles in component order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Weight of component `index`.
    pub fn weight(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.components.len(), "Mixture::weight")?;
        Ok(self.components[index].weight)
    }

    /// Set the weight of component `index`.
    pub fn set_weight(&mut self, weight: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.components.len(), "Mixture::set_weight")?;
        validate_weight(weight)?;
        self.components[index].weight = weight;
        Ok(())
    }

    /// Set every weight to `1 / distrib_count`.
    pub fn equalize_weights(&mut self) {
        let n = self.components.len();
        if n == 0 {
            return;
        }
        let w = 1.0 / n as f64;
        for c in &mut self.components {
            c.weight = w;
        }
    }

    /// Handle of component `index`.
    pub fn distrib_handle(&self, index: usize) -> MixtureResult<DistribHandle> {
        validate_index(index, self.components.len(), "Mixture::distrib_handle")?;
        Ok(self.components[index].distrib)
    }

    pub(crate) fn push(&mut self, distrib: DistribHandle, weight: f64) {
        self.components.push(Component { distrib, weight });
    }

    /// Swap in a new handle at `index`, returning the replaced one.
    pub(crate) fn replace(&mut self, index: usize, distrib: DistribHandle) -> DistribHandle {
        std::mem::replace(&mut self.components[index].distrib, distrib)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Component {
        self.components.remove(index)
    }

    pub(crate) fn components_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }
}

/// Read access to the weights and distributions of a mixture.
pub trait MixtureComponents {
    /// Kind shared by every member.
    fn kind(&self) -> DistribKind;

    /// Vector dimension.
    fn vect_size(&self) -> usize;

    /// Number of components.
    fn distrib_count(&self) -> usize;

    /// Weight of component `index`.
    fn weight(&self, index: usize) -> MixtureResult<f64>;

    /// Distribution of component `index`.
    fn distrib(&self, index: usize) -> MixtureResult<&Distrib>;

    /// Mixture likelihood `Σ_c w_c · lk_c(feature)`, floored at `EPS_LK`.
    fn compute_lk(&self, feature: &[f64]) -> MixtureResult<f64> {
        validate_dimension(self.vect_size(), feature.len(), "MixtureComponents::compute_lk")?;
        let mut lk = 0.0;
        for c in 0..self.distrib_count() {
            lk += self.weight(c)? * self.distrib(c)?.lk_unchecked(feature);
        }
        Ok(floor_lk(lk))
    }
}

/// Value equality of two mixtures, ignoring identifiers.
pub fn components_equal<A, B>(a: &A, b: &B) -> bool
where
    A: MixtureComponents + ?Sized,
    B: MixtureComponents + ?Sized,
{
    if a.kind() != b.kind() || a.distrib_count() != b.distrib_count() {
        return false;
    }
    (0..a.distrib_count()).all(|i| {
        matches!((a.weight(i), b.weight(i)), (Ok(wa), Ok(wb)) if wa == wb)
            && matches!((a.distrib(i), b.distrib(i)), (Ok(da), Ok(db)) if da == db)
    })
}

/// A pooled mixture together with the pool that owns its distributions.
#[derive(Debug, Clone, Copy)]
pub struct MixtureView<'a> {
    pool: &'a MixtureServer,
    mixture: &'a Mixture,
    handle: MixtureHandle,
}

impl<'a> MixtureView<'a> {
    pub(crate) fn new(pool: &'a MixtureServer, mixture: &'a Mixture, handle: MixtureHandle) -> Self {
        Self {
            pool,
            mixture,
            handle,
        }
    }

    /// Pool handle of the mixture.
    pub fn handle(&self) -> MixtureHandle {
        self.handle
    }

    /// Identifier of the mixture.
    pub fn id(&self) -> &'a str {
        self.mixture.id()
    }

    /// Underlying pooled mixture.
    pub fn mixture(&self) -> &'a Mixture {
        self.mixture
    }

    /// Owning pool.
    pub fn pool(&self) -> &'a MixtureServer {
        self.pool
    }

    /// `(weight, distribution)` pairs in component order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &'a Distrib)> + 'a {
        let pool = self.pool;
        let mixture = self.mixture;
        mixture
            .components()
            .iter()
            .map(move |c| (c.weight, pool.distrib_unchecked(c.distrib)))
    }
}

impl MixtureComponents for MixtureView<'_> {
    fn kind(&self) -> DistribKind {
        self.mixture.kind()
    }

    fn vect_size(&self) -> usize {
        self.mixture.vect_size()
    }

    fn distrib_count(&self) -> usize {
        self.mixture.distrib_count()
    }

    fn weight(&self, index: usize) -> MixtureResult<f64> {
        self.mixture.weight(index)
    }

    fn distrib(&self, index: usize) -> MixtureResult<&Distrib> {
        let handle = self.mixture.distrib_handle(index)?;
        Ok(self.pool.distrib_unchecked(handle))
    }
}

impl PartialEq for MixtureView<'_> {
    fn eq(&self, other: &Self) -> bool {
        components_equal(self, other)
    }
}

impl PartialEq<MixtureSnapshot> for MixtureView<'_> {
    fn eq(&self, other: &MixtureSnapshot) -> bool {
        components_equal(self, other)
    }
}

/// Detached mixture owning its distributions.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "MixtureSnapshotRecord"))]
pub struct MixtureSnapshot {
    id: String,
    kind: DistribKind,
    vect_size: usize,
    weights: Vec<f64>,
    distribs: Vec<Distrib>,
}

// loaded snapshots are rebuilt through `add_distrib`
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct MixtureSnapshotRecord {
    id: String,
    kind: DistribKind,
    vect_size: usize,
    weights: Vec<f64>,
    distribs: Vec<Distrib>,
}

#[cfg(feature = "serde")]
impl TryFrom<MixtureSnapshotRecord> for MixtureSnapshot {
    type Error = crate::errors::MixtureError;

    fn try_from(record: MixtureSnapshotRecord) -> MixtureResult<Self> {
        validate_dimension(
            record.weights.len(),
            record.distribs.len(),
            "MixtureSnapshot weights and distributions",
        )?;
        let mut snapshot = MixtureSnapshot::new(record.id, record.kind, record.vect_size);
        for (distrib, weight) in record.distribs.into_iter().zip(record.weights) {
            snapshot.add_distrib(distrib, weight)?;
        }
        Ok(snapshot)
    }
}

impl MixtureSnapshot {
    /// Empty mixture of the given kind and size.
    pub fn new(id: impl Into<String>, kind: DistribKind, vect_size: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            vect_size,
            weights: Vec::new(),
            distribs: Vec::new(),
        }
    }

    /// Identifier carried with the snapshot.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Append a component; kind and size must match the snapshot.
    pub fn add_distrib(&mut self, distrib: Distrib, weight: f64) -> MixtureResult<()> {
        validate_kind(self.kind, distrib.kind())?;
        validate_dimension(self.vect_size, distrib.vect_size(), "MixtureSnapshot::add_distrib")?;
        validate_weight(weight)?;
        self.weights.push(weight);
        self.distribs.push(distrib);
        Ok(())
    }

    /// Set the weight of component `index`.
    pub fn set_weight(&mut self, weight: f64, index: usize) -> MixtureResult<()> {
        validate_index(index, self.weights.len(), "MixtureSnapshot::set_weight")?;
        validate_weight(weight)?;
        self.weights[index] = weight;
        Ok(())
    }

    /// Set every weight to `1 / distrib_count`.
    pub fn equalize_weights(&mut self) {
        let n = self.weights.len();
        if n > 0 {
            self.weights.iter_mut().for_each(|w| *w = 1.0 / n as f64);
        }
    }

    /// Mutable distribution of component `index`.
    pub fn distrib_mut(&mut self, index: usize) -> MixtureResult<&mut Distrib> {
        validate_index(index, self.distribs.len(), "MixtureSnapshot::distrib_mut")?;
        Ok(&mut self.distribs[index])
    }

    /// Weights in component order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `(weight, distribution)` pairs in component order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &Distrib)> + '_ {
        self.weights.iter().copied().zip(self.distribs.iter())
    }
}

impl MixtureComponents for MixtureSnapshot {
    fn kind(&self) -> DistribKind {
        self.kind
    }

    fn vect_size(&self) -> usize {
        self.vect_size
    }

    fn distrib_count(&self) -> usize {
        self.distribs.len()
    }

    fn weight(&self, index: usize) -> MixtureResult<f64> {
        validate_index(index, self.weights.len(), "MixtureSnapshot::weight")?;
        Ok(self.weights[index])
    }

    fn distrib(&self, index: usize) -> MixtureResult<&Distrib> {
        validate_index(index, self.distribs.len(), "MixtureSnapshot::distrib")?;
        Ok(&self.distribs[index])
    }
}

impl PartialEq for MixtureSnapshot {
    fn eq(&self, other: &Self) -> bool {
        components_equal(self, other)
    }
}

impl PartialEq<MixtureView<'_>> for MixtureSnapshot {
    fn eq(&self, other: &MixtureView<'_>) -> bool {
        components_equal(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distrib::RawDistrib, errors::MixtureError, random_init::ParamRng};
    use assert_approx_eq::assert_approx_eq;

    fn snapshot(id: &str, seed: u64) -> MixtureSnapshot {
        let mut rng = ParamRng::with_seed(seed);
        let mut s = MixtureSnapshot::new(id, DistribKind::Diagonal, 2);
        for w in [0.1, 0.2, 0.7] {
            let d = Distrib::random(DistribKind::Diagonal, 2, &mut rng).unwrap();
            s.add_distrib(d, w).unwrap();
        }
        s
    }

    #[test]
    fn test_equality_ignores_id() {
        let a = snapshot("spk_a", 5);
        let b = snapshot("spk_b", 5);
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, snapshot("spk_a", 6));
    }

    #[test]
    fn test_equality_checks_weights() {
        let a = snapshot("x", 5);
        let mut b = a.clone();
        b.set_weight(0.3, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_add_distrib_rejects_wrong_kind_and_size() {
        let mut s = MixtureSnapshot::new("x", DistribKind::Diagonal, 2);
        let full = RawDistrib::new(DistribKind::Full, 2).compute_all().unwrap();
        assert!(matches!(
            s.add_distrib(full, 1.0),
            Err(MixtureError::TypeMismatch { .. })
        ));
        let wide = RawDistrib::new(DistribKind::Diagonal, 3).compute_all().unwrap();
        assert!(matches!(
            s.add_distrib(wide, 1.0),
            Err(MixtureError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_compute_lk_is_weighted_sum() {
        let s = snapshot("x", 9);
        let f = [0.3, -0.2];
        let expected: f64 = s.iter().map(|(w, d)| w * d.compute_lk(&f).unwrap()).sum();
        assert_approx_eq!(s.compute_lk(&f).unwrap(), expected, 1e-15);
        assert!(s.compute_lk(&[0.0]).is_err());
    }

    #[test]
    fn test_equalize_weights() {
        let mut s = snapshot("x", 3);
        s.equalize_weights();
        for &w in s.weights() {
            assert_approx_eq!(w, 1.0 / 3.0, 1e-15);
        }
    }
}
