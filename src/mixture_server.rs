//! # Mixture Pool
//!
//! [`MixtureServer`] owns every distribution and mixture created for one
//! modelling session. Mixtures reference their components by
//! [`DistribHandle`], so a distribution can be shared by several mixtures;
//! the pool keeps a reference count per distribution and only reclaims the
//! ones nobody points at.
//!
//! Handles are dense registry indices. Deleting mixtures, or unused
//! distributions, compacts the registries: entries after the removed range
//! move down and every stored handle is remapped accordingly. Handles held
//! by the caller across a deletion must be re-resolved (for mixtures,
//! [`MixtureServer::mixture_by_id`] is the stable way to do that).

use crate::{
    config::MixtureConfig,
    distrib::{Distrib, DistribKind},
    errors::{
        validate_dimension, validate_index, validate_kind, validate_weight, MixtureError,
        MixtureResult,
    },
    mixture::{DuplicationPolicy, Mixture, MixtureComponents, MixtureSnapshot, MixtureView},
    random_init::ParamRng,
};
use std::collections::BTreeMap;

/// Index of a distribution in its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistribHandle(usize);

impl DistribHandle {
    /// Handle addressing registry slot `index`.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Registry slot.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a mixture in its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MixtureHandle(usize);

impl MixtureHandle {
    /// Handle addressing registry slot `index`.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Registry slot.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct DistribSlot {
    distrib: Distrib,
    ref_count: usize,
}

/// Pool of distributions and mixtures sharing one vector size.
#[derive(Debug)]
pub struct MixtureServer {
    config: MixtureConfig,
    distribs: Vec<DistribSlot>,
    mixtures: Vec<Mixture>,
    ids: BTreeMap<String, usize>,
    vect_size: Option<usize>,
    last_mixture_id: u64,
    rng: ParamRng,
}

impl Default for MixtureServer {
    fn default() -> Self {
        let config = MixtureConfig::default();
        let rng = ParamRng::from_seed_option(config.seed);
        Self {
            config,
            distribs: Vec::new(),
            mixtures: Vec::new(),
            ids: BTreeMap::new(),
            vect_size: None,
            last_mixture_id: 0,
            rng,
        }
    }
}

impl MixtureServer {
    /// Empty pool using `config` for default kinds, sizes and seeding.
    pub fn new(config: MixtureConfig) -> MixtureResult<Self> {
        config.validate()?;
        let rng = ParamRng::from_seed_option(config.seed);
        Ok(Self {
            config,
            rng,
            ..Self::default()
        })
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &MixtureConfig {
        &self.config
    }

    /// Drop every mixture and distribution and restart id generation.
    pub fn reset(&mut self) {
        log::debug!(
            "Resetting mixture pool ({} mixtures, {} distributions)",
            self.mixtures.len(),
            self.distribs.len()
        );
        self.distribs.clear();
        self.mixtures.clear();
        self.ids.clear();
        self.vect_size = None;
        self.last_mixture_id = 0;
    }

    fn is_empty(&self) -> bool {
        self.distribs.is_empty() && self.mixtures.is_empty()
    }

    /// Vector size shared by everything in the pool.
    ///
    /// Undefined while the pool is empty.
    pub fn vect_size(&self) -> MixtureResult<usize> {
        match self.vect_size {
            Some(size) if !self.is_empty() => Ok(size),
            _ => Err(MixtureError::UndefinedState {
                reason: "vector size of an empty mixture pool".to_string(),
            }),
        }
    }

    /// Fix the pool dimension on first use, reject any other size afterwards.
    fn claim_vect_size(&mut self, vect_size: usize) -> MixtureResult<()> {
        if vect_size == 0 {
            return Err(MixtureError::InvalidParameter {
                parameter: "vect_size".to_string(),
                value: 0.0,
                constraint: "a positive vector size".to_string(),
            });
        }
        match self.vect_size {
            Some(fixed) if !self.is_empty() => {
                validate_dimension(fixed, vect_size, "MixtureServer vector size")
            }
            _ => {
                self.vect_size = Some(vect_size);
                Ok(())
            }
        }
    }

    /// Size used by creations that do not name one.
    fn default_vect_size(&self) -> MixtureResult<usize> {
        match self.vect_size {
            Some(size) if !self.is_empty() => Ok(size),
            _ => self.config.vect_size.ok_or_else(|| MixtureError::UndefinedState {
                reason: "no vector size configured and the pool is empty".to_string(),
            }),
        }
    }

    // ---- distributions ----

    /// Create a randomly initialised distribution (reference count 0).
    pub fn create_distrib(
        &mut self,
        kind: DistribKind,
        vect_size: usize,
    ) -> MixtureResult<DistribHandle> {
        self.claim_vect_size(vect_size)?;
        let distrib = Distrib::random(kind, vect_size, &mut self.rng)?;
        Ok(self.push_distrib(distrib))
    }

    /// Create a distribution of the pool (or configured) vector size.
    pub fn create_distrib_default(&mut self, kind: DistribKind) -> MixtureResult<DistribHandle> {
        let vect_size = self.default_vect_size()?;
        self.create_distrib(kind, vect_size)
    }

    /// Register an existing distribution (reference count 0).
    pub fn insert_distrib(&mut self, distrib: Distrib) -> MixtureResult<DistribHandle> {
        self.claim_vect_size(distrib.vect_size())?;
        Ok(self.push_distrib(distrib))
    }

    /// Copy distribution `handle` into a new, unreferenced slot.
    pub fn duplicate_distrib(&mut self, handle: DistribHandle) -> MixtureResult<DistribHandle> {
        let copy = self.distrib(handle)?.clone();
        Ok(self.push_distrib(copy))
    }

    fn push_distrib(&mut self, distrib: Distrib) -> DistribHandle {
        self.distribs.push(DistribSlot {
            distrib,
            ref_count: 0,
        });
        DistribHandle(self.distribs.len() - 1)
    }

    fn check_distrib(&self, handle: DistribHandle) -> MixtureResult<()> {
        validate_index(handle.0, self.distribs.len(), "MixtureServer distribution handle")
    }

    /// Distribution behind `handle`.
    pub fn distrib(&self, handle: DistribHandle) -> MixtureResult<&Distrib> {
        self.check_distrib(handle)?;
        Ok(&self.distribs[handle.0].distrib)
    }

    /// Mutable distribution behind `handle`. Changes are seen by every
    /// mixture sharing it.
    pub fn distrib_mut(&mut self, handle: DistribHandle) -> MixtureResult<&mut Distrib> {
        self.check_distrib(handle)?;
        Ok(&mut self.distribs[handle.0].distrib)
    }

    /// Handles stored in mixtures are always valid for their pool.
    pub(crate) fn distrib_unchecked(&self, handle: DistribHandle) -> &Distrib {
        &self.distribs[handle.0].distrib
    }

    /// Number of mixture components referring to `handle`.
    pub fn distrib_ref_count(&self, handle: DistribHandle) -> MixtureResult<usize> {
        self.check_distrib(handle)?;
        Ok(self.distribs[handle.0].ref_count)
    }

    /// Number of distributions in the pool.
    pub fn distrib_count(&self) -> usize {
        self.distribs.len()
    }

    /// Remove every distribution with a zero reference count and remap
    /// the handles stored in mixtures. Returns the number removed.
    pub fn delete_unused_distribs(&mut self) -> usize {
        let mut remap = vec![None; self.distribs.len()];
        let mut kept = Vec::with_capacity(self.distribs.len());
        for (old, slot) in std::mem::take(&mut self.distribs).into_iter().enumerate() {
            if slot.ref_count > 0 {
                remap[old] = Some(kept.len());
                kept.push(slot);
            }
        }
        let removed = remap.len() - kept.len();
        self.distribs = kept;

        for mixture in &mut self.mixtures {
            for c in mixture.components_mut() {
                // referenced slots always survive
                if let Some(new) = remap[c.distrib.0] {
                    c.distrib = DistribHandle(new);
                }
            }
        }
        if removed > 0 {
            log::debug!("Deleted {} unused distributions", removed);
        }
        removed
    }

    /// Point every component at the first pool distribution with equal
    /// parameters. Returns the number of components re-pointed; the
    /// abandoned duplicates stay in the pool until
    /// [`delete_unused_distribs`](Self::delete_unused_distribs).
    pub fn share_identical_distribs(&mut self) -> usize {
        let canonical: Vec<usize> = (0..self.distribs.len())
            .map(|i| {
                (0..i)
                    .find(|&j| self.distribs[j].distrib == self.distribs[i].distrib)
                    .unwrap_or(i)
            })
            .collect();

        let mut moved = 0;
        for mixture in &mut self.mixtures {
            for c in mixture.components_mut() {
                let target = canonical[c.distrib.0];
                if target != c.distrib.0 {
                    self.distribs[c.distrib.0].ref_count -= 1;
                    self.distribs[target].ref_count += 1;
                    c.distrib = DistribHandle(target);
                    moved += 1;
                }
            }
        }
        if moved > 0 {
            log::debug!("Shared {} identical mixture components", moved);
        }
        moved
    }

    // ---- mixtures ----

    fn next_default_id(&mut self) -> String {
        loop {
            self.last_mixture_id += 1;
            let id = format!("#{}", self.last_mixture_id);
            if !self.ids.contains_key(&id) {
                return id;
            }
        }
    }

    fn next_duplicate_id(&mut self, base: &str) -> String {
        loop {
            self.last_mixture_id += 1;
            let id = format!("{} #{}", base, self.last_mixture_id);
            if !self.ids.contains_key(&id) {
                return id;
            }
        }
    }

    fn push_mixture(&mut self, mixture: Mixture) -> MixtureHandle {
        let index = self.mixtures.len();
        self.ids.insert(mixture.id().to_string(), index);
        self.mixtures.push(mixture);
        MixtureHandle(index)
    }

    fn build_mixture(
        &mut self,
        id: String,
        vect_size: usize,
        distrib_count: usize,
        kind: DistribKind,
    ) -> MixtureResult<MixtureHandle> {
        if self.ids.contains_key(&id) {
            return Err(MixtureError::DuplicateId { id });
        }
        self.claim_vect_size(vect_size)?;

        let mut mixture = Mixture::new(id, kind, vect_size);
        let mut distribs = Vec::with_capacity(distrib_count);
        for _ in 0..distrib_count {
            distribs.push(Distrib::random(kind, vect_size, &mut self.rng)?);
        }
        for distrib in distribs {
            let handle = self.push_distrib(distrib);
            self.distribs[handle.0].ref_count += 1;
            mixture.push(handle, 0.0);
        }
        mixture.equalize_weights();

        log::debug!(
            "Created {} mixture '{}' ({} x {})",
            kind,
            mixture.id(),
            distrib_count,
            vect_size
        );
        Ok(self.push_mixture(mixture))
    }

    /// Create a mixture of `distrib_count` fresh random distributions with
    /// equal weights and a generated `"#N"` identifier.
    pub fn create_mixture(
        &mut self,
        distrib_count: usize,
        kind: DistribKind,
    ) -> MixtureResult<MixtureHandle> {
        let vect_size = self.default_vect_size()?;
        let id = self.next_default_id();
        self.build_mixture(id, vect_size, distrib_count, kind)
    }

    /// Create a mixture with an explicit identifier and vector size.
    pub fn create_mixture_with_id(
        &mut self,
        id: &str,
        vect_size: usize,
        distrib_count: usize,
        kind: DistribKind,
    ) -> MixtureResult<MixtureHandle> {
        self.build_mixture(id.to_string(), vect_size, distrib_count, kind)
    }

    /// Create a mixture using the configured component count and kind.
    pub fn create_default_mixture(&mut self) -> MixtureResult<MixtureHandle> {
        self.create_mixture(self.config.distrib_count, self.config.distrib_kind)
    }

    /// Copy mixture `handle` under a fresh `"<id> #N"` identifier.
    pub fn duplicate_mixture(
        &mut self,
        handle: MixtureHandle,
        policy: DuplicationPolicy,
    ) -> MixtureResult<MixtureHandle> {
        let source = self.mixture(handle)?.clone();
        let id = self.next_duplicate_id(source.id());

        let mut copy = Mixture::new(id, source.kind(), source.vect_size());
        for c in source.components() {
            let target = match policy {
                DuplicationPolicy::DuplicateDistribs => {
                    let distrib = self.distribs[c.distrib.0].distrib.clone();
                    self.push_distrib(distrib)
                }
                DuplicationPolicy::ShareDistribs => c.distrib,
            };
            self.distribs[target.0].ref_count += 1;
            copy.push(target, c.weight);
        }

        log::debug!(
            "Duplicated mixture '{}' as '{}' ({:?})",
            source.id(),
            copy.id(),
            policy
        );
        Ok(self.push_mixture(copy))
    }

    fn check_mixture(&self, handle: MixtureHandle) -> MixtureResult<()> {
        validate_index(handle.0, self.mixtures.len(), "MixtureServer mixture handle")
    }

    /// Mixture behind `handle`.
    pub fn mixture(&self, handle: MixtureHandle) -> MixtureResult<&Mixture> {
        self.check_mixture(handle)?;
        Ok(&self.mixtures[handle.0])
    }

    /// Mutable mixture behind `handle`, for weight edits.
    pub fn mixture_mut(&mut self, handle: MixtureHandle) -> MixtureResult<&mut Mixture> {
        self.check_mixture(handle)?;
        Ok(&mut self.mixtures[handle.0])
    }

    /// Handle of the mixture at registry position `index`.
    pub fn mixture_handle(&self, index: usize) -> MixtureResult<MixtureHandle> {
        validate_index(index, self.mixtures.len(), "MixtureServer::mixture_handle")?;
        Ok(MixtureHandle(index))
    }

    /// Look a mixture up by identifier.
    pub fn mixture_by_id(&self, id: &str) -> MixtureResult<MixtureHandle> {
        self.ids
            .get(id)
            .map(|&index| MixtureHandle(index))
            .ok_or_else(|| MixtureError::MixtureNotFound { id: id.to_string() })
    }

    /// Number of mixtures in the pool.
    pub fn mixture_count(&self) -> usize {
        self.mixtures.len()
    }

    /// Rename a mixture. Renaming to its current id is a no-op.
    pub fn set_mixture_id(&mut self, handle: MixtureHandle, id: &str) -> MixtureResult<()> {
        self.check_mixture(handle)?;
        if self.mixtures[handle.0].id() == id {
            return Ok(());
        }
        if self.ids.contains_key(id) {
            return Err(MixtureError::DuplicateId { id: id.to_string() });
        }
        let old = self.mixtures[handle.0].id().to_string();
        self.ids.remove(&old);
        self.ids.insert(id.to_string(), handle.0);
        self.mixtures[handle.0].set_id(id.to_string());
        Ok(())
    }

    /// Read view pairing a mixture with this pool.
    pub fn view(&self, handle: MixtureHandle) -> MixtureResult<MixtureView<'_>> {
        let mixture = self.mixture(handle)?;
        Ok(MixtureView::new(self, mixture, handle))
    }

    /// Detached copy of a mixture and its distributions.
    pub fn snapshot(&self, handle: MixtureHandle) -> MixtureResult<MixtureSnapshot> {
        let mixture = self.mixture(handle)?;
        let mut snapshot = MixtureSnapshot::new(mixture.id(), mixture.kind(), mixture.vect_size());
        for c in mixture.components() {
            snapshot.add_distrib(self.distribs[c.distrib.0].distrib.clone(), c.weight)?;
        }
        Ok(snapshot)
    }

    /// Add a detached mixture to the pool as a new mixture with fresh,
    /// unshared distributions. The snapshot id is kept.
    pub fn import_mixture(&mut self, snapshot: &MixtureSnapshot) -> MixtureResult<MixtureHandle> {
        if self.ids.contains_key(snapshot.id()) {
            return Err(MixtureError::DuplicateId {
                id: snapshot.id().to_string(),
            });
        }
        validate_snapshot(snapshot, "MixtureServer::import_mixture")?;
        self.claim_vect_size(snapshot.vect_size())?;

        let mut mixture = Mixture::new(snapshot.id().to_string(), snapshot.kind(), snapshot.vect_size());
        for (weight, distrib) in snapshot.iter() {
            let handle = self.push_distrib(distrib.clone());
            self.distribs[handle.0].ref_count += 1;
            mixture.push(handle, weight);
        }
        log::debug!(
            "Imported mixture '{}' ({} components)",
            mixture.id(),
            mixture.distrib_count()
        );
        Ok(self.push_mixture(mixture))
    }

    /// Copy weights and parameters of `snapshot` into the existing mixture
    /// `handle`. Its distributions are updated in-place, so the change is
    /// seen by every mixture sharing them.
    pub fn assign_mixture(
        &mut self,
        handle: MixtureHandle,
        snapshot: &MixtureSnapshot,
    ) -> MixtureResult<()> {
        let mixture = self.mixture(handle)?;
        validate_kind(mixture.kind(), snapshot.kind())?;
        validate_dimension(mixture.vect_size(), snapshot.vect_size(), "MixtureServer::assign_mixture")?;
        validate_dimension(
            mixture.distrib_count(),
            snapshot.distrib_count(),
            "MixtureServer::assign_mixture component count",
        )?;
        validate_snapshot(snapshot, "MixtureServer::assign_mixture")?;

        let handles: Vec<DistribHandle> = mixture.components().iter().map(|c| c.distrib).collect();
        for (i, (weight, distrib)) in snapshot.iter().enumerate() {
            self.distribs[handles[i].0].distrib.assign_from(distrib)?;
            self.mixtures[handle.0].set_weight(weight, i)?;
        }
        Ok(())
    }

    /// Append distribution `distrib` to mixture `handle`.
    pub fn add_distrib_to_mixture(
        &mut self,
        handle: MixtureHandle,
        distrib: DistribHandle,
        weight: f64,
    ) -> MixtureResult<()> {
        self.check_compatible(handle, distrib)?;
        validate_weight(weight)?;
        self.mixtures[handle.0].push(distrib, weight);
        self.distribs[distrib.0].ref_count += 1;
        Ok(())
    }

    /// Replace component `index` of mixture `handle` with `distrib`.
    pub fn set_distrib_to_mixture(
        &mut self,
        handle: MixtureHandle,
        distrib: DistribHandle,
        index: usize,
    ) -> MixtureResult<()> {
        self.check_compatible(handle, distrib)?;
        validate_index(
            index,
            self.mixtures[handle.0].distrib_count(),
            "MixtureServer::set_distrib_to_mixture",
        )?;
        self.distribs[distrib.0].ref_count += 1;
        let old = self.mixtures[handle.0].replace(index, distrib);
        self.distribs[old.0].ref_count -= 1;
        Ok(())
    }

    /// Drop component `index` of mixture `handle`. The distribution stays
    /// in the pool; its handle is returned.
    pub fn remove_distrib_from_mixture(
        &mut self,
        handle: MixtureHandle,
        index: usize,
    ) -> MixtureResult<DistribHandle> {
        self.check_mixture(handle)?;
        validate_index(
            index,
            self.mixtures[handle.0].distrib_count(),
            "MixtureServer::remove_distrib_from_mixture",
        )?;
        let removed = self.mixtures[handle.0].remove(index);
        self.distribs[removed.distrib.0].ref_count -= 1;
        Ok(removed.distrib)
    }

    fn check_compatible(&self, handle: MixtureHandle, distrib: DistribHandle) -> MixtureResult<()> {
        let mixture = self.mixture(handle)?;
        let d = self.distrib(distrib)?;
        validate_kind(mixture.kind(), d.kind())?;
        validate_dimension(mixture.vect_size(), d.vect_size(), "MixtureServer mixture member")
    }

    /// Delete the mixtures at registry positions `first..=last`, releasing
    /// their references. Distributions are not reclaimed here; call
    /// [`delete_unused_distribs`](Self::delete_unused_distribs).
    pub fn delete_mixtures(&mut self, first: usize, last: usize) -> MixtureResult<()> {
        validate_index(last, self.mixtures.len(), "MixtureServer::delete_mixtures")?;
        if first > last {
            return Err(MixtureError::IndexOutOfBounds {
                index: first,
                limit: last + 1,
                context: "MixtureServer::delete_mixtures (first > last)".to_string(),
            });
        }

        for mixture in self.mixtures.drain(first..=last) {
            for c in mixture.components() {
                self.distribs[c.distrib.0].ref_count -= 1;
            }
            log::debug!("Deleted mixture '{}'", mixture.id());
        }
        self.ids = self
            .mixtures
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id().to_string(), i))
            .collect();
        Ok(())
    }

    /// Delete a single mixture.
    pub fn delete_mixture(&mut self, handle: MixtureHandle) -> MixtureResult<()> {
        self.delete_mixtures(handle.0, handle.0)
    }

    /// Value equality of two pooled mixtures, identifiers ignored.
    pub fn mixtures_equal(&self, a: MixtureHandle, b: MixtureHandle) -> MixtureResult<bool> {
        Ok(self.view(a)? == self.view(b)?)
    }
}

/// Every component of `snapshot` must match its kind and size.
fn validate_snapshot(snapshot: &MixtureSnapshot, context: &str) -> MixtureResult<()> {
    for (_, distrib) in snapshot.iter() {
        validate_kind(snapshot.kind(), distrib.kind())?;
        validate_dimension(snapshot.vect_size(), distrib.vect_size(), context)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> MixtureServer {
        MixtureServer::new(MixtureConfig::test()).unwrap()
    }

    #[test]
    fn test_create_mixture_defaults() {
        let mut pool = pool();
        let m = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let mixture = pool.mixture(m).unwrap();
        assert_eq!(mixture.id(), "#1");
        assert_eq!(mixture.distrib_count(), 3);
        for c in mixture.components() {
            assert!((c.weight - 1.0 / 3.0).abs() < 1e-15);
            assert_eq!(pool.distrib_ref_count(c.distrib).unwrap(), 1);
        }
        assert_eq!(pool.distrib_count(), 3);
        assert_eq!(pool.vect_size().unwrap(), 2);
    }

    #[test]
    fn test_generated_ids_skip_taken_names() {
        let mut pool = pool();
        pool.create_mixture_with_id("#1", 2, 1, DistribKind::Diagonal).unwrap();
        let m = pool.create_mixture(1, DistribKind::Diagonal).unwrap();
        assert_eq!(pool.mixture(m).unwrap().id(), "#2");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut pool = pool();
        pool.create_mixture_with_id("spk", 2, 1, DistribKind::Diagonal).unwrap();
        assert!(matches!(
            pool.create_mixture_with_id("spk", 2, 1, DistribKind::Diagonal),
            Err(MixtureError::DuplicateId { .. })
        ));

        let other = pool.create_mixture(1, DistribKind::Diagonal).unwrap();
        assert!(matches!(
            pool.set_mixture_id(other, "spk"),
            Err(MixtureError::DuplicateId { .. })
        ));
        pool.set_mixture_id(other, "other").unwrap();
        pool.set_mixture_id(other, "other").unwrap();
        assert_eq!(pool.mixture_by_id("other").unwrap(), other);
        assert!(matches!(
            pool.mixture_by_id("missing"),
            Err(MixtureError::MixtureNotFound { .. })
        ));
    }

    #[test]
    fn test_vect_size_is_fixed_for_the_pool() {
        let mut pool = MixtureServer::default();
        assert!(matches!(pool.vect_size(), Err(MixtureError::UndefinedState { .. })));
        assert!(pool.create_mixture(1, DistribKind::Diagonal).is_err());

        pool.create_distrib(DistribKind::Diagonal, 4).unwrap();
        assert_eq!(pool.vect_size().unwrap(), 4);
        assert!(matches!(
            pool.create_distrib(DistribKind::Full, 3),
            Err(MixtureError::DimensionMismatch { .. })
        ));
        pool.create_mixture(2, DistribKind::Full).unwrap();
    }

    #[test]
    fn test_sharing_duplicate_keeps_handles() {
        let mut pool = pool();
        let m = pool.create_mixture(2, DistribKind::Diagonal).unwrap();
        let copy = pool.duplicate_mixture(m, DuplicationPolicy::ShareDistribs).unwrap();
        assert_eq!(pool.mixture(copy).unwrap().id(), "#1 #2");
        assert_eq!(pool.distrib_count(), 2);
        assert_eq!(
            pool.mixture(m).unwrap().components(),
            pool.mixture(copy).unwrap().components()
        );
        for c in pool.mixture(m).unwrap().components() {
            assert_eq!(pool.distrib_ref_count(c.distrib).unwrap(), 2);
        }
        assert!(pool.mixtures_equal(m, copy).unwrap());
    }

    #[test]
    fn test_deep_duplicate_is_independent() {
        let mut pool = pool();
        let m = pool.create_mixture(2, DistribKind::Diagonal).unwrap();
        let copy = pool.duplicate_mixture(m, DuplicationPolicy::DuplicateDistribs).unwrap();
        assert_eq!(pool.distrib_count(), 4);
        assert!(pool.mixtures_equal(m, copy).unwrap());

        let h = pool.mixture(copy).unwrap().distrib_handle(0).unwrap();
        pool.distrib_mut(h).unwrap().set_mean(5.0, 0).unwrap();
        assert!(!pool.mixtures_equal(m, copy).unwrap());
    }

    #[test]
    fn test_set_distrib_index_out_of_range() {
        let mut pool = pool();
        let m = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let d = pool.create_distrib(DistribKind::Diagonal, 2).unwrap();
        assert!(matches!(
            pool.set_distrib_to_mixture(m, d, 3),
            Err(MixtureError::IndexOutOfBounds { index: 3, limit: 3, .. })
        ));

        let old = pool.mixture(m).unwrap().distrib_handle(1).unwrap();
        pool.set_distrib_to_mixture(m, d, 1).unwrap();
        assert_eq!(pool.distrib_ref_count(d).unwrap(), 1);
        assert_eq!(pool.distrib_ref_count(old).unwrap(), 0);
    }

    #[test]
    fn test_add_distrib_checks_kind_and_size() {
        let mut pool = pool();
        let m = pool.create_mixture(1, DistribKind::Diagonal).unwrap();
        let full = pool.create_distrib(DistribKind::Full, 2).unwrap();
        assert!(matches!(
            pool.add_distrib_to_mixture(m, full, 0.5),
            Err(MixtureError::TypeMismatch { .. })
        ));
        let gd = pool.create_distrib(DistribKind::Diagonal, 2).unwrap();
        pool.add_distrib_to_mixture(m, gd, 0.5).unwrap();
        assert_eq!(pool.mixture(m).unwrap().distrib_count(), 2);
        assert_eq!(pool.distrib_ref_count(gd).unwrap(), 1);

        let removed = pool.remove_distrib_from_mixture(m, 1).unwrap();
        assert_eq!(removed, gd);
        assert_eq!(pool.distrib_ref_count(gd).unwrap(), 0);
    }

    #[test]
    fn test_delete_and_compact() {
        let mut pool = pool();
        let a = pool.create_mixture(2, DistribKind::Diagonal).unwrap();
        let b = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let b_snapshot = pool.snapshot(b).unwrap();

        pool.delete_mixture(a).unwrap();
        assert_eq!(pool.mixture_count(), 1);
        assert_eq!(pool.distrib_count(), 5);
        assert_eq!(pool.delete_unused_distribs(), 2);
        assert_eq!(pool.distrib_count(), 3);

        let b = pool.mixture_by_id("#2").unwrap();
        assert_eq!(b.index(), 0);
        assert!(pool.view(b).unwrap() == b_snapshot);
        for c in pool.mixture(b).unwrap().components() {
            assert_eq!(pool.distrib_ref_count(c.distrib).unwrap(), 1);
        }
    }

    #[test]
    fn test_delete_range_validation() {
        let mut pool = pool();
        pool.create_mixture(1, DistribKind::Diagonal).unwrap();
        assert!(pool.delete_mixtures(0, 1).is_err());
        pool.delete_mixtures(0, 0).unwrap();
        assert_eq!(pool.delete_unused_distribs(), 1);
        assert!(pool.vect_size().is_err());
    }

    #[test]
    fn test_share_identical_distribs() {
        let mut pool = pool();
        let m = pool.create_mixture(2, DistribKind::Diagonal).unwrap();
        let copy = pool.duplicate_mixture(m, DuplicationPolicy::DuplicateDistribs).unwrap();
        assert_eq!(pool.share_identical_distribs(), 2);
        assert_eq!(pool.delete_unused_distribs(), 2);
        assert_eq!(
            pool.mixture(m).unwrap().components(),
            pool.mixture(copy).unwrap().components()
        );
    }

    #[test]
    fn test_import_and_assign() {
        let mut pool = pool();
        let m = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let mut snapshot = pool.snapshot(m).unwrap();
        assert!(matches!(
            pool.import_mixture(&snapshot),
            Err(MixtureError::DuplicateId { .. })
        ));

        snapshot.set_id("copy");
        snapshot.set_weight(0.5, 0).unwrap();
        snapshot.distrib_mut(1).unwrap().set_mean(2.0, 1).unwrap();
        let imported = pool.import_mixture(&snapshot).unwrap();
        assert!(pool.view(imported).unwrap() == snapshot);

        let shared = pool.duplicate_mixture(m, DuplicationPolicy::ShareDistribs).unwrap();
        pool.assign_mixture(m, &snapshot).unwrap();
        assert!(pool.mixtures_equal(m, imported).unwrap());
        // shared distributions follow, weights do not
        let shared_mean = pool.view(shared).unwrap().distrib(1).unwrap().mean(1).unwrap();
        assert_eq!(shared_mean, 2.0);
        assert!(!pool.mixtures_equal(m, shared).unwrap());
    }

    #[test]
    fn test_mismatched_snapshot_leaves_pool_untouched() {
        let mut pool = pool();
        let m = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let before = pool.snapshot(m).unwrap();

        let mut snapshot = before.clone();
        snapshot.set_id("edited");
        snapshot.distrib_mut(0).unwrap().set_mean(5.0, 0).unwrap();
        let mut rng = ParamRng::with_seed(8);
        *snapshot.distrib_mut(2).unwrap() = Distrib::random(DistribKind::Diagonal, 3, &mut rng).unwrap();

        assert!(matches!(
            pool.assign_mixture(m, &snapshot),
            Err(MixtureError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
        assert!(pool.view(m).unwrap() == before);

        assert!(pool.import_mixture(&snapshot).is_err());
        assert_eq!(pool.mixture_count(), 1);
        assert_eq!(pool.distrib_count(), 3);
    }

    #[test]
    fn test_insert_distrib_checks_size() {
        let mut pool = pool();
        let mut rng = ParamRng::with_seed(4);
        let h = pool
            .insert_distrib(Distrib::random(DistribKind::Full, 2, &mut rng).unwrap())
            .unwrap();
        assert_eq!(pool.distrib_ref_count(h).unwrap(), 0);
        let wide = Distrib::random(DistribKind::Full, 3, &mut rng).unwrap();
        assert!(pool.insert_distrib(wide).is_err());
        assert_eq!(pool.delete_unused_distribs(), 1);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut pool = pool();
        pool.create_mixture(1, DistribKind::Diagonal).unwrap();
        pool.create_mixture(1, DistribKind::Diagonal).unwrap();
        pool.reset();
        assert_eq!(pool.mixture_count(), 0);
        assert_eq!(pool.distrib_count(), 0);
        let m = pool.create_default_mixture().unwrap();
        assert_eq!(pool.mixture(m).unwrap().id(), "#1");
        assert_eq!(pool.mixture(m).unwrap().distrib_count(), 3);
    }
}
