//! Top-N component selection for approximate scoring.
//!
//! Scoring one frame against many candidate models is dominated by the
//! per-component Gaussian evaluations. [`TopDistribs`] records, for one
//! reference mixture and one frame, the `K` components with the highest
//! weighted likelihood plus the summed mass of the others. Candidate models
//! sharing the component layout then rescore only those `K` components.

/// Per-frame instruction for top-N handling in
/// [`MixtureStat`](crate::MixtureStat) scoring calls.
#[derive(Debug)]
pub enum TopDistribsAction<'t> {
    /// Score every component
    NoAction,
    /// Score every component and record the best ones in the selector
    Determine(&'t mut TopDistribs),
    /// Score only the components recorded in the selector
    Use(&'t TopDistribs),
}

/// Bounded list of `(component index, weighted likelihood)` pairs sorted by
/// decreasing likelihood, plus the aggregate of the excluded components.
#[derive(Debug, Clone, PartialEq)]
pub struct TopDistribs {
    capacity: usize,
    entries: Vec<(usize, f64)>,
    non_top_lk: f64,
    non_top_weight: f64,
    determined: bool,
}

impl TopDistribs {
    /// Empty selector keeping at most `capacity` components.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            non_top_lk: 0.0,
            non_top_weight: 0.0,
            determined: false,
        }
    }

    /// Maximum number of retained components.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained components for the last determined frame.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a frame has been determined since construction or [`clear`](Self::clear).
    pub fn is_determined(&self) -> bool {
        self.determined
    }

    /// Retained `(index, weighted likelihood)` pairs, best first.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Component indices, best first.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|&(i, _)| i)
    }

    /// Summed weighted likelihood of the excluded components.
    pub fn non_top_lk(&self) -> f64 {
        self.non_top_lk
    }

    /// Summed weight of the excluded components.
    pub fn non_top_weight(&self) -> f64 {
        self.non_top_weight
    }

    /// Forget the last determined frame.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.non_top_lk = 0.0;
        self.non_top_weight = 0.0;
        self.determined = false;
    }

    /// Select the best `min(capacity, n)` components given per-component
    /// weighted likelihoods and weights. Returns the retained likelihood sum.
    ///
    /// Ties keep the lower component index first.
    pub(crate) fn determine(&mut self, weighted_lks: &[f64], weights: &[f64]) -> f64 {
        let mut order: Vec<usize> = (0..weighted_lks.len()).collect();
        order.sort_by(|&a, &b| weighted_lks[b].total_cmp(&weighted_lks[a]));

        let keep = self.capacity.min(order.len());
        self.entries.clear();
        self.entries
            .extend(order[..keep].iter().map(|&i| (i, weighted_lks[i])));
        self.non_top_lk = order[keep..].iter().map(|&i| weighted_lks[i]).sum();
        self.non_top_weight = order[keep..].iter().map(|&i| weights[i]).sum();
        self.determined = true;

        self.entries.iter().map(|&(_, lk)| lk).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_determine_keeps_best() {
        let mut top = TopDistribs::new(2);
        let lks = [0.1, 0.5, 0.05, 0.3];
        let weights = [0.25; 4];
        let kept = top.determine(&lks, &weights);
        assert_approx_eq!(kept, 0.8, 1e-15);
        assert_eq!(top.indices().collect::<Vec<_>>(), vec![1, 3]);
        assert_approx_eq!(top.non_top_lk(), 0.15, 1e-15);
        assert_approx_eq!(top.non_top_weight(), 0.5, 1e-15);
        assert!(top.is_determined());
    }

    #[test]
    fn test_capacity_larger_than_mixture() {
        let mut top = TopDistribs::new(10);
        top.determine(&[0.2, 0.2, 0.1], &[0.3, 0.3, 0.4]);
        assert_eq!(top.len(), 3);
        assert_eq!(top.indices().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(top.non_top_lk(), 0.0);
        assert_eq!(top.non_top_weight(), 0.0);

        top.clear();
        assert!(!top.is_determined());
        assert!(top.is_empty());
    }
}
