//! Scoring context shared by the accumulators of one session.
//!
//! [`StatServer`] holds the scoring configuration and the top-N selector
//! scratch space, and hands out [`MixtureStat`]s bound to pooled mixtures.
//! The selector is lent to a scoring call through
//! [`TopDistribsAction`](crate::TopDistribsAction); concurrent workers each
//! need their own server or selector.

use crate::{
    config::{MixtureConfig, StatConfig},
    errors::{MixtureError, MixtureResult},
    mixture::MixtureView,
    mixture_stat::MixtureStat,
    top_distribs::TopDistribs,
};

/// Scoring configuration plus the shared top-N selector.
#[derive(Debug, Clone)]
pub struct StatServer {
    config: StatConfig,
    top: TopDistribs,
}

impl Default for StatServer {
    fn default() -> Self {
        Self::new(StatConfig::default())
    }
}

impl StatServer {
    /// Server sizing its selector from `config.top_distribs_count`.
    pub fn new(config: StatConfig) -> Self {
        Self {
            top: TopDistribs::new(config.top_distribs_count),
            config,
        }
    }

    /// Server using the scoring part of a pool configuration.
    pub fn from_mixture_config(config: &MixtureConfig) -> Self {
        Self::new(config.stat_config())
    }

    /// Scoring configuration.
    pub fn config(&self) -> &StatConfig {
        &self.config
    }

    /// Fresh accumulator for `view`.
    pub fn create_mixture_stat<'a>(&self, view: MixtureView<'a>) -> MixtureStat<'a> {
        MixtureStat::new(view, self.config)
    }

    /// Shared selector.
    pub fn top_distribs(&self) -> &TopDistribs {
        &self.top
    }

    /// Shared selector, for [`TopDistribsAction::Determine`](crate::TopDistribsAction::Determine).
    pub fn top_distribs_mut(&mut self) -> &mut TopDistribs {
        &mut self.top
    }

    /// Forget the last determined frame.
    pub fn reset_top_distribs(&mut self) {
        self.top.clear();
    }

    /// Accumulate EM statistics for `frames` in partitions of
    /// `partition_size`, one accumulator per partition, merged with
    /// [`MixtureStat::add_acc_em`]. Partitions run on the rayon pool when
    /// the `parallel` feature is enabled.
    pub fn accumulate_em_partitioned<'a>(
        &self,
        view: MixtureView<'a>,
        frames: &[Vec<f64>],
        partition_size: usize,
    ) -> MixtureResult<MixtureStat<'a>> {
        if partition_size == 0 {
            return Err(MixtureError::InvalidParameter {
                parameter: "partition_size".to_string(),
                value: 0.0,
                constraint: "at least one frame per partition".to_string(),
            });
        }

        let accumulate = |part: &[Vec<f64>]| -> MixtureResult<MixtureStat<'a>> {
            let mut stat = self.create_mixture_stat(view);
            for feature in part {
                stat.compute_and_accumulate_em(feature, 1.0)?;
            }
            Ok(stat)
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            return frames.par_chunks(partition_size).map(accumulate).try_reduce(
                || self.create_mixture_stat(view),
                |mut total, partial| {
                    total.add_acc_em(&partial)?;
                    Ok(total)
                },
            );
        }

        #[cfg(not(feature = "parallel"))]
        {
            let mut total = self.create_mixture_stat(view);
            for part in frames.chunks(partition_size) {
                total.add_acc_em(&accumulate(part)?)?;
            }
            Ok(total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distrib::DistribKind, mixture_server::MixtureServer, top_distribs::TopDistribsAction};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_selector_sized_from_config() {
        let server = StatServer::from_mixture_config(&MixtureConfig::test());
        assert_eq!(server.top_distribs().capacity(), 10);
    }

    #[test]
    fn test_partitioned_em_matches_sequential() {
        let config = MixtureConfig::test();
        let mut pool = MixtureServer::new(config.clone()).unwrap();
        let m = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let view = pool.view(m).unwrap();
        let server = StatServer::from_mixture_config(&config);

        let frames: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![(i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()])
            .collect();
        let mut sequential = server.create_mixture_stat(view);
        for f in &frames {
            sequential.compute_and_accumulate_em(f, 1.0).unwrap();
        }
        let partitioned = server.accumulate_em_partitioned(view, &frames, 6).unwrap();

        assert_approx_eq!(partitioned.get_em_frame_count(), 20.0, 1e-12);
        let a = sequential.get_em().unwrap();
        let b = partitioned.get_em().unwrap();
        assert_eq!(b.weights().len(), 3);
        for ((wa, da), (wb, db)) in a.iter().zip(b.iter()) {
            assert_approx_eq!(wa, wb, 1e-10);
            let (da, db) = (da.as_diagonal().unwrap(), db.as_diagonal().unwrap());
            for i in 0..2 {
                assert_approx_eq!(da.mean(i).unwrap(), db.mean(i).unwrap(), 1e-10);
                assert_approx_eq!(da.cov(i).unwrap(), db.cov(i).unwrap(), 1e-10);
            }
        }
        assert!(server.accumulate_em_partitioned(view, &frames, 0).is_err());
    }

    #[test]
    fn test_reset_top_distribs() {
        let config = MixtureConfig::test();
        let mut pool = MixtureServer::new(config.clone()).unwrap();
        let m = pool.create_mixture(3, DistribKind::Diagonal).unwrap();
        let mut server = StatServer::from_mixture_config(&config);
        let mut stat = MixtureStat::new(pool.view(m).unwrap(), *server.config());
        stat.compute_llk(&[0.0, 0.0], TopDistribsAction::Determine(server.top_distribs_mut()))
            .unwrap();
        assert!(server.top_distribs().is_determined());
        server.reset_top_distribs();
        assert!(!server.top_distribs().is_determined());
    }
}
