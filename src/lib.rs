//! # Gaussian Mixture Statistics
//!
//! Gaussian mixture modelling and scoring for frame-based speaker
//! recognition: diagonal and full covariance Gaussians, weighted mixtures
//! sharing their components through a reference-counted pool, and
//! accumulators for log-likelihood, occupancy and EM re-estimation.
//!
//! ## Key Features
//!
//! - **Two Gaussian kinds**: diagonal ([`DistribGD`]) and full ([`DistribGF`]) covariance behind one [`Distrib`] sum type
//! - **Raw and computed forms**: parameters are edited on [`RawDistrib`] and only a computed distribution can be scored
//! - **Shared components**: a [`MixtureServer`] pool keeps components by handle and tracks their reference counts
//! - **Numeric floors**: covariances, determinants and likelihoods are clamped instead of failing mid-batch
//! - **Top-N scoring**: [`TopDistribs`] lets many candidate models reuse one model's best components per frame
//! - **Partitioned EM**: accumulators merge with [`MixtureStat::add_acc_em`], optionally on rayon (`parallel` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use gmm_stat::{DistribKind, MixtureConfig, MixtureServer, StatServer, TopDistribsAction};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MixtureConfig::test();
//!     let mut pool = MixtureServer::new(config.clone())?;
//!     let world = pool.create_mixture(4, DistribKind::Diagonal)?;
//!     let stat_server = StatServer::from_mixture_config(&config);
//!
//!     let frames: Vec<Vec<f64>> = (0..50)
//!         .map(|i| vec![(i as f64 * 0.3).sin(), (i as f64 * 0.7).cos()])
//!         .collect();
//!
//!     // Five EM iterations
//!     for _ in 0..5 {
//!         let estimate = {
//!             let mut stat = stat_server.create_mixture_stat(pool.view(world)?);
//!             for f in &frames {
//!                 stat.compute_and_accumulate_em(f, 1.0)?;
//!             }
//!             stat.get_em()?
//!         };
//!         pool.assign_mixture(world, &estimate)?;
//!     }
//!
//!     let mut stat = stat_server.create_mixture_stat(pool.view(world)?);
//!     for f in &frames {
//!         stat.compute_and_accumulate_llk(f, 1.0, TopDistribsAction::NoAction)?;
//!     }
//!     println!("mean llk = {:.4}", stat.get_mean_llk()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Leaves first: [`distrib_gd`] and [`distrib_gf`] implement the two
//! Gaussian kinds, [`mixture`] groups them with weights, [`mixture_server`]
//! owns the storage, and [`mixture_stat`] scores feature vectors against a
//! read-only [`MixtureView`]. [`StatServer`] holds the scoring
//! configuration and the shared top-N selector.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod linear_algebra;
pub mod math_utils;
pub mod random_init;

// Distributions and mixtures
pub mod distrib;
pub mod distrib_gd;
pub mod distrib_gf;
pub mod mixture;
pub mod mixture_server;

// Scoring
pub mod feature;
pub mod mixture_stat;
pub mod stat_server;
pub mod top_distribs;

// Re-export main types
pub use config::{ConfigBuilder, MixtureConfig, StatConfig};
pub use errors::{MixtureError, MixtureResult};

pub use distrib::{Distrib, DistribKind, RawDistrib};
pub use distrib_gd::{DistribGD, RawDistribGD};
pub use distrib_gf::{DistribGF, RawDistribGF};
pub use mixture::{
    components_equal, Component, DuplicationPolicy, Mixture, MixtureComponents, MixtureSnapshot,
    MixtureView,
};
pub use mixture_server::{DistribHandle, MixtureHandle, MixtureServer};

pub use feature::{Feature, FeatureBuffer, FeatureSource};
pub use mixture_stat::MixtureStat;
pub use stat_server::StatServer;
pub use top_distribs::{TopDistribs, TopDistribsAction};

pub use math_utils::constants::{EPS_LK, MIN_COV};
pub use random_init::ParamRng;
