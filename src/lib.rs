//! # muhalo
//!
//! Displaced-track halo features and generator-truth labels for reconstructed
//! muons.
//!
//! For every muon in a collision event, `muhalo` clusters the surrounding
//! candidate tracks by the 3-D distance from the muon's production point,
//! accumulating track counts and summed transverse momentum under eleven
//! displacement thresholds, and evaluates a charge-weighted momentum-ratio
//! curve over the full halo. Each truth-matched muon is also classified by a
//! bounded walk of its generator ancestry (prompt, pileup-like, or
//! photon-descendant), and all features are collected into per-event,
//! category-partitioned output buffers ready for a columnar sink.
//!
//! ```
//! use muhalo::{data::test_event, EventFeatureAggregator, MemorySink};
//!
//! let event = test_event();
//! let mut sink = MemorySink::default();
//! let mut aggregator = EventFeatureAggregator::new();
//! aggregator.process_event(&event, &mut sink).unwrap();
//! assert_eq!(sink.events.len(), 1);
//! ```
#![warn(clippy::perf, clippy::style)]

use thiserror::Error;

/// Displacement clustering and the charge-weighted ratio curve.
pub mod cluster;
/// Framework-facing configuration surface.
pub mod config;
/// Event-owned input collections (muons, candidate tracks, vertices).
pub mod data;
/// Per-muon feature rows, per-event output buffers, and the aggregator.
pub mod features;
/// Generator-truth particles, ancestry walks, and origin classification.
pub mod truth;
/// Utility functions, enums, and vector types.
pub mod utils;

pub use crate::cluster::{
    charge_weighted_curve, cluster_tracks, HaloCluster, HaloTrack, RatioCurve, ThresholdBucket,
    DISTANCE_THRESHOLDS_MM, N_RATIO_EXPONENTS,
};
pub use crate::config::ProducerConfig;
pub use crate::data::{BestTrack, CandidateTrack, EventData, Muon, Vertex};
pub use crate::features::io::{FeatureSink, MemorySink, ParquetFeatureWriter};
pub use crate::features::{
    process_events, EventFeatureAggregator, EventFeatures, MuonFeatureRecord,
};
pub use crate::truth::{StatusFlags, TruthCollection, TruthLabel, TruthParticle, TruthRef};
pub use crate::utils::enums::MuonCategory;
pub use crate::utils::vectors::Vec3;

/// The floating-point type used throughout the crate (`f64` unless the `f32`
/// feature is enabled).
#[cfg(feature = "f32")]
pub type Float = f32;
/// The floating-point type used throughout the crate (`f64` unless the `f32`
/// feature is enabled).
#[cfg(not(feature = "f32"))]
pub type Float = f64;

/// Result alias used by all `muhalo` methods.
pub type MuhaloResult<T> = Result<T, MuhaloError>;

/// The error type used by all `muhalo` internal methods
#[derive(Error, Debug)]
pub enum MuhaloError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`parquet::errors::ParquetError`].
    #[error("Parquet Error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
    /// An alias for [`arrow::error::ArrowError`].
    #[error("Arrow Error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// A mother-chain walk ran past the hop bound, which indicates malformed
    /// (cyclic or absurdly deep) truth input rather than expected physics.
    #[error("Ancestry walk from truth particle {start} exceeded {max_hops} hops")]
    AncestryDepthExceeded {
        /// Arena index the walk started from
        start: usize,
        /// The hop bound that was reached
        max_hops: usize,
    },
}
