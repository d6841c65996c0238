#![doc = include_str!("../README.md")]

/// Per-epoch batch buffers and borrowed batch views.
pub mod buffers;
/// Store and sampler configuration types.
pub mod config;
/// Centralized constants used across the store, sampler, and snapshot codec.
pub mod constants;
/// Training pair, evaluation, and batch record types.
pub mod data;
/// Reusable example runners shared by downstream crates.
pub mod example_apps;
/// Epoch size and buffer footprint estimation helpers.
pub mod heuristics;
/// Aggregate metrics helpers.
pub mod metrics;
mod rng;
/// Negative sampling, epoch generation, and background prefetching.
pub mod sampler;
/// Snapshot file format and persistence helpers.
pub mod snapshot;
/// Immutable interaction store built from a snapshot.
pub mod store;
/// Shared type aliases.
pub mod types;

mod errors;

pub use buffers::{BatchView, ColumnView, NeighborhoodView};
pub use config::{EpochConfig, SamplerConfig, StoreConfig};
pub use data::{Batch, EvaluationCase, NeighborhoodBatch, TrainPair, TripleBatch};
pub use errors::SamplerError;
pub use metrics::EpochStats;
pub use sampler::{BatchSampler, EpochBatches, EpochPrefetcher, stride_index};
pub use snapshot::Snapshot;
pub use store::InteractionStore;
pub use types::{ItemId, SplitName, ThresholdName, Triple, UserId};
