use crate::constants::sampler::{DEFAULT_BATCH_SIZE, DEFAULT_NEG_PER_POS, DEFAULT_SAMPLER_SEED};
use crate::constants::store::{DEFAULT_EVALUATION_NEGATIVES, DEFAULT_STORE_SEED};
use crate::errors::SamplerError;
use crate::types::UserId;

/// Controls how a snapshot is turned into an [`InteractionStore`](crate::InteractionStore).
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Drop training pairs whose user id is `>= limit`.
    ///
    /// Neighborhood structures are rebuilt from the remaining pairs only.
    pub limit: Option<UserId>,
    /// Negatives drawn for every user that has held-out evaluation targets.
    pub evaluation_negatives: usize,
    /// RNG seed for evaluation negative sampling.
    pub seed: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            limit: None,
            evaluation_negatives: DEFAULT_EVALUATION_NEGATIVES,
            seed: DEFAULT_STORE_SEED,
        }
    }
}

/// Shape of one epoch of batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochConfig {
    /// Rows per batch; only the final batch of an epoch may be smaller.
    pub batch_size: usize,
    /// Attach positive/negative item neighbor lists to every row.
    pub with_neighborhood: bool,
    /// Negatives drawn per training pair. Also the stride period of the
    /// popularity-aware policy.
    pub neg_per_pos: usize,
    /// Interleave popularity-aware hard negatives on odd draw indices.
    pub use_popularity: bool,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            with_neighborhood: false,
            neg_per_pos: DEFAULT_NEG_PER_POS,
            use_popularity: false,
        }
    }
}

impl EpochConfig {
    /// Reject shapes that can never produce a batch.
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.batch_size == 0 {
            return Err(SamplerError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.neg_per_pos == 0 {
            return Err(SamplerError::Configuration(
                "neg_per_pos must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Total rows one epoch emits for `train_size` pairs.
    pub fn rows_per_epoch(&self, train_size: usize) -> usize {
        train_size.saturating_mul(self.neg_per_pos)
    }
}

/// Top-level sampler configuration.
#[derive(Clone, Debug)]
pub struct SamplerConfig {
    /// RNG seed that controls shuffles and negative draws.
    pub seed: u64,
    /// Epoch shape used by [`BatchSampler::next_epoch`](crate::BatchSampler::next_epoch).
    pub epoch: EpochConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SAMPLER_SEED,
            epoch: EpochConfig::default(),
        }
    }
}
