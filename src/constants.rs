/// Split names recognized inside snapshot preference maps.
pub mod splits {
    /// Main training interactions.
    pub const SPLIT_TRAIN: &str = "train";
    /// Validation users' fold-in interactions (usable for training).
    pub const SPLIT_VALIDATION_INPUT: &str = "vad_tr";
    /// Test users' fold-in interactions (usable for training).
    pub const SPLIT_TEST_INPUT: &str = "test_tr";
    /// Held-out evaluation targets; never emitted as training pairs.
    pub const SPLIT_TEST_TARGET: &str = "test_te";
    /// Splits whose items become `(user, item)` training pairs.
    pub const TRAINING_SPLITS: [&str; 3] = [SPLIT_TRAIN, SPLIT_VALIDATION_INPUT, SPLIT_TEST_INPUT];
}

/// Constants used while building the interaction store.
pub mod store {
    /// Negatives drawn per held-out evaluation user.
    pub const DEFAULT_EVALUATION_NEGATIVES: usize = 100;
    /// Default seed for evaluation negative sampling.
    pub const DEFAULT_STORE_SEED: u64 = 42;
    /// Offset mixed into the store seed before drawing evaluation negatives.
    pub const EVALUATION_SEED_OFFSET: u64 = 0xE7A1_5EED;
    /// Label used in load errors for snapshots that did not come from a file.
    pub const IN_MEMORY_SNAPSHOT: &str = "<memory>";
}

/// Constants used by negative sampling and batch assembly.
pub mod sampler {
    /// Rejected uniform draws tolerated before switching to candidate enumeration.
    pub const REJECTION_RETRY_LIMIT: usize = 64;
    /// Offset mixed into the sampler seed for deterministic epoch variation.
    pub const EPOCH_SEED_OFFSET: u64 = 0xB4C3_5EED;
    /// Neighbor-list length reported for items without recorded users.
    pub const DEFAULT_NEIGHBOR_LENGTH: u32 = 1;
    /// Value stored in neighbor slots past a row's length.
    pub const NEIGHBOR_PADDING: u32 = 0;
    /// Default rows per batch.
    pub const DEFAULT_BATCH_SIZE: usize = 256;
    /// Default negatives drawn per training pair.
    pub const DEFAULT_NEG_PER_POS: usize = 4;
    /// Default sampler seed.
    pub const DEFAULT_SAMPLER_SEED: u64 = 42;
    /// Failure reason emitted when an epoch prefetch worker stops unexpectedly.
    pub const PREFETCHER_STOPPED_REASON: &str = "epoch prefetcher stopped";
}

/// Constants used by snapshot encoding.
pub mod snapshot {
    /// Prefix marker for bitcode-encoded snapshots.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Version tag following the bitcode prefix.
    pub const SNAPSHOT_RECORD_VERSION: u8 = 1;
    /// File names probed, in order, when a snapshot path is a directory.
    pub const SNAPSHOT_FILENAMES: [&str; 2] = ["data.bin", "data.json"];
}
