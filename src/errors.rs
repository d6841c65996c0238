use std::io;

use thiserror::Error;

use crate::types::{ItemId, UserId};

/// Error type for snapshot loading, sampling, and configuration failures.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("failed to load snapshot '{snapshot}': {reason}")]
    DataLoad { snapshot: String, reason: String },
    #[error(
        "user {user} has {positives} positive items out of {items}; no negative item can be sampled"
    )]
    ExhaustedSamplingSpace {
        user: UserId,
        positives: usize,
        items: u32,
    },
    #[error("sampling invariant violated: {0}")]
    SamplingInvariantViolation(String),
    #[error("user id {user} is out of range (user count {user_count})")]
    UnknownUser { user: UserId, user_count: u32 },
    #[error("item id {item} is out of range (item count {item_count})")]
    UnknownItem { item: ItemId, item_count: u32 },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
