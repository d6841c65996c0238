use serde::{Deserialize, Serialize};

pub use crate::types::{ItemId, Triple, UserId};

/// One `(user, positive item)` training interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainPair {
    pub user: UserId,
    pub item: ItemId,
}

/// Held-out targets for one user plus the negatives sampled against them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCase {
    /// Items from the held-out evaluation split.
    pub held_out: Vec<ItemId>,
    /// Uniformly drawn items that are not positive for the user.
    pub negatives: Vec<ItemId>,
}

/// Batch of `(user, positive, negative)` rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleBatch {
    pub rows: Vec<Triple>,
}

impl TripleBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// User column.
    pub fn users(&self) -> impl Iterator<Item = UserId> + '_ {
        self.rows.iter().map(|row| row[0])
    }

    /// Positive item column.
    pub fn positives(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.rows.iter().map(|row| row[1])
    }

    /// Negative item column.
    pub fn negatives(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.rows.iter().map(|row| row[2])
    }
}

/// Triples plus per-row neighbor lists for the positive and negative items.
///
/// Neighbor matrices are row-major with `width` columns, where `width` is the
/// longest neighbor list used by any row of this batch. Slots past a row's
/// length hold the padding value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodBatch {
    pub triples: TripleBatch,
    pub pos_neighbors: Vec<UserId>,
    pub pos_lengths: Vec<u32>,
    pub neg_neighbors: Vec<UserId>,
    pub neg_lengths: Vec<u32>,
    pub width: usize,
}

impl NeighborhoodBatch {
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Padded neighbor row for the positive item of row `idx`.
    pub fn pos_row(&self, idx: usize) -> &[UserId] {
        &self.pos_neighbors[idx * self.width..(idx + 1) * self.width]
    }

    /// Padded neighbor row for the negative item of row `idx`.
    pub fn neg_row(&self, idx: usize) -> &[UserId] {
        &self.neg_neighbors[idx * self.width..(idx + 1) * self.width]
    }
}

/// One batch record produced by an epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Batch {
    Triples(TripleBatch),
    Neighborhood(NeighborhoodBatch),
}

impl Batch {
    pub fn len(&self) -> usize {
        self.triples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples().is_empty()
    }

    pub fn triples(&self) -> &TripleBatch {
        match self {
            Batch::Triples(triples) => triples,
            Batch::Neighborhood(batch) => &batch.triples,
        }
    }

    pub fn neighborhood(&self) -> Option<&NeighborhoodBatch> {
        match self {
            Batch::Triples(_) => None,
            Batch::Neighborhood(batch) => Some(batch),
        }
    }
}
