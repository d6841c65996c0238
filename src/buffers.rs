//! Reusable per-epoch batch buffers.
//!
//! A [`BatchBuffers`] is allocated once per epoch at the configured batch
//! size and neighbor width, then refilled for every batch. Only the populated
//! prefix is ever exposed, through a borrowed [`BatchView`]. Buffers belong to
//! exactly one epoch generator and are never shared between generators.

use crate::constants::sampler::{DEFAULT_NEIGHBOR_LENGTH, NEIGHBOR_PADDING};
use crate::data::{Batch, NeighborhoodBatch, TripleBatch};
use crate::types::{ItemId, Triple, UserId};

#[derive(Debug)]
pub(crate) struct BatchBuffers {
    capacity: usize,
    len: usize,
    triples: Vec<Triple>,
    neighborhood: Option<NeighborBuffers>,
}

#[derive(Debug)]
struct NeighborBuffers {
    /// Row stride of the neighbor matrices (global max neighbor count, at least 1).
    stride: usize,
    pos: NeighborColumn,
    neg: NeighborColumn,
}

#[derive(Debug)]
struct NeighborColumn {
    entries: Vec<UserId>,
    lengths: Vec<u32>,
    /// Extent of each row written by any previous batch; everything past it is padding.
    written: Vec<u32>,
}

impl NeighborColumn {
    fn new(capacity: usize, stride: usize) -> Self {
        Self {
            entries: vec![NEIGHBOR_PADDING; capacity * stride],
            lengths: vec![DEFAULT_NEIGHBOR_LENGTH; capacity],
            written: vec![0; capacity],
        }
    }

    fn write(&mut self, slot: usize, stride: usize, item: ItemId, neighbors: &[UserId]) {
        let row = &mut self.entries[slot * stride..(slot + 1) * stride];
        let len = if neighbors.is_empty() {
            row[0] = item;
            DEFAULT_NEIGHBOR_LENGTH as usize
        } else {
            row[..neighbors.len()].copy_from_slice(neighbors);
            neighbors.len()
        };
        let previous = self.written[slot] as usize;
        if previous > len {
            row[len..previous].fill(NEIGHBOR_PADDING);
        }
        self.written[slot] = len as u32;
        self.lengths[slot] = len as u32;
    }

    fn reset(&mut self) {
        self.lengths.fill(DEFAULT_NEIGHBOR_LENGTH);
    }

    fn max_len(&self, len: usize) -> usize {
        self.lengths[..len].iter().copied().max().unwrap_or(0) as usize
    }
}

impl BatchBuffers {
    /// Allocate buffers; `max_neighbors` is only used when `with_neighborhood` is set.
    pub(crate) fn new(capacity: usize, with_neighborhood: bool, max_neighbors: usize) -> Self {
        let neighborhood = with_neighborhood.then(|| {
            let stride = max_neighbors.max(1);
            NeighborBuffers {
                stride,
                pos: NeighborColumn::new(capacity, stride),
                neg: NeighborColumn::new(capacity, stride),
            }
        });
        Self {
            capacity,
            len: 0,
            triples: vec![[0; 3]; capacity],
            neighborhood,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub(crate) fn wants_neighbors(&self) -> bool {
        self.neighborhood.is_some()
    }

    /// Write one row; neighbor slices are ignored without neighborhood buffers.
    pub(crate) fn push(
        &mut self,
        triple: Triple,
        pos_neighbors: &[UserId],
        neg_neighbors: &[UserId],
    ) {
        let slot = self.len;
        self.triples[slot] = triple;
        if let Some(neighborhood) = self.neighborhood.as_mut() {
            let stride = neighborhood.stride;
            neighborhood
                .pos
                .write(slot, stride, triple[1], pos_neighbors);
            neighborhood
                .neg
                .write(slot, stride, triple[2], neg_neighbors);
        }
        self.len += 1;
    }

    /// Start the next batch: empty the row cursor and restore default lengths.
    pub(crate) fn reset(&mut self) {
        self.len = 0;
        if let Some(neighborhood) = self.neighborhood.as_mut() {
            neighborhood.pos.reset();
            neighborhood.neg.reset();
        }
    }

    pub(crate) fn view(&self) -> BatchView<'_> {
        let len = self.len;
        let neighborhood = self.neighborhood.as_ref().map(|neighborhood| {
            let width = neighborhood
                .pos
                .max_len(len)
                .max(neighborhood.neg.max_len(len));
            NeighborhoodView {
                pos: ColumnView {
                    entries: &neighborhood.pos.entries,
                    lengths: &neighborhood.pos.lengths[..len],
                    stride: neighborhood.stride,
                    width,
                },
                neg: ColumnView {
                    entries: &neighborhood.neg.entries,
                    lengths: &neighborhood.neg.lengths[..len],
                    stride: neighborhood.stride,
                    width,
                },
            }
        });
        BatchView {
            triples: &self.triples[..len],
            neighborhood,
        }
    }
}

/// Borrowed view over the populated prefix of an epoch's buffers.
///
/// Valid until the epoch produces its next batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchView<'a> {
    triples: &'a [Triple],
    neighborhood: Option<NeighborhoodView<'a>>,
}

/// Neighbor columns of a [`BatchView`], trimmed to the widest row in the batch.
#[derive(Clone, Copy, Debug)]
pub struct NeighborhoodView<'a> {
    pos: ColumnView<'a>,
    neg: ColumnView<'a>,
}

/// One neighbor column (positive or negative side) of a batch.
#[derive(Clone, Copy, Debug)]
pub struct ColumnView<'a> {
    entries: &'a [UserId],
    lengths: &'a [u32],
    stride: usize,
    width: usize,
}

impl<'a> BatchView<'a> {
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> &'a [Triple] {
        self.triples
    }

    pub fn neighborhood(&self) -> Option<NeighborhoodView<'a>> {
        self.neighborhood
    }

    /// Copy the view into an owned batch record.
    pub fn to_batch(&self) -> Batch {
        let triples = TripleBatch {
            rows: self.triples.to_vec(),
        };
        match self.neighborhood {
            None => Batch::Triples(triples),
            Some(neighborhood) => Batch::Neighborhood(NeighborhoodBatch {
                triples,
                pos_neighbors: neighborhood.pos.to_matrix(),
                pos_lengths: neighborhood.pos.lengths.to_vec(),
                neg_neighbors: neighborhood.neg.to_matrix(),
                neg_lengths: neighborhood.neg.lengths.to_vec(),
                width: neighborhood.width(),
            }),
        }
    }
}

impl<'a> NeighborhoodView<'a> {
    /// Columns kept per row: the longest neighbor list in this batch.
    pub fn width(&self) -> usize {
        self.pos.width
    }

    pub fn positives(&self) -> ColumnView<'a> {
        self.pos
    }

    pub fn negatives(&self) -> ColumnView<'a> {
        self.neg
    }
}

impl<'a> ColumnView<'a> {
    pub fn lengths(&self) -> &'a [u32] {
        self.lengths
    }

    /// Padded row `idx`, `width` entries long.
    pub fn row(&self, idx: usize) -> &'a [UserId] {
        let start = idx * self.stride;
        &self.entries[start..start + self.width]
    }

    /// Neighbors of row `idx` without padding.
    pub fn neighbors(&self, idx: usize) -> &'a [UserId] {
        &self.row(idx)[..self.lengths[idx] as usize]
    }

    fn to_matrix(&self) -> Vec<UserId> {
        let mut matrix = Vec::with_capacity(self.lengths.len() * self.width);
        for idx in 0..self.lengths.len() {
            matrix.extend_from_slice(self.row(idx));
        }
        matrix
    }
}
