use rand::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use crate::buffers::{BatchBuffers, BatchView};
use crate::config::{EpochConfig, SamplerConfig};
use crate::constants::sampler::{
    EPOCH_SEED_OFFSET, PREFETCHER_STOPPED_REASON, REJECTION_RETRY_LIMIT,
};
use crate::data::{Batch, TrainPair};
use crate::errors::SamplerError;
use crate::metrics::EpochStats;
use crate::rng::DeterministicRng;
use crate::store::InteractionStore;
use crate::types::{ItemId, UserId};

/// Negative sampling policies over one interaction store.
///
/// Each instance owns its RNG, so independent samplers never share mutable
/// state.
#[derive(Debug, Clone)]
struct NegativeSampler<'a> {
    store: &'a InteractionStore,
    rng: DeterministicRng,
}

impl<'a> NegativeSampler<'a> {
    fn uniform(&mut self, user: UserId) -> Result<ItemId, SamplerError> {
        let store = self.store;
        let positives = store.checked_positive_items(user)?;
        let item_count = store.item_count();
        let exhausted = || SamplerError::ExhaustedSamplingSpace {
            user,
            positives: positives.len(),
            items: item_count,
        };
        if positives.len() >= item_count as usize {
            return Err(exhausted());
        }
        let candidates = store.negative_candidate_count(user);
        if candidates == 0 {
            return Err(exhausted());
        }
        for _ in 0..REJECTION_RETRY_LIMIT {
            let item = self.rng.random_range(0..item_count);
            if store.is_negative_candidate(positives, item) {
                return Ok(item);
            }
        }
        // Dense positives: pick the k-th valid candidate instead of retrying.
        let nth = self.rng.random_range(0..candidates);
        store
            .nth_negative_candidate(positives, nth)
            .ok_or_else(|| {
                SamplerError::SamplingInvariantViolation(format!(
                    "user {user} reports {candidates} negative candidates but candidate {nth} does not exist"
                ))
            })
    }

    /// The hard negative for `(user, anchor, position, period)`, or `None`
    /// when the user has no positive strictly more popular than `anchor`.
    fn more_popular(
        &self,
        user: UserId,
        anchor: ItemId,
        position: usize,
        period: usize,
    ) -> Result<Option<ItemId>, SamplerError> {
        if period == 0 {
            return Err(SamplerError::Configuration(
                "popularity-aware sampling period must be greater than zero".to_string(),
            ));
        }
        let store = self.store;
        let positives = store.checked_positive_items(user)?;
        let anchor_popularity = store.checked_popularity(anchor)?;
        let popularity = store.popularity();
        let mut more_popular: Vec<ItemId> = positives
            .iter()
            .copied()
            .filter(|&item| popularity[item as usize] > anchor_popularity)
            .collect();
        if more_popular.is_empty() {
            return Ok(None);
        }
        more_popular.sort_unstable_by(|a, b| {
            popularity[*a as usize]
                .total_cmp(&popularity[*b as usize])
                .then_with(|| a.cmp(b))
        });
        Ok(Some(
            more_popular[stride_index(position, period, more_popular.len())],
        ))
    }
}

/// Index `floor((position - 1) / period * len)`, clamped into `[0, len)`.
///
/// Positions `1..=period` spread across the ascending-popularity subset.
pub fn stride_index(position: usize, period: usize, len: usize) -> usize {
    let raw = ((position as f64 - 1.0) / period as f64 * len as f64).floor();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(len.saturating_sub(1))
    }
}

/// Produces shuffled epochs of `(user, positive, negative)` batches.
pub struct BatchSampler<'a> {
    negatives: NegativeSampler<'a>,
    config: SamplerConfig,
}

impl<'a> BatchSampler<'a> {
    /// Sampler with default epoch shape and the given seed.
    pub fn new(store: &'a InteractionStore, seed: u64) -> Self {
        Self::with_config(
            store,
            SamplerConfig {
                seed,
                ..SamplerConfig::default()
            },
        )
    }

    pub fn with_config(store: &'a InteractionStore, config: SamplerConfig) -> Self {
        Self {
            negatives: NegativeSampler {
                store,
                rng: DeterministicRng::new(config.seed ^ EPOCH_SEED_OFFSET),
            },
            config,
        }
    }

    pub fn store(&self) -> &'a InteractionStore {
        self.negatives.store
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Uniformly sample an item that is neither positive for `user` nor an
    /// orphan (an item without any training interaction).
    pub fn uniform_negative(&mut self, user: UserId) -> Result<ItemId, SamplerError> {
        self.negatives.uniform(user)
    }

    /// Pick the `position`-dependent item among `user`'s positives that are
    /// strictly more popular than `anchor`, falling back to
    /// [`uniform_negative`](Self::uniform_negative) when there is none.
    ///
    /// The non-fallback branch consumes no randomness.
    pub fn popularity_negative(
        &mut self,
        user: UserId,
        anchor: ItemId,
        position: usize,
        period: usize,
    ) -> Result<ItemId, SamplerError> {
        match self.negatives.more_popular(user, anchor, position, period)? {
            Some(item) => Ok(item),
            None => self.negatives.uniform(user),
        }
    }

    /// Start one shuffled epoch.
    ///
    /// The returned sequence owns its own buffers and RNG; several epochs may
    /// be alive at once without sharing state.
    pub fn get_data(
        &mut self,
        batch_size: usize,
        with_neighborhood: bool,
        neg_per_pos: usize,
        use_popularity: bool,
    ) -> Result<EpochBatches<'a>, SamplerError> {
        self.epoch(EpochConfig {
            batch_size,
            with_neighborhood,
            neg_per_pos,
            use_popularity,
        })
    }

    /// Start one shuffled epoch using the configured epoch shape.
    pub fn next_epoch(&mut self) -> Result<EpochBatches<'a>, SamplerError> {
        self.epoch(self.config.epoch)
    }

    pub fn epoch(&mut self, config: EpochConfig) -> Result<EpochBatches<'a>, SamplerError> {
        config.validate()?;
        let store = self.negatives.store;
        let mut order: Vec<usize> = (0..store.train_size()).collect();
        order.shuffle(&mut self.negatives.rng);
        let buffers = BatchBuffers::new(
            config.batch_size,
            config.with_neighborhood,
            store.max_neighbors_per_item(),
        );
        Ok(EpochBatches {
            negatives: NegativeSampler {
                store,
                rng: self.negatives.rng.fork(),
            },
            config,
            order,
            cursor: 0,
            draw: 0,
            buffers,
            stats: EpochStats::default(),
            pending_reset: false,
            finished: false,
        })
    }
}

/// One epoch of batches, generated lazily as the consumer pulls.
///
/// Use [`next_view`](Self::next_view) to borrow each batch straight out of the
/// reused buffers, or iterate to receive owned [`Batch`] copies. The sequence
/// ends after the final (possibly partial) batch, or after the first error.
pub struct EpochBatches<'a> {
    negatives: NegativeSampler<'a>,
    config: EpochConfig,
    /// Shuffled indices into the store's training pairs.
    order: Vec<usize>,
    /// Position of the current pair in `order`.
    cursor: usize,
    /// Next draw index for the current pair.
    draw: usize,
    buffers: BatchBuffers,
    stats: EpochStats,
    pending_reset: bool,
    finished: bool,
}

impl<'a> EpochBatches<'a> {
    pub fn config(&self) -> &EpochConfig {
        &self.config
    }

    /// Counters for the batches produced so far.
    pub fn stats(&self) -> &EpochStats {
        &self.stats
    }

    /// Rows still to be produced in this epoch.
    pub fn remaining_rows(&self) -> usize {
        if self.finished {
            return 0;
        }
        let pending = if self.pending_reset {
            0
        } else {
            self.buffers.len()
        };
        let pairs_left = self.order.len() - self.cursor;
        (pairs_left * self.config.neg_per_pos)
            .saturating_sub(self.draw)
            .saturating_add(pending)
    }

    /// Produce the next batch as a view into the epoch's buffers.
    pub fn next_view(&mut self) -> Option<Result<BatchView<'_>, SamplerError>> {
        if self.finished {
            return None;
        }
        match self.fill() {
            Err(err) => {
                self.finished = true;
                warn!(error = %err, "epoch generation aborted");
                Some(Err(err))
            }
            Ok(0) => {
                self.finished = true;
                debug!(
                    batches = self.stats.batches,
                    rows = self.stats.rows,
                    uniform_draws = self.stats.uniform_draws,
                    popularity_draws = self.stats.popularity_draws,
                    popularity_fallbacks = self.stats.popularity_fallbacks,
                    max_width = self.stats.max_width,
                    "epoch complete"
                );
                None
            }
            Ok(_) => {
                self.pending_reset = true;
                let view = self.buffers.view();
                self.stats.record_batch(&view);
                Some(Ok(view))
            }
        }
    }

    fn fill(&mut self) -> Result<usize, SamplerError> {
        if self.pending_reset {
            self.buffers.reset();
            self.pending_reset = false;
        }
        let store = self.negatives.store;
        while !self.buffers.is_full() && self.cursor < self.order.len() {
            let pair = store.train_pairs()[self.order[self.cursor]];
            let negative = self.draw_negative(pair, self.draw)?;
            let triple = [pair.user, pair.item, negative];
            if self.buffers.wants_neighbors() {
                self.buffers
                    .push(triple, store.item_users(pair.item), store.item_users(negative));
            } else {
                self.buffers.push(triple, &[], &[]);
            }
            self.draw += 1;
            if self.draw == self.config.neg_per_pos {
                self.draw = 0;
                self.cursor += 1;
            }
        }
        Ok(self.buffers.len())
    }

    /// Even draws are uniform; odd draws are popularity-aware when enabled.
    fn draw_negative(&mut self, pair: TrainPair, draw: usize) -> Result<ItemId, SamplerError> {
        if self.config.use_popularity && draw % 2 == 1 {
            let hard = self.negatives.more_popular(
                pair.user,
                pair.item,
                draw,
                self.config.neg_per_pos,
            )?;
            if let Some(item) = hard {
                self.stats.popularity_draws += 1;
                return Ok(item);
            }
            self.stats.popularity_fallbacks += 1;
        }
        self.stats.uniform_draws += 1;
        self.negatives.uniform(pair.user)
    }
}

impl Iterator for EpochBatches<'_> {
    type Item = Result<Batch, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_view().map(|result| result.map(|view| view.to_batch()))
    }
}

impl std::iter::FusedIterator for EpochBatches<'_> {}

/// Generates one epoch on a background thread into a bounded queue.
///
/// The worker owns its own sampler and buffers. Dropping the prefetcher stops
/// the worker at its next send.
pub struct EpochPrefetcher {
    receiver: Option<mpsc::Receiver<Result<Batch, SamplerError>>>,
    handle: Option<thread::JoinHandle<()>>,
    stats: Arc<PrefetcherStats>,
}

#[derive(Default)]
/// Prefetcher runtime counters.
struct PrefetcherStats {
    queued: AtomicUsize,
    produced: AtomicUsize,
    errors: AtomicUsize,
}

impl EpochPrefetcher {
    /// Spawn a worker producing one epoch of `config` with sampler seed `seed`.
    pub fn spawn(
        store: Arc<InteractionStore>,
        config: EpochConfig,
        seed: u64,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let stats = Arc::new(PrefetcherStats::default());
        let stats_thread = Arc::clone(&stats);
        let handle = thread::spawn(move || {
            let mut sampler = BatchSampler::new(&store, seed);
            let epoch = match sampler.epoch(config) {
                Ok(epoch) => epoch,
                Err(err) => {
                    stats_thread.errors.fetch_add(1, Ordering::Relaxed);
                    let _ = sender.send(Err(err));
                    return;
                }
            };
            for result in epoch {
                if result.is_err() {
                    stats_thread.errors.fetch_add(1, Ordering::Relaxed);
                }
                if sender.send(result).is_err() {
                    return;
                }
                stats_thread.queued.fetch_add(1, Ordering::Relaxed);
                stats_thread.produced.fetch_add(1, Ordering::Relaxed);
            }
        });
        Self {
            receiver: Some(receiver),
            handle: Some(handle),
            stats,
        }
    }

    /// Block until the next batch is available; `None` once the epoch is done.
    pub fn next(&self) -> Option<Result<Batch, SamplerError>> {
        let receiver = self.receiver.as_ref()?;
        let result = receiver.recv().ok()?;
        self.stats
            .queued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
                Some(value.saturating_sub(1))
            })
            .ok();
        Some(result)
    }

    /// Number of prefetched batches currently queued.
    pub fn queue_len(&self) -> usize {
        self.stats.queued.load(Ordering::Relaxed)
    }

    /// Total number of batches produced by the background worker.
    pub fn produced_count(&self) -> usize {
        self.stats.produced.load(Ordering::Relaxed)
    }

    /// Total number of errors produced by the background worker.
    pub fn error_count(&self) -> usize {
        self.stats.errors.load(Ordering::Relaxed)
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) -> Result<(), SamplerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), SamplerError> {
        self.receiver.take();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| {
                SamplerError::SamplingInvariantViolation(PREFETCHER_STOPPED_REASON.to_string())
            })?;
        }
        Ok(())
    }
}

impl Drop for EpochPrefetcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
