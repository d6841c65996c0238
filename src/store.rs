use indexmap::IndexMap;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::constants::sampler::REJECTION_RETRY_LIMIT;
use crate::constants::splits::{SPLIT_TEST_TARGET, TRAINING_SPLITS};
use crate::constants::store::{EVALUATION_SEED_OFFSET, IN_MEMORY_SNAPSHOT};
use crate::data::{EvaluationCase, TrainPair};
use crate::errors::SamplerError;
use crate::rng::DeterministicRng;
use crate::snapshot::Snapshot;
use crate::types::{ItemId, ThresholdName, UserId};

/// Immutable, memory-resident interaction corpus.
///
/// Built once from a [`Snapshot`]; every accessor is read-only, so a store can
/// be shared (for example behind an `Arc`) by any number of epoch generators.
#[derive(Debug)]
pub struct InteractionStore {
    user_count: u32,
    item_count: u32,
    popularity: Vec<f32>,
    thresholds: BTreeMap<ThresholdName, f32>,
    /// Union of every split per user, indexed by user id.
    positive_items: Vec<HashSet<ItemId>>,
    train_pairs: Vec<TrainPair>,
    /// Sorted users per item, derived from `train_pairs`.
    item_users: Vec<Vec<UserId>>,
    max_neighbors_per_item: usize,
    /// Items that are neither positive for the user nor orphans.
    negative_candidates: Vec<u32>,
    evaluation_data: IndexMap<UserId, EvaluationCase>,
}

impl InteractionStore {
    /// Read the snapshot at `path` and build the store.
    pub fn load(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self, SamplerError> {
        let path = path.as_ref();
        let snapshot = Snapshot::read(path)?;
        Self::build(snapshot, config, &path.display().to_string())
    }

    /// Build a store from an already decoded snapshot.
    pub fn from_snapshot(snapshot: Snapshot, config: &StoreConfig) -> Result<Self, SamplerError> {
        Self::build(snapshot, config, IN_MEMORY_SNAPSHOT)
    }

    fn build(snapshot: Snapshot, config: &StoreConfig, label: &str) -> Result<Self, SamplerError> {
        let load_error = |reason: String| SamplerError::DataLoad {
            snapshot: label.to_string(),
            reason,
        };

        let Some(&max_item) = snapshot.popularity.keys().next_back() else {
            return Err(load_error(
                "popularity map is empty; item count is undefined".into(),
            ));
        };
        let item_count = max_item
            .checked_add(1)
            .ok_or_else(|| load_error(format!("item id {max_item} overflows the id space")))?;

        let mut popularity = Vec::with_capacity(item_count as usize);
        for item in 0..item_count {
            let value = snapshot
                .popularity
                .get(&item)
                .copied()
                .ok_or_else(|| load_error(format!("missing popularity for item {item}")))?;
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(load_error(format!(
                    "popularity {value} for item {item} is outside [0, 1]"
                )));
            }
            popularity.push(value);
        }

        let user_count = snapshot.users;
        let mut positive_items = vec![HashSet::new(); user_count as usize];
        let mut train_pairs = Vec::new();
        let mut held_out = Vec::new();
        for (&user, splits) in &snapshot.prefs {
            if user >= user_count {
                return Err(load_error(format!(
                    "user id {user} is out of range (user count {user_count})"
                )));
            }
            for (split, items) in splits {
                if let Some(&item) = items.iter().find(|&&item| item >= item_count) {
                    return Err(load_error(format!(
                        "user {user} split '{split}' references item {item} (item count {item_count})"
                    )));
                }
                positive_items[user as usize].extend(items.iter().copied());
                if TRAINING_SPLITS.contains(&split.as_str()) {
                    train_pairs.extend(items.iter().map(|&item| TrainPair { user, item }));
                } else if split == SPLIT_TEST_TARGET {
                    held_out.push((user, items.clone()));
                }
            }
        }

        let mut rng = DeterministicRng::new(config.seed ^ EVALUATION_SEED_OFFSET);
        let mut evaluation_data = IndexMap::with_capacity(held_out.len());
        for (user, items) in held_out {
            let positives = &positive_items[user as usize];
            let negatives =
                sample_evaluation_negatives(&mut rng, user, positives, item_count, config)?;
            if let Some(collision) = negatives.iter().find(|item| positives.contains(item)) {
                return Err(evaluation_collision(user, *collision));
            }
            evaluation_data.insert(
                user,
                EvaluationCase {
                    held_out: items,
                    negatives,
                },
            );
        }

        if let Some(limit) = config.limit {
            let before = train_pairs.len();
            train_pairs.retain(|pair| pair.user < limit);
            debug!(
                limit,
                kept = train_pairs.len(),
                dropped = before - train_pairs.len(),
                "applied user limit to training pairs"
            );
        }

        let mut item_users: Vec<Vec<UserId>> = vec![Vec::new(); item_count as usize];
        for pair in &train_pairs {
            item_users[pair.item as usize].push(pair.user);
        }
        for users in &mut item_users {
            users.sort_unstable();
            users.dedup();
        }
        let max_neighbors_per_item = item_users.iter().map(Vec::len).max().unwrap_or(0);

        let connected_items = item_users.iter().filter(|users| !users.is_empty()).count();
        let negative_candidates = positive_items
            .iter()
            .map(|positives| {
                let connected_positives = positives
                    .iter()
                    .filter(|&&item| !item_users[item as usize].is_empty())
                    .count();
                (connected_items - connected_positives) as u32
            })
            .collect();

        info!(
            snapshot = label,
            users = user_count,
            items = item_count,
            train_pairs = train_pairs.len(),
            evaluation_users = evaluation_data.len(),
            max_neighbors_per_item,
            "loaded interaction store"
        );

        Ok(Self {
            user_count,
            item_count,
            popularity,
            thresholds: snapshot.thresholds,
            positive_items,
            train_pairs,
            item_users,
            max_neighbors_per_item,
            negative_candidates,
            evaluation_data,
        })
    }

    /// Number of training pairs (after any user limit).
    pub fn train_size(&self) -> usize {
        self.train_pairs.len()
    }

    pub fn user_count(&self) -> u32 {
        self.user_count
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Popularity indexed by item id.
    pub fn popularity(&self) -> &[f32] {
        &self.popularity
    }

    pub fn thresholds(&self) -> &BTreeMap<ThresholdName, f32> {
        &self.thresholds
    }

    pub fn train_pairs(&self) -> &[TrainPair] {
        &self.train_pairs
    }

    /// Held-out targets and sampled negatives, keyed by user in id order.
    pub fn evaluation_data(&self) -> &IndexMap<UserId, EvaluationCase> {
        &self.evaluation_data
    }

    /// Every item the user interacted with, across all splits.
    pub fn positive_items(&self, user: UserId) -> Option<&HashSet<ItemId>> {
        self.positive_items.get(user as usize)
    }

    pub fn is_positive(&self, user: UserId, item: ItemId) -> bool {
        self.positive_items(user)
            .is_some_and(|positives| positives.contains(&item))
    }

    /// Users with a training interaction on `item`; empty for orphan items.
    pub fn item_users(&self, item: ItemId) -> &[UserId] {
        self.item_users
            .get(item as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn max_neighbors_per_item(&self) -> usize {
        self.max_neighbors_per_item
    }

    pub(crate) fn checked_positive_items(
        &self,
        user: UserId,
    ) -> Result<&HashSet<ItemId>, SamplerError> {
        self.positive_items(user)
            .ok_or(SamplerError::UnknownUser {
                user,
                user_count: self.user_count,
            })
    }

    pub(crate) fn checked_popularity(&self, item: ItemId) -> Result<f32, SamplerError> {
        self.popularity
            .get(item as usize)
            .copied()
            .ok_or(SamplerError::UnknownItem {
                item,
                item_count: self.item_count,
            })
    }

    /// Count of items a uniform training negative may land on for `user`.
    pub(crate) fn negative_candidate_count(&self, user: UserId) -> u32 {
        self.negative_candidates
            .get(user as usize)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn is_negative_candidate(
        &self,
        positives: &HashSet<ItemId>,
        item: ItemId,
    ) -> bool {
        !positives.contains(&item) && !self.item_users(item).is_empty()
    }

    /// The `nth` (zero-based) valid negative in item id order.
    pub(crate) fn nth_negative_candidate(
        &self,
        positives: &HashSet<ItemId>,
        nth: u32,
    ) -> Option<ItemId> {
        (0..self.item_count)
            .filter(|&item| self.is_negative_candidate(positives, item))
            .nth(nth as usize)
    }
}

fn evaluation_collision(user: UserId, item: ItemId) -> SamplerError {
    SamplerError::SamplingInvariantViolation(format!(
        "evaluation negative {item} for user {user} is a positive item"
    ))
}

fn sample_evaluation_negatives(
    rng: &mut DeterministicRng,
    user: UserId,
    positives: &HashSet<ItemId>,
    item_count: u32,
    config: &StoreConfig,
) -> Result<Vec<ItemId>, SamplerError> {
    if positives.len() >= item_count as usize {
        return Err(SamplerError::ExhaustedSamplingSpace {
            user,
            positives: positives.len(),
            items: item_count,
        });
    }
    let candidates = item_count - positives.len() as u32;
    let mut negatives = Vec::with_capacity(config.evaluation_negatives);
    'draws: for _ in 0..config.evaluation_negatives {
        for _ in 0..REJECTION_RETRY_LIMIT {
            let item = rng.random_range(0..item_count);
            if !positives.contains(&item) {
                negatives.push(item);
                continue 'draws;
            }
        }
        let nth = rng.random_range(0..candidates) as usize;
        let item = (0..item_count)
            .filter(|item| !positives.contains(item))
            .nth(nth)
            .ok_or_else(|| {
                SamplerError::SamplingInvariantViolation(format!(
                    "user {user} has fewer than {} non-positive items",
                    nth + 1
                ))
            })?;
        negatives.push(item);
    }
    Ok(negatives)
}
