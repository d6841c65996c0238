use crate::buffers::BatchView;
use crate::types::ItemId;

/// Counters accumulated while an epoch is generated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochStats {
    /// Batches yielded so far.
    pub batches: usize,
    /// Rows yielded so far.
    pub rows: usize,
    /// Negatives drawn by the uniform policy (including popularity fallbacks).
    pub uniform_draws: usize,
    /// Negatives taken from the user's more-popular positives.
    pub popularity_draws: usize,
    /// Popularity-aware draws that found no more-popular positive.
    pub popularity_fallbacks: usize,
    /// Widest neighbor row shipped in any batch (neighborhood mode only).
    pub max_width: usize,
    /// Sum of per-batch neighbor widths, for averaging.
    pub total_width: usize,
}

impl EpochStats {
    pub(crate) fn record_batch(&mut self, view: &BatchView<'_>) {
        self.batches += 1;
        self.rows += view.len();
        if let Some(neighborhood) = view.neighborhood() {
            let width = neighborhood.width();
            self.max_width = self.max_width.max(width);
            self.total_width += width;
        }
    }

    /// Mean neighbor width per batch; `0.0` outside neighborhood mode.
    pub fn mean_width(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.total_width as f64 / self.batches as f64
        }
    }

    /// Share of negatives that came from the popularity-aware branch.
    pub fn popularity_share(&self) -> f64 {
        let total = self.uniform_draws + self.popularity_draws;
        if total == 0 {
            0.0
        } else {
            self.popularity_draws as f64 / total as f64
        }
    }
}

/// Popularity profile of a set of sampled items.
#[derive(Clone, Debug, PartialEq)]
pub struct PopularityProfile {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f64,
}

/// Summarize the popularity of `items`; `None` when empty.
///
/// Ids outside `popularity` are skipped.
pub fn popularity_profile<I>(items: I, popularity: &[f32]) -> Option<PopularityProfile>
where
    I: IntoIterator<Item = ItemId>,
{
    let mut count = 0usize;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    for item in items {
        let Some(&value) = popularity.get(item as usize) else {
            continue;
        };
        count += 1;
        min = min.min(value);
        max = max.max(value);
        sum += f64::from(value);
    }
    if count == 0 {
        return None;
    }
    Some(PopularityProfile {
        count,
        min,
        max,
        mean: sum / count as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::BatchBuffers;

    #[test]
    fn popularity_profile_reports_range_and_mean() {
        let popularity: [f32; 4] = [0.1, 0.2, 0.3, 0.9];
        let profile = popularity_profile([0, 3, 3], &popularity).expect("profile");
        assert_eq!(profile.count, 3);
        assert!((profile.min - 0.1).abs() < 1e-6);
        assert!((profile.max - 0.9).abs() < 1e-6);
        assert!((profile.mean - (0.1 + 0.9 + 0.9) / 3.0).abs() < 1e-6);

        assert!(popularity_profile([], &popularity).is_none());
        assert!(popularity_profile([42], &popularity).is_none());
    }

    #[test]
    fn record_batch_tracks_rows_and_widths() {
        let mut stats = EpochStats::default();
        let mut buffers = BatchBuffers::new(2, true, 3);
        buffers.push([0, 1, 2], &[4, 5, 6], &[7]);
        stats.record_batch(&buffers.view());
        buffers.reset();
        buffers.push([0, 1, 2], &[4], &[7]);
        stats.record_batch(&buffers.view());

        assert_eq!(stats.batches, 2);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.max_width, 3);
        assert!((stats.mean_width() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn popularity_share_handles_empty_epochs() {
        let mut stats = EpochStats::default();
        assert_eq!(stats.popularity_share(), 0.0);
        stats.uniform_draws = 3;
        stats.popularity_draws = 1;
        assert!((stats.popularity_share() - 0.25).abs() < 1e-9);
    }
}
