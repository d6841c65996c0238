use crate::config::EpochConfig;

/// Expected shape of one epoch, computed from counts only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EpochEstimate {
    pub rows: usize,
    pub full_batches: usize,
    /// Rows in the trailing partial batch; `0` when rows divide evenly.
    pub remainder: usize,
}

impl EpochEstimate {
    pub fn batches(&self) -> usize {
        self.full_batches + usize::from(self.remainder > 0)
    }
}

pub fn estimate_epoch(train_size: usize, config: &EpochConfig) -> EpochEstimate {
    let rows = config.rows_per_epoch(train_size);
    let batch_size = config.batch_size.max(1);
    EpochEstimate {
        rows,
        full_batches: rows / batch_size,
        remainder: rows % batch_size,
    }
}

/// Dense bytes held by one epoch's buffers.
pub fn buffer_footprint_bytes(config: &EpochConfig, max_neighbors_per_item: usize) -> usize {
    let cell = std::mem::size_of::<u32>();
    let triples = config.batch_size * 3 * cell;
    if !config.with_neighborhood {
        return triples;
    }
    let stride = max_neighbors_per_item.max(1);
    // Two neighbor matrices plus per-row lengths and written extents for each.
    triples + 2 * config.batch_size * (stride + 2) * cell
}

pub fn format_usize_with_commas(value: usize) -> String {
    let raw = value.to_string();
    let mut grouped_reversed = String::with_capacity(raw.len() + (raw.len() / 3));
    for (idx, ch) in raw.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            grouped_reversed.push(',');
        }
        grouped_reversed.push(ch);
    }
    grouped_reversed.chars().rev().collect()
}
