use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};

use crate::config::{EpochConfig, StoreConfig};
use crate::heuristics::{buffer_footprint_bytes, estimate_epoch, format_usize_with_commas};
use crate::metrics::popularity_profile;
use crate::sampler::{BatchSampler, EpochPrefetcher};
use crate::store::InteractionStore;
use crate::types::UserId;

#[derive(Debug, Parser)]
#[command(
    name = "epoch_demo",
    disable_help_subcommand = true,
    about = "Generate shuffled training epochs from an interaction snapshot",
    long_about = "Load an interaction snapshot, then generate (user, positive, negative) batches for a number of epochs and report per-epoch sampling statistics.",
    after_help = "Set RUST_LOG=debug to see per-epoch sampler summaries."
)]
struct EpochDemoCli {
    #[arg(
        long,
        value_name = "PATH",
        help = "Snapshot file, or a directory containing data.bin or data.json"
    )]
    dataset: PathBuf,
    #[arg(long, default_value_t = 3, help = "Number of epochs to generate")]
    epochs: usize,
    #[arg(
        short = 'b',
        long = "batch-size",
        default_value_t = 256,
        value_parser = parse_positive_usize,
        help = "Rows per batch"
    )]
    batch_size: usize,
    #[arg(
        short = 'n',
        long = "neg",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Negatives sampled per training pair"
    )]
    neg_per_pos: usize,
    #[arg(long, help = "Attach item neighborhoods to every batch")]
    neighborhood: bool,
    #[arg(
        long = "use-popularity",
        help = "Interleave more-popular positives as hard negatives"
    )]
    use_popularity: bool,
    #[arg(long, help = "Only train on users with an id below this limit")]
    limit: Option<UserId>,
    #[arg(long, default_value_t = 42, help = "Deterministic sampler seed")]
    seed: u64,
    #[arg(
        long,
        help = "Generate each epoch on a background thread while consuming the previous batch"
    )]
    prefetch: bool,
}

/// Load a snapshot and drive several epochs, printing one summary per epoch.
pub fn run_epoch_demo<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<EpochDemoCli, _>(std::iter::once("epoch_demo".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let store_config = StoreConfig {
        limit: cli.limit,
        seed: cli.seed,
        ..StoreConfig::default()
    };
    let store = Arc::new(InteractionStore::load(&cli.dataset, &store_config)?);
    let epoch_config = EpochConfig {
        batch_size: cli.batch_size,
        with_neighborhood: cli.neighborhood,
        neg_per_pos: cli.neg_per_pos,
        use_popularity: cli.use_popularity,
    };
    epoch_config.validate()?;

    let estimate = estimate_epoch(store.train_size(), &epoch_config);
    println!("=== dataset ===");
    println!("users: {}", format_usize_with_commas(store.user_count() as usize));
    println!("items: {}", format_usize_with_commas(store.item_count() as usize));
    println!("train pairs: {}", format_usize_with_commas(store.train_size()));
    println!(
        "evaluation users: {}",
        format_usize_with_commas(store.evaluation_data().len())
    );
    println!("max neighbors per item: {}", store.max_neighbors_per_item());
    println!(
        "per epoch: {} rows in {} batches (last batch {} rows)",
        format_usize_with_commas(estimate.rows),
        format_usize_with_commas(estimate.batches()),
        if estimate.remainder == 0 {
            epoch_config.batch_size
        } else {
            estimate.remainder
        }
    );
    println!(
        "buffer footprint: {} bytes",
        format_usize_with_commas(buffer_footprint_bytes(
            &epoch_config,
            store.max_neighbors_per_item()
        ))
    );

    let mut sampler = BatchSampler::new(&store, cli.seed);
    for epoch_idx in 0..cli.epochs {
        if cli.prefetch {
            let epoch_seed = cli.seed.wrapping_add(epoch_idx as u64);
            let prefetcher =
                EpochPrefetcher::spawn(Arc::clone(&store), epoch_config, epoch_seed, 4);
            let mut rows = 0usize;
            let mut batches = 0usize;
            let mut negatives = Vec::new();
            while let Some(batch) = prefetcher.next() {
                let batch = batch?;
                rows += batch.len();
                batches += 1;
                negatives.extend(batch.triples().negatives());
            }
            prefetcher.shutdown()?;
            print_epoch_line(epoch_idx, batches, rows, None);
            print_negative_profile(&negatives, store.popularity());
        } else {
            let mut epoch = sampler.epoch(epoch_config)?;
            let mut negatives = Vec::new();
            while let Some(view) = epoch.next_view() {
                let view = view?;
                negatives.extend(view.triples().iter().map(|row| row[2]));
            }
            let stats = epoch.stats();
            print_epoch_line(
                epoch_idx,
                stats.batches,
                stats.rows,
                Some((stats.popularity_share(), stats.popularity_fallbacks)),
            );
            if epoch_config.with_neighborhood {
                println!(
                    "  neighbor width: max {} / mean {:.1}",
                    stats.max_width,
                    stats.mean_width()
                );
            }
            print_negative_profile(&negatives, store.popularity());
        }
    }

    Ok(())
}

fn print_epoch_line(
    epoch_idx: usize,
    batches: usize,
    rows: usize,
    popularity: Option<(f64, usize)>,
) {
    match popularity {
        Some((share, fallbacks)) => println!(
            "epoch {epoch_idx}: {} batches, {} rows, {:.1}% popularity negatives ({} fallbacks)",
            format_usize_with_commas(batches),
            format_usize_with_commas(rows),
            share * 100.0,
            format_usize_with_commas(fallbacks)
        ),
        None => println!(
            "epoch {epoch_idx}: {} batches, {} rows",
            format_usize_with_commas(batches),
            format_usize_with_commas(rows)
        ),
    }
}

fn print_negative_profile(negatives: &[u32], popularity: &[f32]) {
    if let Some(profile) = popularity_profile(negatives.iter().copied(), popularity) {
        println!(
            "  negative popularity: min {:.4} / mean {:.4} / max {:.4}",
            profile.min, profile.mean, profile.max
        );
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse {raw:?} as a positive integer"))?;
    if parsed == 0 {
        return Err("Value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use tempfile::tempdir;

    #[test]
    fn parse_positive_usize_rejects_zero_and_garbage() {
        assert_eq!(parse_positive_usize("8").unwrap(), 8);
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("abc").is_err());
    }

    #[test]
    fn help_exits_cleanly() {
        let parsed = parse_cli::<EpochDemoCli, _>(["epoch_demo", "--help"]).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn cli_reads_flags() {
        let cli = parse_cli::<EpochDemoCli, _>([
            "epoch_demo",
            "--dataset",
            "/tmp/data.json",
            "-b",
            "32",
            "--neg",
            "2",
            "--use-popularity",
            "--limit",
            "10",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(cli.batch_size, 32);
        assert_eq!(cli.neg_per_pos, 2);
        assert!(cli.use_popularity);
        assert!(!cli.neighborhood);
        assert_eq!(cli.limit, Some(10));
        assert_eq!(cli.epochs, 3);
    }

    #[test]
    fn demo_runs_against_snapshot_file() {
        let dir = tempdir().unwrap();
        let mut snapshot = Snapshot {
            users: 2,
            ..Snapshot::default()
        };
        for item in 0..4 {
            snapshot.popularity.insert(item, 0.1 * (item + 1) as f32);
        }
        snapshot
            .prefs
            .entry(0)
            .or_default()
            .insert("train".into(), vec![0, 1]);
        snapshot
            .prefs
            .entry(1)
            .or_default()
            .insert("train".into(), vec![2, 3]);
        let path = dir.path().join("data.json");
        snapshot.write_json(&path).unwrap();

        let args = [
            "--dataset".to_string(),
            dir.path().display().to_string(),
            "--epochs".to_string(),
            "2".to_string(),
            "-b".to_string(),
            "3".to_string(),
            "-n".to_string(),
            "2".to_string(),
            "--neighborhood".to_string(),
            "--use-popularity".to_string(),
        ];
        run_epoch_demo(args.clone().into_iter()).unwrap();

        let mut prefetch_args = args.to_vec();
        prefetch_args.push("--prefetch".to_string());
        run_epoch_demo(prefetch_args.into_iter()).unwrap();
    }
}
