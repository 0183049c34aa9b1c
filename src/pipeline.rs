//! Batch orchestration for the three pipeline passes.
//!
//! Each pass is a pure batch transform: read input snapshots, run the
//! relevant engine, write output snapshots, log a run summary. Per-item
//! failures are folded into the output rows; only missing files, missing
//! columns and unwritable outputs abort a run.

use crate::config::Config;
use crate::errors::AppError;
use crate::geocode::GeocodeService;
use crate::models::GeocodeResult;
use crate::reconcile;
use crate::resolver::{CoordinateResolver, ResultSink};
use crate::storage;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Resolves map links for every candidate in `input` and writes the
/// enriched table to `output`. When `resume` points at an earlier snapshot
/// (final output or incremental backup), items already present there are
/// carried over instead of being re-processed.
pub async fn run_resolve(
    config: &Config,
    input: &Path,
    output: &Path,
    resume: Option<&Path>,
) -> Result<(), AppError> {
    let started = Instant::now();
    let candidates = storage::read_candidates(input, &config.columns)?;
    let total = candidates.len();

    // Branch names recur across cities, so recovered items are keyed by
    // (name, address). Each snapshot row settles at most one input row.
    let mut recovered: HashMap<(String, String), Vec<crate::models::EnrichedRecord>> =
        HashMap::new();
    if let Some(snapshot_path) = resume {
        let snapshot = storage::read_enriched(snapshot_path)?;
        tracing::info!(
            "Resuming: {} settled items found in {}",
            snapshot.len(),
            snapshot_path.display()
        );
        for record in snapshot {
            recovered
                .entry((record.branch_name.clone(), record.raw_address.clone()))
                .or_default()
                .push(record);
        }
    }

    let mut settled: Vec<(usize, crate::models::EnrichedRecord)> = Vec::new();
    let mut pending = Vec::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        let key = (candidate.branch_name.clone(), candidate.raw_address.clone());
        match recovered.get_mut(&key).and_then(Vec::pop) {
            Some(record) => settled.push((index, record)),
            None => pending.push((index, candidate)),
        }
    }

    // Snapshot rows with no matching input row are carried through at the
    // end rather than dropped.
    let mut overflow = total;
    for leftovers in recovered.into_values() {
        for record in leftovers {
            tracing::warn!(
                "Snapshot record '{}' has no matching input row",
                record.branch_name
            );
            settled.push((overflow, record));
            overflow += 1;
        }
    }

    tracing::info!(
        "Resolving {} of {} items with {} workers (checkpoint every {})",
        pending.len(),
        total,
        config.worker_count,
        config.checkpoint_interval
    );

    let sink = Arc::new(ResultSink::new(
        output.to_path_buf(),
        config.checkpoint_interval,
        pending.len(),
    ));
    sink.seed(settled);

    let resolver = CoordinateResolver::new(config)?;
    resolver.resolve_batch(pending, Arc::clone(&sink)).await;

    let sink = Arc::try_unwrap(sink)
        .map_err(|_| AppError::DataError("Result sink still shared after batch".to_string()))?;
    let (records, stats) = sink.finish();
    storage::write_enriched(output, &records)?;

    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        stats.processed as f64 / elapsed
    } else {
        0.0
    };
    let success_rate = if stats.processed > 0 {
        stats.succeeded as f64 / stats.processed as f64 * 100.0
    } else {
        0.0
    };

    tracing::info!("Extraction complete");
    tracing::info!("Total processed: {}", stats.processed);
    tracing::info!("Successful extractions: {}", stats.succeeded);
    tracing::info!("Failed extractions: {}", stats.failed);
    tracing::info!("Success rate: {:.1}%", success_rate);
    tracing::info!("Total time: {:.1} seconds", elapsed);
    tracing::info!("Average speed: {:.1} URLs/second", rate);
    tracing::info!("Results saved to: {}", output.display());

    Ok(())
}

/// Geocodes the configured address column of `input` and writes the rows
/// back out with the api_* columns appended. Calls are sequential with a
/// fixed delay between them to respect external quota.
pub async fn run_geocode(config: &Config, input: &Path, output: &Path) -> Result<(), AppError> {
    let started = Instant::now();
    let table = storage::read_address_table(input, &config.columns.address)?;
    let service = GeocodeService::new(config)?;
    let total = table.rows.len();

    let mut results: Vec<GeocodeResult> = Vec::with_capacity(total);
    for (idx, address) in table.addresses.iter().enumerate() {
        tracing::info!("Geocoding row {}/{}", idx + 1, total);
        results.push(service.geocode_address(address).await);
        if idx + 1 < total {
            tokio::time::sleep(config.geocode_pacing()).await;
        }
    }

    storage::write_geocoded(output, &table, &results)?;

    let resolved = results.iter().filter(|g| g.latitude.is_some()).count();
    tracing::info!("Geocoding complete");
    tracing::info!("Total processed: {}", total);
    tracing::info!("Resolved: {}", resolved);
    tracing::info!("Unresolved: {}", total - resolved);
    tracing::info!("Total time: {:.1} seconds", started.elapsed().as_secs_f64());
    tracing::info!("Results saved to: {}", output.display());

    Ok(())
}

/// Runs both reconciliation strategies over a canonical and a scraped
/// snapshot, writing the pincode comparison report and the unique-records
/// table.
pub fn run_reconcile(
    config: &Config,
    canonical_path: &Path,
    scraped_path: &Path,
    comparison_out: &Path,
    unique_out: &Path,
) -> Result<(), AppError> {
    let canonical =
        storage::read_address_table(canonical_path, &config.columns.canonical_address)?;
    let scraped = storage::read_address_table(scraped_path, &config.columns.scraped_address)?;

    let comparison = reconcile::compare_by_pincode(&canonical.addresses, &scraped.addresses);
    storage::write_comparison(comparison_out, &comparison)?;

    let duplicates = reconcile::find_duplicates(&canonical.addresses, &scraped.addresses);
    storage::write_unique(unique_out, &scraped, &duplicates.unique_indices)?;

    tracing::info!("Reconciliation complete");
    tracing::info!("Total records in scraped file: {}", scraped.rows.len());
    tracing::info!("Duplicate records found: {}", duplicates.duplicate_count);
    tracing::info!("Unique records to be added: {}", duplicates.unique_indices.len());
    tracing::info!(
        "Pincodes present in both files: {}",
        comparison.distinct_pincodes
    );
    tracing::info!("Comparison report saved to: {}", comparison_out.display());
    tracing::info!("Unique records saved to: {}", unique_out.display());

    Ok(())
}
