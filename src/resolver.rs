//! Concurrent expansion of short map links into coordinates.
//!
//! A bounded pool of tokio tasks expands each record's link (HEAD
//! preferred, GET fallback, redirects followed), runs the pattern matcher
//! over the final URL and, for embed pages, the body, and retries failures
//! with jittered, increasing delays. Completed results flow into a
//! synchronized sink that writes an incremental backup every N
//! completions, so an interrupted run loses at most N-1 items of new work.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CandidateRecord, CoordinateResult, EnrichedRecord, ResolveErrorKind};
use crate::patterns::extract_coordinates;
use crate::storage;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Rotated per request so the expansion traffic looks like ordinary
/// browser traffic to rate limiters.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/121.0",
];

/// Links carrying these values are treated as "no link" and fail
/// immediately with `NoUrl`, without a network call.
const NO_URL_SENTINELS: [&str; 2] = ["NA", "not-available"];

fn pick_user_agent() -> &'static str {
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Counters reported in the run summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct SinkInner {
    results: Vec<(usize, EnrichedRecord)>,
    completed: usize,
    succeeded: usize,
    batches: usize,
    total: usize,
}

/// Thread-safe accumulator for resolver output.
///
/// Appending a result, bumping the completed counter and deciding whether
/// to checkpoint happen inside one mutual-exclusion region, so two workers
/// can never trigger overlapping or skipped checkpoints.
pub struct ResultSink {
    inner: Mutex<SinkInner>,
    checkpoint_interval: usize,
    output_path: PathBuf,
}

impl ResultSink {
    pub fn new(output_path: PathBuf, checkpoint_interval: usize, total: usize) -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                results: Vec::new(),
                completed: 0,
                succeeded: 0,
                batches: 0,
                total,
            }),
            checkpoint_interval,
            output_path,
        }
    }

    /// Pre-loads results recovered from an earlier snapshot. Seeded items
    /// count toward the final output but not toward checkpoint boundaries,
    /// which track new work only.
    pub fn seed(&self, records: Vec<(usize, EnrichedRecord)>) {
        let mut inner = self.inner.lock().unwrap();
        inner.results.extend(records);
    }

    /// Publishes one settled item. Writes an incremental backup after every
    /// `checkpoint_interval` completions.
    pub fn publish(&self, index: usize, record: EnrichedRecord) {
        let mut inner = self.inner.lock().unwrap();
        let name = record.branch_name.clone();
        let success = record.success;

        inner.results.push((index, record));
        inner.completed += 1;
        if success {
            inner.succeeded += 1;
            tracing::info!("[{}/{}] {} resolved", inner.completed, inner.total, name);
        } else {
            tracing::warn!("[{}/{}] {} failed", inner.completed, inner.total, name);
        }

        if inner.completed % self.checkpoint_interval == 0 {
            inner.batches += 1;
            let batch = inner.batches;
            let snapshot: Vec<EnrichedRecord> =
                inner.results.iter().map(|(_, r)| r.clone()).collect();
            let backup = storage::backup_path(&self.output_path, batch);
            match storage::write_enriched(&backup, &snapshot) {
                Ok(()) => tracing::info!(
                    "Incremental save: {} results written to {}",
                    snapshot.len(),
                    backup.display()
                ),
                Err(e) => tracing::error!("Failed to write incremental backup: {}", e),
            }
        }
    }

    /// Consumes the sink, returning results in input order plus counters.
    pub fn finish(self) -> (Vec<EnrichedRecord>, RunStats) {
        let inner = self.inner.into_inner().unwrap();
        let mut results = inner.results;
        results.sort_by_key(|(index, _)| *index);
        let stats = RunStats {
            processed: inner.completed,
            succeeded: inner.succeeded,
            failed: inner.completed - inner.succeeded,
        };
        (results.into_iter().map(|(_, r)| r).collect(), stats)
    }
}

pub struct CoordinateResolver {
    client: Client,
    retry_attempts: u32,
    worker_count: usize,
}

impl CoordinateResolver {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create resolver client: {}", e))
            })?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            worker_count: config.worker_count,
        })
    }

    /// Resolves all items, overlapping network I/O across the worker pool.
    /// Each item is processed by exactly one task; completion order is
    /// unspecified and the sink keys results by index.
    pub async fn resolve_batch(
        &self,
        items: Vec<(usize, CandidateRecord)>,
        sink: Arc<ResultSink>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut handles = Vec::with_capacity(items.len());

        for (index, candidate) in items {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let client = self.client.clone();
            let retry_attempts = self.retry_attempts;
            let sink = Arc::clone(&sink);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = resolve_one(
                    &client,
                    candidate.source_url.as_deref(),
                    &candidate.branch_name,
                    retry_attempts,
                )
                .await;
                sink.publish(index, EnrichedRecord::from_resolution(candidate, result));
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Resolver task panicked: {}", e);
            }
        }
    }
}

/// Resolves a single record's link, retrying transport and parse failures
/// up to the attempt limit with jittered, increasing delays.
async fn resolve_one(
    client: &Client,
    url: Option<&str>,
    name: &str,
    attempts: u32,
) -> CoordinateResult {
    let url = match url {
        Some(u) if !u.trim().is_empty() && !NO_URL_SENTINELS.contains(&u.trim()) => u.trim(),
        _ => return CoordinateResult::failed(ResolveErrorKind::NoUrl),
    };

    let mut last_kind = ResolveErrorKind::Transport;
    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay_ms = {
                let mut rng = rand::thread_rng();
                rng.gen_range(500..1500) * (attempt as u64 - 1)
            };
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match attempt_resolve(client, url).await {
            Ok(result) => {
                tracing::debug!("{}: resolved on attempt {}", name, attempt);
                return result;
            }
            Err(kind) => {
                last_kind = kind;
                tracing::warn!(
                    "{}: attempt {}/{} failed ({})",
                    name,
                    attempt,
                    attempts,
                    kind.describe()
                );
            }
        }
    }

    CoordinateResult::failed(last_kind)
}

/// One expansion attempt. HEAD first since it is lighter; when the HEAD is
/// rejected or its final URL carries no pattern, fall back to GET so the
/// URL can be re-resolved and embed bodies scanned too.
async fn attempt_resolve(client: &Client, url: &str) -> Result<CoordinateResult, ResolveErrorKind> {
    let head = client
        .head(url)
        .header(USER_AGENT, pick_user_agent())
        .send()
        .await
        .map_err(|_| ResolveErrorKind::Transport)?;

    // A server rejecting HEAD (405 and friends) says nothing about the
    // URL, so only a successful HEAD can short-circuit.
    if head.status().is_success() {
        let expanded = head.url().to_string();
        if let Some((lat, lng)) = extract_coordinates(&expanded) {
            return Ok(CoordinateResult::resolved(lat, lng, expanded));
        }
    }

    let get = client
        .get(url)
        .header(USER_AGENT, pick_user_agent())
        .send()
        .await
        .map_err(|_| ResolveErrorKind::Transport)?;

    if !get.status().is_success() {
        return Err(ResolveErrorKind::Transport);
    }

    let expanded = get.url().to_string();
    let body = get.text().await.unwrap_or_default();

    if let Some((lat, lng)) = extract_coordinates(&expanded) {
        Ok(CoordinateResult::resolved(lat, lng, expanded))
    } else if let Some((lat, lng)) = extract_coordinates(&body) {
        Ok(CoordinateResult::resolved(lat, lng, expanded))
    } else {
        Err(ResolveErrorKind::Parse)
    }
}
