//! Tracked scan runners.
//!
//! Resolution and dedup scans run on blocking workers while the submitting
//! side stays responsive: the caller gets an operation id back immediately
//! and polls the [`OperationTracker`] for progress and the terminal result.
//! Workers poll for cancellation between records and report failures through
//! the operation's terminal state; nothing propagates out of a worker.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use thiserror::Error;

use crate::core::duplicate::group_duplicates;
use crate::core::hash::ChecksumService;
use crate::core::resolve::resolve;
use crate::model::{CanonicalRecord, Facet, MatchResult};
use crate::ops::tracker::OperationTracker;

pub const DEDUP_SCAN_KIND: &str = "dedup-scan";
pub const MATCH_SCAN_KIND: &str = "match-scan";

/// Records per cancellation poll during the hashing phase.
const CANCEL_POLL_CHUNK: usize = 32;

#[derive(Debug, Error)]
pub enum ScanError {
    /// At most one scan per kind runs at a time. The id of the operation
    /// already in progress is carried so callers can report or poll it; this
    /// is a policy signal, not a tracker failure.
    #[error("a {kind} operation is already in progress: {id}")]
    AlreadyRunning { kind: &'static str, id: String },
}

/// Runs duplicate scans as tracked background operations.
pub struct DedupScanService {
    tracker: Arc<OperationTracker>,
    checksums: ChecksumService,
}

impl DedupScanService {
    pub fn new(tracker: Arc<OperationTracker>) -> Self {
        Self {
            tracker,
            checksums: ChecksumService::new(),
        }
    }

    /// Start a duplicate scan over `records` under `facet` and return the
    /// operation id. Refuses to start while another dedup scan is active.
    ///
    /// For the hash facets, records missing their checksum get it backfilled
    /// from the file at `path` before grouping; records whose file cannot be
    /// read are logged and simply do not participate. The completion payload
    /// carries the duplicate groups as JSON.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_dedup_scan(
        &self,
        records: Vec<CanonicalRecord>,
        facet: Facet,
    ) -> Result<String, ScanError> {
        if let Some(id) = self.tracker.is_type_running(DEDUP_SCAN_KIND) {
            return Err(ScanError::AlreadyRunning {
                kind: DEDUP_SCAN_KIND,
                id,
            });
        }

        let id = self.tracker.create_operation(
            DEDUP_SCAN_KIND,
            &format!(
                "Duplicate scan ({}) over {} records",
                facet.as_str(),
                records.len()
            ),
        );
        self.tracker.start(&id);

        let tracker = self.tracker.clone();
        let checksums = self.checksums.clone();
        let op_id = id.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                run_dedup_scan(&tracker, &op_id, &checksums, records, facet)
            }));
            settle(&tracker, &op_id, outcome);
        });

        Ok(id)
    }
}

/// Runs batch catalog reconciliation as tracked background operations.
pub struct MatchScanService {
    tracker: Arc<OperationTracker>,
}

impl MatchScanService {
    pub fn new(tracker: Arc<OperationTracker>) -> Self {
        Self { tracker }
    }

    /// Resolve every query record against the candidate pool on a worker and
    /// return the operation id. The completion payload carries one
    /// [`MatchResult`] per query, in query order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_match_scan(
        &self,
        queries: Vec<CanonicalRecord>,
        candidates: Vec<CanonicalRecord>,
        threshold: f64,
    ) -> Result<String, ScanError> {
        if let Some(id) = self.tracker.is_type_running(MATCH_SCAN_KIND) {
            return Err(ScanError::AlreadyRunning {
                kind: MATCH_SCAN_KIND,
                id,
            });
        }

        let id = self.tracker.create_operation(
            MATCH_SCAN_KIND,
            &format!(
                "Match scan: {} queries against {} candidates",
                queries.len(),
                candidates.len()
            ),
        );
        self.tracker.start(&id);

        let tracker = self.tracker.clone();
        let op_id = id.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                run_match_scan(&tracker, &op_id, &queries, &candidates, threshold)
            }));
            settle(&tracker, &op_id, outcome);
        });

        Ok(id)
    }
}

/// Map a worker outcome onto the operation's terminal state. `Ok(None)` means
/// the scan observed cancellation and exited early; the tracker already
/// carries the Cancelled state and must not be overwritten.
fn settle(
    tracker: &OperationTracker,
    id: &str,
    outcome: std::thread::Result<Result<Option<serde_json::Value>>>,
) {
    match outcome {
        Ok(Ok(Some(result))) => {
            tracker.complete(id, Some(result));
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
            log::warn!("scan {} failed: {:#}", id, e);
            tracker.fail(id, &format!("{:#}", e));
        }
        Err(_) => {
            log::warn!("scan {} worker panicked", id);
            tracker.fail(id, "scan worker panicked");
        }
    }
}

fn run_dedup_scan(
    tracker: &OperationTracker,
    id: &str,
    checksums: &ChecksumService,
    mut records: Vec<CanonicalRecord>,
    facet: Facet,
) -> Result<Option<serde_json::Value>> {
    if tracker.is_cancelled(id) {
        return Ok(None);
    }

    // Phase 1: backfill the checksum the facet groups on. Hashing dominates
    // scan time, so it owns the 0..80 progress range.
    if matches!(facet, Facet::ContentHash | Facet::ChecksumPrefix) {
        tracker.update_progress(id, 0, "Computing checksums");
        if !backfill_checksums(tracker, id, checksums, &mut records, facet) {
            return Ok(None);
        }
    }

    if tracker.is_cancelled(id) {
        return Ok(None);
    }

    // Phase 2: group.
    tracker.update_progress(id, 80, "Grouping records");
    let groups = group_duplicates(&records, facet);

    log::info!(
        "dedup scan {} found {} group(s) across {} records",
        id,
        groups.len(),
        records.len()
    );

    Ok(Some(json!({
        "facet": facet,
        "records_scanned": records.len(),
        "duplicate_groups": groups.len(),
        "groups": groups,
    })))
}

/// Fill in the missing checksum field for `facet` on every record whose file
/// is readable. Returns false if cancellation was observed.
fn backfill_checksums(
    tracker: &OperationTracker,
    id: &str,
    checksums: &ChecksumService,
    records: &mut [CanonicalRecord],
    facet: Facet,
) -> bool {
    use rayon::prelude::*;

    let missing: Vec<(usize, String)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| match facet {
            Facet::ContentHash => r.content_hash.is_none(),
            Facet::ChecksumPrefix => r.prefix_checksum.is_none(),
            Facet::TitleDurationBucket => false,
        })
        .map(|(i, r)| (i, r.path.clone()))
        .collect();

    let total = missing.len();
    if total == 0 {
        return true;
    }

    let done = AtomicUsize::new(0);
    // Hash in chunks so cancellation is observed between records rather than
    // only at the end of the phase.
    for chunk in missing.chunks(CANCEL_POLL_CHUNK) {
        if tracker.is_cancelled(id) {
            return false;
        }

        let computed: Vec<(usize, Option<String>)> = chunk
            .par_iter()
            .map(|(index, path)| {
                let result = match facet {
                    Facet::ChecksumPrefix => checksums.prefix_checksum(Path::new(path)),
                    _ => checksums.content_hash(Path::new(path)),
                };
                let value = match result {
                    Ok(hash) => Some(hash),
                    Err(e) => {
                        // Keep scanning; this record just won't participate.
                        log::warn!("failed to checksum {}: {}", path, e);
                        None
                    }
                };
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                tracker.update_progress(id, (current * 80 / total) as i32, path);
                (*index, value)
            })
            .collect();

        for (index, value) in computed {
            match facet {
                Facet::ContentHash => records[index].content_hash = value,
                Facet::ChecksumPrefix => records[index].prefix_checksum = value,
                Facet::TitleDurationBucket => {}
            }
        }
    }

    true
}

fn run_match_scan(
    tracker: &OperationTracker,
    id: &str,
    queries: &[CanonicalRecord],
    candidates: &[CanonicalRecord],
    threshold: f64,
) -> Result<Option<serde_json::Value>> {
    let total = queries.len();
    let mut results: Vec<MatchResult> = Vec::with_capacity(total);

    for (index, query) in queries.iter().enumerate() {
        // Candidate boundaries are the safe points for cancellation.
        if tracker.is_cancelled(id) {
            return Ok(None);
        }
        results.push(resolve(query, candidates, threshold));
        tracker.update_progress(
            id,
            ((index + 1) * 100 / total) as i32,
            query.title.as_deref().unwrap_or(&query.path),
        );
    }

    let matched = results.iter().filter(|r| r.found).count();
    log::info!(
        "match scan {} resolved {}/{} queries",
        id,
        matched,
        total
    );

    Ok(Some(json!({
        "queries": total,
        "matched": matched,
        "results": results,
    })))
}
