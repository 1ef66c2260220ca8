//! Duplicate and edition grouping.
//!
//! Partitions a record set into groups under one identity facet and, where a
//! keeper rule applies, classifies the member to retain. Pure functions:
//! caller-owned records are never mutated, and all merge decisions are
//! returned as data for the persistence layer to act on.

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::normalize::{normalize, normalize_opt};
use crate::model::{CanonicalRecord, DuplicateGroup, Facet};

/// Author labels known to be folder-derived mistakes or missing-metadata
/// sentinels rather than people. A record carrying one of these must never be
/// kept over a member with a real author.
const PLACEHOLDER_AUTHORS: [&str; 4] = ["unknown", "unknown author", "various", "audiobooks"];

/// Partition `records` into duplicate groups under `facet`.
///
/// Records missing the facet's identity value do not participate. Singletons
/// are filtered out: a group always has at least two members. Group and
/// member order follow the input order, so results are deterministic.
pub fn group_duplicates(records: &[CanonicalRecord], facet: Facet) -> Vec<DuplicateGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<&CanonicalRecord>> = HashMap::new();

    for record in records {
        let Some(key) = facet_key(record, facet) else {
            continue;
        };
        let bucket = buckets.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        bucket.push(record);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let members = buckets.remove(&key)?;
            if members.len() < 2 {
                return None;
            }
            let members: Vec<CanonicalRecord> = members.into_iter().cloned().collect();
            let keeper = select_keeper(facet, &members);
            Some(DuplicateGroup {
                id: format!("grp_{}", Uuid::new_v4().simple()),
                facet,
                members,
                keeper,
            })
        })
        .collect()
}

/// Drop members of `group` rejected by `keep`, preserving the group
/// invariants. Returns `None` when fewer than two members survive: a group
/// is dropped entirely rather than returned in a destructive "keep nothing"
/// state.
pub fn retain_members(
    group: &DuplicateGroup,
    keep: impl Fn(&CanonicalRecord) -> bool,
) -> Option<DuplicateGroup> {
    let members: Vec<CanonicalRecord> = group.members.iter().filter(|m| keep(m)).cloned().collect();
    if members.len() < 2 {
        return None;
    }
    let keeper = select_keeper(group.facet, &members);
    Some(DuplicateGroup {
        id: group.id.clone(),
        facet: group.facet,
        members,
        keeper,
    })
}

fn facet_key(record: &CanonicalRecord, facet: Facet) -> Option<String> {
    match facet {
        Facet::ContentHash => record
            .content_hash
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(str::to_string),
        Facet::ChecksumPrefix => record
            .prefix_checksum
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        Facet::TitleDurationBucket => {
            let title = normalize_opt(record.title.as_deref());
            if title.is_empty() {
                // An empty key would lump every untitled record together.
                return None;
            }
            if !record.duration_hours.is_finite() {
                // `as i64` would collapse NaN/infinite runtimes to 0, the
                // same bucket as genuinely zero-length records.
                return None;
            }
            let tenths = (record.duration_hours * 10.0).round() as i64;
            Some(format!("{}|{}", title, tenths))
        }
    }
}

/// Keeper selection. The hash facets carry no keeper: their members are
/// byte-identical (or candidates for it) and the retention choice belongs to
/// the policy layer. The title/duration facet prefers, in order: a member
/// with a real (non-placeholder) author, a member stored under the canonical
/// `<author>/...` path convention, the earliest member in input order.
fn select_keeper(facet: Facet, members: &[CanonicalRecord]) -> Option<String> {
    match facet {
        Facet::ContentHash | Facet::ChecksumPrefix => None,
        Facet::TitleDurationBucket => {
            let real: Vec<&CanonicalRecord> = members
                .iter()
                .filter(|m| !has_placeholder_author(m))
                .collect();
            let pool: Vec<&CanonicalRecord> = if real.is_empty() {
                members.iter().collect()
            } else {
                real
            };
            pool.iter()
                .find(|m| stored_under_author_dir(m))
                .or_else(|| pool.first())
                .map(|m| m.path.clone())
        }
    }
}

fn has_placeholder_author(record: &CanonicalRecord) -> bool {
    let author = normalize_opt(record.author.as_deref());
    author.is_empty() || PLACEHOLDER_AUTHORS.contains(&author.as_str())
}

/// True when the record's parent directory name matches its author label,
/// i.e. the file already lives under the `<author>/<title>` layout.
fn stored_under_author_dir(record: &CanonicalRecord) -> bool {
    let Some(author) = record.author.as_deref() else {
        return false;
    };
    let parent = std::path::Path::new(&record.path)
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string());
    match parent {
        Some(dir) => !dir.is_empty() && normalize(&dir) == normalize(author),
        None => false,
    }
}
