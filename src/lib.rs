//! Identity resolution and deduplication core for personal audiobook
//! libraries.
//!
//! The crate reconciles metadata from untrustworthy sources (file tags,
//! third-party catalogs, filesystem paths, content hashes) by deciding when
//! two differently-labeled records describe the same underlying work, and
//! runs those decisions as observable, cancellable background scans.
//!
//! HTTP routing, tag extraction, catalog clients, and persistence live in
//! surrounding layers; this crate consumes [`CanonicalRecord`] sets they
//! assemble and hands back match/duplicate decisions plus operation
//! snapshots.

pub mod core;
pub mod model;
pub mod ops;

pub use crate::core::duplicate::{group_duplicates, retain_members};
pub use crate::core::hash::ChecksumService;
pub use crate::core::normalize::normalize;
pub use crate::core::resolve::{resolve, DEFAULT_FUZZY_THRESHOLD};
pub use crate::core::similarity::similarity;
pub use crate::model::{CanonicalRecord, DuplicateGroup, Facet, MatchMethod, MatchResult};
pub use crate::ops::scan::{DedupScanService, MatchScanService, ScanError};
pub use crate::ops::tracker::{Operation, OperationState, OperationTracker};
