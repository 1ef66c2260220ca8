pub mod scan;
pub mod tracker;

pub use scan::{DedupScanService, MatchScanService, ScanError};
pub use tracker::{Operation, OperationState, OperationTracker};
