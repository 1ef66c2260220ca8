pub mod duplicate;
pub mod hash;
pub mod normalize;
pub mod resolve;
pub mod similarity;

pub use duplicate::{group_duplicates, retain_members};
pub use hash::ChecksumService;
pub use normalize::{normalize, normalize_opt};
pub use resolve::{resolve, DEFAULT_FUZZY_THRESHOLD};
pub use similarity::similarity;
