use serde::{Deserialize, Serialize};

/// A normalized view of one catalogable unit.
///
/// `path` is the only mandatory, globally unique key; every other field comes
/// from untrusted sources (file tags, folder names, third-party catalogs) and
/// may be absent or wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub duration_hours: f64,
    /// Strong hash over the full file content (SHA-256, lower hex).
    pub content_hash: Option<String>,
    /// Weak hash over a fixed leading byte range, used when full hashing is
    /// too costly.
    pub prefix_checksum: Option<String>,
    /// External catalog identifier such as an ASIN or ISBN.
    pub source_identifier: Option<String>,
    pub path: String,
}

impl CanonicalRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            title: None,
            author: None,
            narrator: None,
            duration_hours: 0.0,
            content_hash: None,
            prefix_checksum: None,
            source_identifier: None,
            path: path.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_narrator(mut self, narrator: impl Into<String>) -> Self {
        self.narrator = Some(narrator.into());
        self
    }

    pub fn with_duration_hours(mut self, hours: f64) -> Self {
        self.duration_hours = hours;
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_prefix_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.prefix_checksum = Some(checksum.into());
        self
    }

    pub fn with_source_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.source_identifier = Some(identifier.into());
        self
    }
}

/// The matching tier that produced a resolution, ordered by trust:
/// identifier > exact title > fuzzy title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    ExactIdentifier,
    ExactNormalizedTitle,
    FuzzyTitle,
}

/// Outcome of resolving one query record against a candidate pool.
///
/// Produced fresh per call and never persisted; callers persist only the
/// decision they make from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: Option<CanonicalRecord>,
    pub method: Option<MatchMethod>,
    pub confidence: f64,
    pub found: bool,
}

impl MatchResult {
    pub fn hit(record: CanonicalRecord, method: MatchMethod, confidence: f64) -> Self {
        Self {
            matched: Some(record),
            method: Some(method),
            confidence,
            found: true,
        }
    }

    pub fn miss() -> Self {
        Self {
            matched: None,
            method: None,
            confidence: 0.0,
            found: false,
        }
    }
}

/// Identity dimension used to group duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Facet {
    /// Exact full-content hash equality. Members are byte-identical.
    ContentHash,
    /// Equality of the leading-bytes checksum. A candidate signal only,
    /// not proof of duplication.
    ChecksumPrefix,
    /// Normalized title plus runtime rounded to a tenth of an hour.
    /// Tolerates metadata drift between re-encodes while keeping different
    /// editions apart.
    TitleDurationBucket,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::ContentHash => "content-hash",
            Facet::ChecksumPrefix => "checksum-prefix",
            Facet::TitleDurationBucket => "title-duration-bucket",
        }
    }
}

/// A set of records judged to describe the same underlying work under one
/// facet. Always has at least two members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: String,
    pub facet: Facet,
    pub members: Vec<CanonicalRecord>,
    /// Path of the member selected to retain when consolidating. `None` for
    /// the hash facets, where the retention choice belongs to the policy
    /// layer.
    pub keeper: Option<String>,
}
