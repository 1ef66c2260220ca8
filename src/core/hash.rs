use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Leading byte range covered by the prefix checksum. Large enough to get
/// past container headers and shared intro segments, small enough to stay
/// cheap on multi-gigabyte audiobooks.
pub const PREFIX_LEN: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Computes file identity checksums for duplicate detection.
#[derive(Clone)]
pub struct ChecksumService;

impl ChecksumService {
    pub fn new() -> Self {
        Self
    }

    /// SHA-256 content hash over the whole file, lower hex.
    /// This is the strong signal for exact duplicate detection.
    pub fn content_hash(&self, file_path: &Path) -> Result<String, HashError> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        Self::digest_reader(reader)
    }

    /// SHA-256 over only the first [`PREFIX_LEN`] bytes of the file.
    /// A fast, approximate pre-filter used when full hashing is too costly;
    /// agreement is a candidate duplicate signal, not proof.
    pub fn prefix_checksum(&self, file_path: &Path) -> Result<String, HashError> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file).take(PREFIX_LEN);
        Self::digest_reader(reader)
    }

    /// Compute content hashes for multiple files in parallel.
    /// Returns a vector of (file_path, hash) tuples.
    pub fn content_hashes_batch(
        &self,
        file_paths: &[&Path],
    ) -> Vec<(String, Result<String, HashError>)> {
        use rayon::prelude::*;

        file_paths
            .par_iter()
            .map(|path| {
                let path_str = path.to_string_lossy().to_string();
                (path_str, self.content_hash(path))
            })
            .collect()
    }

    /// Compute prefix checksums for multiple files in parallel.
    pub fn prefix_checksums_batch(
        &self,
        file_paths: &[&Path],
    ) -> Vec<(String, Result<String, HashError>)> {
        use rayon::prelude::*;

        file_paths
            .par_iter()
            .map(|path| {
                let path_str = path.to_string_lossy().to_string();
                (path_str, self.prefix_checksum(path))
            })
            .collect()
    }

    /// Verify if two files have the same content hash.
    pub fn verify_identical_content(&self, file1: &Path, file2: &Path) -> Result<bool, HashError> {
        let hash1 = self.content_hash(file1)?;
        let hash2 = self.content_hash(file2)?;
        Ok(hash1 == hash2)
    }

    fn digest_reader(mut reader: impl Read) -> Result<String, HashError> {
        let mut hasher = Sha256::new();
        let mut buffer = [0; 8192]; // 8KB buffer for efficient reading

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Default for ChecksumService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_is_stable_and_hex() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("book.m4b");
        fs::write(&file_path, b"chapter one").unwrap();

        let checksums = ChecksumService::new();
        let hash = checksums.content_hash(&file_path).unwrap();
        let again = checksums.content_hash(&file_path).unwrap();

        assert_eq!(hash, again);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identical_files_same_hash() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("one.m4b");
        let file2 = temp_dir.path().join("two.m4b");
        fs::write(&file1, b"identical audio bytes").unwrap();
        fs::write(&file2, b"identical audio bytes").unwrap();

        let checksums = ChecksumService::new();
        assert!(checksums.verify_identical_content(&file1, &file2).unwrap());
    }

    #[test]
    fn test_different_files_different_hash() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("one.m4b");
        let file2 = temp_dir.path().join("two.m4b");
        fs::write(&file1, b"recording A").unwrap();
        fs::write(&file2, b"recording B").unwrap();

        let checksums = ChecksumService::new();
        assert!(!checksums.verify_identical_content(&file1, &file2).unwrap());
    }

    #[test]
    fn test_prefix_checksum_ignores_tail_differences() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("one.m4b");
        let file2 = temp_dir.path().join("two.m4b");

        // Same leading bytes beyond PREFIX_LEN, different tails.
        let shared = vec![0x5a_u8; PREFIX_LEN as usize + 16];
        let mut a = shared.clone();
        a.extend_from_slice(b"tail A");
        let mut b = shared;
        b.extend_from_slice(b"completely different tail B");
        fs::write(&file1, &a).unwrap();
        fs::write(&file2, &b).unwrap();

        let checksums = ChecksumService::new();
        assert_eq!(
            checksums.prefix_checksum(&file1).unwrap(),
            checksums.prefix_checksum(&file2).unwrap()
        );
        assert_ne!(
            checksums.content_hash(&file1).unwrap(),
            checksums.content_hash(&file2).unwrap()
        );
    }

    #[test]
    fn test_short_file_prefix_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("tiny.mp3");
        fs::write(&file_path, b"short").unwrap();

        let checksums = ChecksumService::new();
        // Files shorter than the prefix window hash their full content, so
        // prefix and content checksums agree.
        assert_eq!(
            checksums.prefix_checksum(&file_path).unwrap(),
            checksums.content_hash(&file_path).unwrap()
        );
    }

    #[test]
    fn test_batch_hashing() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("one.m4b");
        let file2 = temp_dir.path().join("two.m4b");
        fs::write(&file1, b"content 1").unwrap();
        fs::write(&file2, b"content 2").unwrap();

        let checksums = ChecksumService::new();
        let paths = vec![file1.as_path(), file2.as_path()];
        let results = checksums.content_hashes_batch(&paths);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_ne!(
            results[0].1.as_ref().unwrap(),
            results[1].1.as_ref().unwrap()
        );
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let checksums = ChecksumService::new();
        let result = checksums.content_hash(Path::new("/nonexistent/book.m4b"));
        assert!(matches!(result, Err(HashError::Io(_))));
    }
}
