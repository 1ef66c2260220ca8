//! Fuzzy similarity between labels.

use crate::core::normalize::normalize;

/// Similarity ratio between two raw labels, in `[0, 1]`.
///
/// Both inputs are normalized first, then scored with the Ratcliff/Obershelp
/// ratio: `2 * matches / (len(a) + len(b))`, where `matches` counts the
/// characters covered by recursively extracted longest common substrings.
/// Returns `1.0` for identical normalized strings and `0.0` when either
/// normalized string is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // Fix the argument order so the ratio is symmetric.
    let (x, y) = if a <= b { (a, b) } else { (b, a) };
    let x: Vec<char> = x.chars().collect();
    let y: Vec<char> = y.chars().collect();
    let matches = matching_chars(&x, &y);
    2.0 * matches as f64 / (x.len() + y.len()) as f64
}

/// Total length of the non-overlapping matching blocks: take the longest
/// common substring, then recurse on the pieces to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (ai, bi, size) = longest_match(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_chars(&a[..ai], &b[..bi])
        + matching_chars(&a[ai + size..], &b[bi + size..])
}

/// Longest common substring of `a` and `b` as `(start_a, start_b, len)`,
/// preferring the earliest occurrence in `a`, then in `b`.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let run = prev[j] + 1;
                cur[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        prev = cur;
    }
    best
}
