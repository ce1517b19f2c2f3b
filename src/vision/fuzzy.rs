//! Normalized string similarity for OCR output.
//!
//! OCR drops and merges characters far more often than it reorders them, so
//! the score is built on the longest common subsequence (indel distance)
//! rather than edit distance with substitutions.

use serde::Serialize;

/// Outcome of comparing observed text with an expected target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    pub observed_text: String,
    /// Similarity in `[0, 100]`
    pub confidence: f64,
}

/// Similarity of `a` and `b` in `[0, 100]`: `200 * lcs / (len_a + len_b)`
/// over Unicode scalar values. Symmetric, and 100 exactly when equal.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    (200.0 * lcs_len(&a, &b) as f64) / total as f64
}

/// Length of the longest common subsequence, O(n*m) time, O(min(n,m)) space
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; short.len() + 1];
    for &lc in long {
        let mut diag = 0;
        for (j, &sc) in short.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if lc == sc {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    row[short.len()]
}

/// Compare `observed` with `target`; matched when similarity >= `threshold`
pub fn fuzzy_match(observed: &str, target: &str, threshold: f64) -> MatchResult {
    let observed = observed.trim();
    let confidence = similarity(observed, target);
    MatchResult {
        matched: confidence >= threshold,
        observed_text: observed.to_string(),
        confidence,
    }
}
