//! Pattern & BPM compiler.
//!
//! Encodes a read into 2-bit symbols, builds the Peq bitmap tables Myers'
//! bit-parallel edit-distance algorithm scans, and precomputes per-tile
//! error budgets. A whole-pattern BPM filter covers the full read while a
//! set of per-tile sub-filters cover fixed-width slices of it.

mod bpm_pattern;
mod kmer_filter;

pub use bpm_pattern::{BpmPattern, PatternTile, PeqTable, WORD_SIZE};
pub use kmer_filter::KmerCountingFilter;

use crate::errors::GemError;

/// The four canonical DNA bases plus the wildcard `N`, in the order used to
/// index [`PeqTable`]'s per-symbol bitvectors.
pub const ALPHABET: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

/// Map a base to its index in [`ALPHABET`], treating anything outside
/// `{A,C,G,T,N}` (case-insensitive) as invalid.
pub fn symbol_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        b'N' => Some(4),
        _ => None,
    }
}

pub fn complement_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

/// An immutable, per-read compiled pattern.
///
/// Compilation only re-runs when `max_error` changes; [`Pattern::new`] is
/// the only constructor and always compiles fresh, so callers that need to
/// recompile for a new `max_error` simply build a new `Pattern`.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub key: Vec<u8>,
    pub quality_mask: Vec<u8>,
    pub max_error: u32,
    pub max_bandwidth: u32,
    pub num_non_can_bases: usize,
    pub bpm_pattern: BpmPattern,
}

impl Pattern {
    pub fn new(
        sequence: &[u8],
        qualities: &[u8],
        max_error: u32,
        tile_length: usize,
    ) -> Result<Pattern, GemError> {
        let mut key = Vec::with_capacity(sequence.len());
        let mut num_non_can_bases = 0usize;
        for &base in sequence {
            let upper = base.to_ascii_uppercase();
            if symbol_index(upper).is_none() {
                return Err(GemError::InvalidInput(format!(
                    "non-ACGTN base {:?} in read",
                    base as char
                )));
            }
            if upper == b'N' {
                num_non_can_bases += 1;
            }
            key.push(upper);
        }
        let bpm_pattern = BpmPattern::compile(&key, max_error, tile_length);
        let max_bandwidth = max_error + SMALL_BAND_CONSTANT;
        Ok(Pattern {
            key,
            quality_mask: qualities.to_vec(),
            max_error,
            max_bandwidth,
            num_non_can_bases,
            bpm_pattern,
        })
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// A pattern is unsuitable for normal filtering when it is mostly `N`
    /// bases; the search state machine routes these to `read_recovery`.
    pub fn is_low_quality(&self, n_fraction_threshold: f32) -> bool {
        if self.key.is_empty() {
            return true;
        }
        (self.num_non_can_bases as f32 / self.key.len() as f32) >= n_fraction_threshold
    }
}

/// Added to `max_error` to obtain the SWG aligner's band radius.
pub const SMALL_BAND_CONSTANT: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_acgtn_bases() {
        let err = Pattern::new(b"ACGTXCGT", &[30; 8], 1, 64).unwrap_err();
        assert!(matches!(err, GemError::InvalidInput(_)));
    }

    #[test]
    fn counts_non_canonical_bases() {
        let p = Pattern::new(b"ACGTNNGT", &[30; 8], 1, 64).unwrap();
        assert_eq!(p.num_non_can_bases, 2);
    }

    #[test]
    fn all_n_pattern_is_low_quality() {
        let p = Pattern::new(b"NNNNNNNN", &[0; 8], 1, 64).unwrap();
        assert!(p.is_low_quality(0.5));
    }

    #[test]
    fn reverse_complement_round_trips() {
        let seq = b"ACGTACGT";
        let rc = reverse_complement(seq);
        assert_eq!(rc, b"ACGTACGT"); // palindromic under complement
        let rc2 = reverse_complement(b"AACCGGTT");
        assert_eq!(rc2, b"AACCGGTT");
        let rc3 = reverse_complement(b"ACGTT");
        assert_eq!(rc3, b"AACGT");
    }
}
