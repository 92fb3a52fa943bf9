//! Banded affine-gap SWG aligner.
//!
//! Centers a band of radius `max_error + small constant` on the BPM
//! verifier's best-column anchor and runs `bio::alignment::pairwise`'s
//! semi-global aligner over that window, translating the traceback into a
//! normalized CIGAR via [`crate::matches::cigar::CigarBuilder`], converting
//! `bio::alignment::AlignmentOperation` into a `CigarString`.

use bio::alignment::pairwise::{Aligner, Scoring, MIN_SCORE};
use bio::alignment::AlignmentOperation;
use rust_htslib::bam::record::Cigar;

use crate::matches::cigar::CigarBuilder;
use crate::pattern::SMALL_BAND_CONSTANT;

#[derive(Debug, Clone, Copy)]
pub struct SwgScoringParams {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for SwgScoringParams {
    fn default() -> SwgScoringParams {
        SwgScoringParams {
            match_score: 1,
            mismatch_score: -4,
            gap_open: -6,
            gap_extend: -2,
        }
    }
}

/// A finished alignment: score from the CIGAR source of truth, and the
/// edit distance recomputed from it.
#[derive(Debug, Clone)]
pub struct SwgAlignment {
    pub cigar: rust_htslib::bam::record::CigarString,
    pub score: i32,
    pub edit_distance: u64,
    pub text_offset: usize,
}

pub struct SwgAligner {
    params: SwgScoringParams,
    /// Indels at the read's edges longer than this become soft clips
    /// instead of being reported as indels.
    max_end_indel_length: usize,
}

impl SwgAligner {
    pub fn new(params: SwgScoringParams, max_end_indel_length: usize) -> SwgAligner {
        SwgAligner {
            params,
            max_end_indel_length,
        }
    }

    fn band_window(&self, text: &[u8], anchor_column: usize, pattern_len: usize, max_error: u32) -> (usize, usize) {
        let radius = (max_error + SMALL_BAND_CONSTANT) as usize;
        let begin = anchor_column.saturating_sub(pattern_len + radius);
        let end = (anchor_column + radius).min(text.len());
        (begin, end.max(begin))
    }

    /// Aligns `pattern` against a band of `text` centered on `anchor_column`
    /// (the BPM verifier's best-column hint).
    pub fn align(
        &self,
        pattern: &[u8],
        text: &[u8],
        anchor_column: usize,
        max_error: u32,
    ) -> Option<SwgAlignment> {
        let (begin, end) = self.band_window(text, anchor_column, pattern.len(), max_error);
        let window = &text[begin..end];
        if window.is_empty() || pattern.is_empty() {
            return None;
        }

        let match_score = self.params.match_score;
        let mismatch_score = self.params.mismatch_score;
        let score_fn = move |a: u8, b: u8| if a == b { match_score } else { mismatch_score };
        let scoring = Scoring::new(self.params.gap_open, self.params.gap_extend, score_fn)
            .xclip(MIN_SCORE)
            .yclip(0);
        let mut aligner = Aligner::with_capacity_and_scoring(pattern.len(), window.len(), scoring);
        let alignment = aligner.custom(pattern, window);

        let (cigar, leading_deletion_removed) = self.build_cigar(&alignment.operations)?;
        let edit_distance = edit_distance_from_cigar(&cigar);

        Some(SwgAlignment {
            cigar,
            score: alignment.score,
            edit_distance,
            text_offset: begin + alignment.ystart + leading_deletion_removed as usize,
        })
    }

    /// Builds the normalized CIGAR via [`CigarBuilder`], which strips any
    /// leading/trailing deletion run regardless of length (a deletion can
    /// never legitimately open or close an alignment) and accounts for how
    /// many reference bases it dropped from each end. The leading count is
    /// returned alongside the CIGAR so the caller can shift `text_offset`
    /// forward by that many bases — otherwise a dropped leading deletion
    /// would silently misreport the alignment's reference start.
    fn build_cigar(
        &self,
        operations: &[AlignmentOperation],
    ) -> Option<(rust_htslib::bam::record::CigarString, u32)> {
        let mut builder = CigarBuilder::new(true);
        let runs = run_length_encode(operations);

        for (idx, (op, len)) in runs.iter().enumerate() {
            let is_edge = idx == 0 || idx == runs.len() - 1;
            let cigar_elem = match op {
                AlignmentOperation::Match => Cigar::Match(*len as u32),
                AlignmentOperation::Subst => Cigar::Diff(*len as u32),
                AlignmentOperation::Ins => {
                    if is_edge && *len > self.max_end_indel_length {
                        Cigar::SoftClip(*len as u32)
                    } else {
                        Cigar::Ins(*len as u32)
                    }
                }
                AlignmentOperation::Del => Cigar::Del(*len as u32),
                AlignmentOperation::Xclip(len) => Cigar::SoftClip(*len as u32),
                AlignmentOperation::Yclip(_) => continue,
            };
            builder.add(cigar_elem).ok()?;
        }

        let cigar = builder.make(false).ok()?;
        Some((cigar, builder.leading_deletion_bases_removed()))
    }
}

fn run_length_encode(operations: &[AlignmentOperation]) -> Vec<(AlignmentOperation, usize)> {
    let mut runs: Vec<(AlignmentOperation, usize)> = Vec::new();
    for &op in operations {
        match runs.last_mut() {
            Some((last_op, count)) if *last_op == op => *count += 1,
            _ => runs.push((op, 1)),
        }
    }
    runs
}

/// Recomputes edit distance as the number of non-`=` bases consumed from
/// the CIGAR, the source of truth for edit distance once alignment has run.
pub fn edit_distance_from_cigar(cigar: &rust_htslib::bam::record::CigarString) -> u64 {
    cigar
        .iter()
        .map(|op| match op {
            Cigar::Diff(n) | Cigar::Ins(n) | Cigar::Del(n) => *n as u64,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_yields_zero_edit_distance() {
        let aligner = SwgAligner::new(SwgScoringParams::default(), 5);
        let text = b"NNNNACGTACGTNNNN";
        let alignment = aligner.align(b"ACGTACGT", text, 8, 2).unwrap();
        assert_eq!(alignment.edit_distance, 0);
    }

    #[test]
    fn single_mismatch_is_recomputed_from_cigar() {
        let aligner = SwgAligner::new(SwgScoringParams::default(), 5);
        let text = b"NNNNACGAACGTNNNN";
        let alignment = aligner.align(b"ACGTACGT", text, 8, 2).unwrap();
        assert_eq!(alignment.edit_distance, 1);
    }
}
