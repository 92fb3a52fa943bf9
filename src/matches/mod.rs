//! Matches store & metrics.
//!
//! Interval and trace matches, running metrics, and the matches
//! container, reshaped as Rust sum types and a container indexed by
//! `indexmap::IndexMap`.

pub mod cigar;
pub mod container;
pub mod metrics;

use rust_htslib::bam::record::CigarString;

pub use container::MatchesContainer;
pub use metrics::MatchesMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

/// A match still expressed as an SA interval, not yet decoded to a text
/// position (`match_interval_t`).
#[derive(Debug, Clone)]
pub struct IntervalMatch {
    pub lo: u64,
    pub hi: u64,
    pub length: u64,
    pub distance: u64,
    pub emulated_rc_search: bool,
}

/// A fully decoded, aligned match (`match_trace_t`).
#[derive(Debug, Clone)]
pub struct TraceMatch {
    pub sequence_name: String,
    pub strand: Strand,
    pub text_position: u64,
    pub emulated_rc_search: bool,
    pub distance: u64,
    pub edit_distance: u64,
    pub swg_score: i32,
    pub mapq_score: u8,
    pub cigar: CigarString,
    /// Set by the paired-end coordinator's rescue/extension path: this mate
    /// was never independently filtered, only recovered by scanning a
    /// window around its mapped partner.
    pub rescued: bool,
}

impl TraceMatch {
    /// Reference-consumed span of the alignment: `end - begin` in the
    /// text-space, used to key the begin/end position index tables.
    pub fn reference_span(&self) -> u64 {
        self.cigar
            .iter()
            .map(|op| match op {
                rust_htslib::bam::record::Cigar::Match(n)
                | rust_htslib::bam::record::Cigar::Del(n)
                | rust_htslib::bam::record::Cigar::RefSkip(n)
                | rust_htslib::bam::record::Cigar::Equal(n)
                | rust_htslib::bam::record::Cigar::Diff(n) => *n as u64,
                _ => 0,
            })
            .sum()
    }

    pub fn end_position(&self) -> u64 {
        self.text_position + self.reference_span()
    }
}

/// A match of either provenance: still an unexpanded SA interval, or fully
/// decoded and aligned.
#[derive(Debug, Clone)]
pub enum Match {
    Interval(IntervalMatch),
    Trace(Box<TraceMatch>),
}

impl Match {
    pub fn distance(&self) -> u64 {
        match self {
            Match::Interval(m) => m.distance,
            Match::Trace(m) => m.distance,
        }
    }
}
