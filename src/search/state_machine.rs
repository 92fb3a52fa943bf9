//! Search state machine.
//!
//! Tracks a read's top-level stage and, while inside the filtering-adaptive
//! stage, the finer-grained processing state the candidate pipeline moves
//! through on its way to a finished result.

use crate::pattern::Pattern;

/// Top-level search stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Begin,
    ReadRecovery,
    Neighborhood,
    FilteringAdaptive,
    End,
}

/// Sub-state reached while inside [`SearchStage::FilteringAdaptive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    None,
    RegionPartitioned,
    RegionProfiled,
    CandidatesProcessed,
    CandidatesVerified,
    NoRegions,
    ExactMatches,
}

/// Threshold below which a read is routed to `neighborhood` search instead
/// of the full filtering-adaptive pipeline. Below this length a single
/// BPM/SWG pass over the whole pattern is cheaper than seeding.
pub const NEIGHBORHOOD_LENGTH_THRESHOLD: usize = 8;

/// Fraction of non-canonical bases above which a read is routed to
/// `read_recovery`.
pub const READ_RECOVERY_N_FRACTION: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct ApproximateSearch {
    pub stage: SearchStage,
    pub processing_state: ProcessingState,
    pub max_complete_stratum: u64,
}

impl ApproximateSearch {
    pub fn new() -> ApproximateSearch {
        ApproximateSearch {
            stage: SearchStage::Begin,
            processing_state: ProcessingState::None,
            max_complete_stratum: 0,
        }
    }

    /// Classifies the read into one of the three basic-cases branches,
    /// advancing `stage` accordingly (`approximate_search_filtering_adaptive_basic_cases`).
    pub fn basic_cases(&mut self, pattern: &Pattern) {
        if pattern.is_low_quality(READ_RECOVERY_N_FRACTION) {
            self.stage = SearchStage::ReadRecovery;
        } else if pattern.len() < NEIGHBORHOOD_LENGTH_THRESHOLD {
            self.stage = SearchStage::Neighborhood;
        } else {
            self.stage = SearchStage::FilteringAdaptive;
        }
    }

    /// Once the filtering pipeline settles into `no_regions`,
    /// `exact_matches`, or `candidates_verified`, the search is done.
    pub fn try_finish(&mut self) -> bool {
        match self.processing_state {
            ProcessingState::NoRegions
            | ProcessingState::ExactMatches
            | ProcessingState::CandidatesVerified => {
                self.stage = SearchStage::End;
                true
            }
            _ => false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == SearchStage::End
    }
}

impl Default for ApproximateSearch {
    fn default() -> ApproximateSearch {
        ApproximateSearch::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_quality_read_routes_to_read_recovery() {
        let mut search = ApproximateSearch::new();
        let pattern = Pattern::new(b"NNNNNNNNNNNN", &[0; 12], 2, 64).unwrap();
        search.basic_cases(&pattern);
        assert_eq!(search.stage, SearchStage::ReadRecovery);
    }

    #[test]
    fn short_read_routes_to_neighborhood() {
        let mut search = ApproximateSearch::new();
        let pattern = Pattern::new(b"ACGT", &[30; 4], 0, 64).unwrap();
        search.basic_cases(&pattern);
        assert_eq!(search.stage, SearchStage::Neighborhood);
    }

    #[test]
    fn ordinary_read_routes_to_filtering_adaptive() {
        let mut search = ApproximateSearch::new();
        let pattern = Pattern::new(b"ACGTACGTACGTACGT", &[30; 16], 2, 64).unwrap();
        search.basic_cases(&pattern);
        assert_eq!(search.stage, SearchStage::FilteringAdaptive);
    }

    #[test]
    fn candidates_verified_finishes_search() {
        let mut search = ApproximateSearch::new();
        search.processing_state = ProcessingState::CandidatesVerified;
        assert!(search.try_finish());
        assert!(search.is_done());
    }
}
