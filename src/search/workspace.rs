//! Per-read search workspace: the pattern, candidate
//! regions, matches container, and scratch buffer a single worker thread
//! owns for the lifetime of one read. One workspace per worker, reused
//! across a read's whole pipeline run rather than allocated per stage.

use crate::archive::{Archive, Strand};
use crate::candidates::{
    cluster_positions, decode_positions, dedup_against_verified, FilteringRegion, RegionStatus,
};
use crate::config::SearchConfiguration;
use crate::errors::GemError;
use crate::matches::{IntervalMatch, MatchesContainer, Strand as MatchStrand, TraceMatch};
use crate::pattern::{reverse_complement, Pattern};
use crate::region_profile::{profile_adaptive, profile_fixed, ProfileClass};
use crate::search::state_machine::{ApproximateSearch, ProcessingState, SearchStage};
use crate::search::watchdog::CancelToken;

use super::{align_region, verify_region};

/// Owns the mutable state a worker thread carries across one read's whole
/// C1-C7 pipeline run: the compiled pattern, the region profile, candidate
/// regions at each lifecycle stage, and the accumulated matches.
pub struct SearchWorkspace {
    pub state: ApproximateSearch,
    pub candidate_regions: Vec<FilteringRegion>,
    pub verified_regions: Vec<FilteringRegion>,
    pub matches: MatchesContainer,
}

impl SearchWorkspace {
    pub fn new() -> SearchWorkspace {
        SearchWorkspace {
            state: ApproximateSearch::new(),
            candidate_regions: Vec::new(),
            verified_regions: Vec::new(),
            matches: MatchesContainer::new(),
        }
    }
}

impl Default for SearchWorkspace {
    fn default() -> SearchWorkspace {
        SearchWorkspace::new()
    }
}

/// Runs the full synchronous (non-stepwise) single-end pipeline for one
/// read, searching both the forward strand and its reverse complement.
pub fn search_single_end(
    archive: &dyn Archive,
    sequence: &[u8],
    qualities: &[u8],
    config: &SearchConfiguration,
    cancel: &CancelToken,
) -> Result<SearchWorkspace, GemError> {
    let mut workspace = SearchWorkspace::new();
    let max_error = config.max_error.resolve(sequence.len());

    run_strand(
        archive,
        sequence,
        qualities,
        max_error,
        config,
        Strand::Forward,
        &mut workspace,
        cancel,
    )?;
    let rc_sequence = reverse_complement(sequence);
    let mut rc_qualities = qualities.to_vec();
    rc_qualities.reverse();
    run_strand(
        archive,
        &rc_sequence,
        &rc_qualities,
        max_error,
        config,
        Strand::Reverse,
        &mut workspace,
        cancel,
    )?;

    workspace.matches.sort_by_distance();
    Ok(workspace)
}

fn run_strand(
    archive: &dyn Archive,
    sequence: &[u8],
    qualities: &[u8],
    max_error: u32,
    config: &SearchConfiguration,
    strand: Strand,
    workspace: &mut SearchWorkspace,
    cancel: &CancelToken,
) -> Result<(), GemError> {
    if cancel.is_cancelled() {
        return Err(GemError::Timeout);
    }
    let pattern = Pattern::new(sequence, qualities, max_error, 64)?;
    workspace.state.basic_cases(&pattern);

    if workspace.state.stage != SearchStage::FilteringAdaptive {
        // read_recovery / neighborhood are degraded fallbacks outside this
        // crate's filtering-adaptive scope; nothing more to do for this
        // strand.
        return Ok(());
    }

    let mut profile = profile_adaptive(archive, &pattern, 64, 0.1, config.max_candidates_per_seed);
    if profile.num_regions() > config.max_region_budget {
        profile = profile_fixed(archive, &pattern, config.max_region_budget);
    }

    match profile.class {
        ProfileClass::NoRegions => {
            workspace.state.processing_state = ProcessingState::NoRegions;
            workspace.state.try_finish();
            return Ok(());
        }
        ProfileClass::Exact => {
            workspace.state.processing_state = ProcessingState::ExactMatches;
            let seed = &profile.seeds[0];
            workspace.matches.add_interval_match(IntervalMatch {
                lo: seed.lo,
                hi: seed.hi,
                length: pattern.len() as u64,
                distance: 0,
                emulated_rc_search: strand == Strand::Reverse,
            });
            for sa_index in seed.lo..seed.hi {
                if let Ok(position) = archive.sa(sa_index) {
                    if let Some(trace) = decode_exact_match(archive, position, &pattern, strand)? {
                        workspace.matches.add_trace_match(trace);
                    }
                }
            }
            workspace.state.try_finish();
            return Ok(());
        }
        ProfileClass::Partitioned => {
            workspace.state.processing_state = ProcessingState::RegionPartitioned;
        }
    }

    workspace.state.processing_state = ProcessingState::RegionProfiled;
    let mut positions = decode_positions(archive, &profile, config.max_candidates_per_seed)?;
    let candidates = cluster_positions(archive, &mut positions, pattern.len() as u64, max_error, strand)?;
    let candidates = dedup_against_verified(candidates, &workspace.verified_regions);
    workspace.state.processing_state = ProcessingState::CandidatesProcessed;
    workspace.candidate_regions = candidates;

    let mut mcs = profile.mcs_lower_bound() as u64;
    for mut region in std::mem::take(&mut workspace.candidate_regions) {
        region.status = match verify_region(archive, &pattern, &region, max_error, cancel)? {
            Some(outcome) => {
                if let Some(trace) = align_region(archive, &pattern, &region, outcome, strand, cancel)? {
                    mcs += 1;
                    workspace.matches.add_trace_match(trace);
                    RegionStatus::Accepted
                } else {
                    RegionStatus::Verified
                }
            }
            None => RegionStatus::Discarded,
        };
        workspace.verified_regions.push(region);
    }
    workspace.state.max_complete_stratum = mcs;
    workspace.matches.max_complete_stratum = mcs;
    workspace.state.processing_state = ProcessingState::CandidatesVerified;
    workspace.state.try_finish();
    Ok(())
}

fn decode_exact_match(
    archive: &dyn Archive,
    position: u64,
    pattern: &Pattern,
    strand: Strand,
) -> Result<Option<TraceMatch>, GemError> {
    let location = archive.locate_chromosome(position)?;
    let cigar = rust_htslib::bam::record::CigarString(vec![rust_htslib::bam::record::Cigar::Match(
        pattern.len() as u32,
    )]);
    Ok(Some(TraceMatch {
        sequence_name: location.name,
        strand: match strand {
            Strand::Forward => MatchStrand::Forward,
            Strand::Reverse => MatchStrand::Reverse,
        },
        text_position: location.local_pos,
        emulated_rc_search: strand == Strand::Reverse,
        distance: 0,
        edit_distance: 0,
        swg_score: pattern.len() as i32,
        mapq_score: 0,
        cigar,
        rescued: false,
    }))
}
