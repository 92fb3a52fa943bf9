//! Search state machine and paired-end driving.

pub mod state_machine;
pub mod stepwise;
pub mod watchdog;
pub mod workspace;

pub use state_machine::{ApproximateSearch, ProcessingState, SearchStage};
pub use watchdog::CancelToken;
pub use workspace::{search_single_end, SearchWorkspace};

use crate::align::bpm::verify_tiled;
use crate::align::swg::{SwgAligner, SwgScoringParams};
use crate::align::VerificationOutcome;
use crate::archive::{Archive, Strand};
use crate::candidates::FilteringRegion;
use crate::config::SearchConfiguration;
use crate::errors::GemError;
use crate::matches::{MatchesContainer, Strand as MatchStrand, TraceMatch};
use crate::pattern::Pattern;

/// The outcome of [`map_read`]: whether the read ended up mapped, genuinely
/// unmapped (no surviving candidate cleared the error threshold), or
/// rejected outright for malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Mapped,
    Unmapped,
    Invalid,
}

/// The public single-end search entry point: never surfaces
/// a per-read failure as an error. A malformed read (non-ACGTN bases) is
/// folded into [`SearchStatus::Invalid`] with an empty
/// [`MatchesContainer`]; only [`GemError::ArchiveIo`] escalates, matching
/// the policy that the reference archive is the one collaborator whose
/// failure the worker pool driver must see.
pub fn map_read(
    archive: &dyn Archive,
    sequence: &[u8],
    qualities: &[u8],
    config: &SearchConfiguration,
    cancel: &CancelToken,
) -> Result<(MatchesContainer, SearchStatus), GemError> {
    match search_single_end(archive, sequence, qualities, config, cancel) {
        Ok(workspace) => {
            let status = if workspace.matches.is_mapped() {
                SearchStatus::Mapped
            } else {
                SearchStatus::Unmapped
            };
            Ok((workspace.matches, status))
        }
        Err(GemError::InvalidInput(_)) => Ok((MatchesContainer::new(), SearchStatus::Invalid)),
        Err(other @ GemError::ArchiveIo(_)) => Err(other),
        Err(_) => Ok((MatchesContainer::new(), SearchStatus::Unmapped)),
    }
}

/// Reference slack added on either side of a candidate region's span
/// before fetching its text window, to give the BPM scan room to find an
/// off-center alignment.
fn region_slack(max_error: u32) -> u64 {
    max_error as u64 + 4
}

/// Fetches the candidate region's text window and runs the tiled BPM scan
/// over it. Returns `None` if the region is rejected.
pub(crate) fn verify_region(
    archive: &dyn Archive,
    pattern: &Pattern,
    region: &FilteringRegion,
    max_error: u32,
    cancel: &CancelToken,
) -> Result<Option<VerificationOutcome>, GemError> {
    if cancel.is_cancelled() {
        return Err(GemError::Timeout);
    }
    let slack = region_slack(max_error);
    let begin = region.begin_position.saturating_sub(slack);
    let end = (region.end_position + slack).min(archive.n());
    if begin >= end {
        return Ok(None);
    }
    let text = archive.text(begin, end)?;
    match verify_tiled(&pattern.bpm_pattern, text, cancel)? {
        VerificationOutcome::Accepted { best_score, best_column } => Ok(Some(
            VerificationOutcome::Accepted {
                best_score,
                best_column: begin as usize + best_column,
            },
        )),
        VerificationOutcome::Rejected => Ok(None),
    }
}

/// Runs the banded SWG aligner anchored on the BPM outcome's best column,
/// and converts the result into a [`TraceMatch`] if its recomputed edit
/// distance is within budget.
pub(crate) fn align_region(
    archive: &dyn Archive,
    pattern: &Pattern,
    region: &FilteringRegion,
    outcome: VerificationOutcome,
    strand: Strand,
    cancel: &CancelToken,
) -> Result<Option<TraceMatch>, GemError> {
    if cancel.is_cancelled() {
        return Err(GemError::Timeout);
    }
    let best_column = match outcome {
        VerificationOutcome::Accepted { best_column, .. } => best_column,
        VerificationOutcome::Rejected => return Ok(None),
    };

    let slack = region_slack(pattern.max_error);
    let begin = region.begin_position.saturating_sub(slack);
    let end = (region.end_position + slack).min(archive.n());
    if begin >= end {
        return Ok(None);
    }
    let text = archive.text(begin, end)?;

    let aligner = SwgAligner::new(SwgScoringParams::default(), 3);
    let anchor_column = best_column.saturating_sub(begin as usize);
    let alignment = match aligner.align(&pattern.key, text, anchor_column, pattern.max_error) {
        Some(a) => a,
        None => return Ok(None),
    };

    if alignment.edit_distance > pattern.max_error as u64 {
        return Ok(None);
    }

    let text_position = begin + alignment.text_offset as u64;
    let location = archive.locate_chromosome(text_position)?;

    Ok(Some(TraceMatch {
        sequence_name: location.name,
        strand: match strand {
            Strand::Forward => MatchStrand::Forward,
            Strand::Reverse => MatchStrand::Reverse,
        },
        text_position: location.local_pos,
        emulated_rc_search: strand == Strand::Reverse,
        distance: alignment.edit_distance,
        edit_distance: alignment.edit_distance,
        swg_score: alignment.score,
        mapq_score: 0,
        cigar: alignment.cigar,
        rescued: false,
    }))
}
