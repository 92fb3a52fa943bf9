//! Stepwise execution mode.
//!
//! Splits each of the three GPU-offloadable sub-phases — region profiling,
//! candidate decoding, candidate verification — into an explicit
//! `(generate, copy, retrieve)` triplet. `copy`/`retrieve` are no-ops unless
//! the read's [`ProcessingState`] matches the sub-phase they belong to, so a
//! driver loop can call `generate` for read `i+2`, `copy` for `i+1` and
//! `retrieve` for `i` in the same tick without any read blocking another.
//!
//! This crate ships only [`crate::gpu::NullGpuBackend`], whose `submit`/
//! `wait` always fail; `retrieve_*` therefore always falls back to the
//! already-computed CPU result, exercising the `gpu-transient` -> CPU
//! fallback path on every call. A real GPU backend would
//! instead `pull` results assembled by the device between `copy` and
//! `retrieve`.

use crate::align::bpm::verify_tiled;
use crate::align::swg::{SwgAligner, SwgScoringParams};
use crate::align::VerificationOutcome;
use crate::archive::Archive;
use crate::archive::Strand as ArchiveStrand;
use crate::candidates::{
    cluster_positions, decode_positions, dedup_against_verified, FilteringRegion, RegionStatus,
};
use crate::config::SearchConfiguration;
use crate::errors::GemError;
use crate::gpu::{FmiSearchBuffer, FmiSearchItem, GpuBackend, GpuBuffer};
use crate::matches::{IntervalMatch, MatchesContainer, Strand as MatchStrand, TraceMatch};
use crate::pattern::Pattern;
use crate::region_profile::{profile_adaptive, profile_fixed, ProfileClass, RegionProfile};

use super::state_machine::{ApproximateSearch, ProcessingState, SearchStage};
use super::watchdog::CancelToken;

/// One read's stepwise-mode scratch state, carried across `generate`/`copy`/
/// `retrieve` calls by the driver loop instead of being processed
/// start-to-finish in one call.
pub struct StepwiseRead {
    pub id: u64,
    pub pattern: Pattern,
    pub strand: ArchiveStrand,
    pub state: ApproximateSearch,
    profile: Option<RegionProfile>,
    candidates: Vec<FilteringRegion>,
    pub matches: MatchesContainer,
    /// This read's watchdog cancel flag, checked at the top
    /// of each sub-phase and inside the BPM scan. Defaults to a fresh,
    /// never-cancelled token; a driver loop wanting to time out a specific
    /// read clones the token it handed to [`StepwiseRead::new`] and calls
    /// `cancel` on its own copy.
    pub cancel: CancelToken,
}

impl StepwiseRead {
    pub fn new(id: u64, pattern: Pattern, strand: ArchiveStrand) -> StepwiseRead {
        Self::with_cancel(id, pattern, strand, CancelToken::new())
    }

    pub fn with_cancel(
        id: u64,
        pattern: Pattern,
        strand: ArchiveStrand,
        cancel: CancelToken,
    ) -> StepwiseRead {
        let mut state = ApproximateSearch::new();
        state.basic_cases(&pattern);
        StepwiseRead {
            id,
            pattern,
            strand,
            state,
            profile: None,
            candidates: Vec::new(),
            matches: MatchesContainer::new(),
            cancel,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

/// Drives the three stepwise sub-phases against a shared archive/config;
/// holds no per-read state itself so one driver can service many reads.
pub struct StepwiseDriver<'a> {
    pub archive: &'a dyn Archive,
    pub config: &'a SearchConfiguration,
    pub gpu: &'a dyn GpuBackend,
}

impl<'a> StepwiseDriver<'a> {
    pub fn new(
        archive: &'a dyn Archive,
        config: &'a SearchConfiguration,
        gpu: &'a dyn GpuBackend,
    ) -> StepwiseDriver<'a> {
        StepwiseDriver {
            archive,
            config,
            gpu,
        }
    }

    // ---- sub-phase 1: region profile ----------------------------------

    /// Prepares the region profile on the CPU and advances to
    /// `RegionPartitioned`. A no-op for reads not in
    /// [`SearchStage::FilteringAdaptive`] or already past this sub-phase.
    pub fn generate_region_profile(&self, read: &mut StepwiseRead) {
        if read.state.stage != SearchStage::FilteringAdaptive
            || read.state.processing_state != ProcessingState::None
        {
            return;
        }
        let mut profile = profile_adaptive(
            self.archive,
            &read.pattern,
            64,
            0.1,
            self.config.max_candidates_per_seed,
        );
        if profile.num_regions() > self.config.max_region_budget {
            profile = profile_fixed(self.archive, &read.pattern, self.config.max_region_budget);
        }
        read.profile = Some(profile);
        read.state.processing_state = ProcessingState::RegionPartitioned;
    }

    /// Stages each seed's bytes onto the `fmi_search` GPU buffer, if this
    /// read is at the matching sub-state; otherwise no-op.
    pub fn copy_region_profile(&self, read: &StepwiseRead, buffer: &mut dyn FmiSearchBuffer) {
        if read.state.processing_state != ProcessingState::RegionPartitioned {
            return;
        }
        if let Some(profile) = &read.profile {
            for seed in &profile.seeds {
                let bytes = read.pattern.key[seed.read_start..seed.read_end].to_vec();
                if buffer.reserve(1) {
                    buffer.push(FmiSearchItem {
                        seed: bytes,
                        read_id: read.id,
                    });
                }
            }
        }
    }

    /// Classifies the already-computed profile and advances the processing
    /// state accordingly. A real GPU backend would `pull` search results
    /// here instead of reusing the CPU-computed profile.
    pub fn retrieve_region_profile(&self, read: &mut StepwiseRead) {
        if read.state.processing_state != ProcessingState::RegionPartitioned {
            return;
        }
        match read.profile.as_ref().map(|p| p.class) {
            Some(ProfileClass::NoRegions) => {
                read.state.processing_state = ProcessingState::NoRegions;
            }
            Some(ProfileClass::Exact) => {
                read.state.processing_state = ProcessingState::ExactMatches;
            }
            Some(ProfileClass::Partitioned) => {
                read.state.processing_state = ProcessingState::RegionProfiled;
            }
            None => {}
        }
    }

    // ---- sub-phase 2: candidate decode ---------------------------------

    /// Decodes SA intervals to candidate positions and clusters them into
    /// filtering regions. A no-op unless `RegionProfiled`.
    pub fn generate_candidate_decode(&self, read: &mut StepwiseRead) -> Result<(), GemError> {
        if read.state.processing_state != ProcessingState::RegionProfiled {
            return Ok(());
        }
        if read.cancel.is_cancelled() {
            return Err(GemError::Timeout);
        }
        let profile = match &read.profile {
            Some(p) => p,
            None => return Ok(()),
        };
        let mut positions =
            decode_positions(self.archive, profile, self.config.max_candidates_per_seed)?;
        let candidates = cluster_positions(
            self.archive,
            &mut positions,
            read.pattern.len() as u64,
            read.pattern.max_error,
            read.strand,
        )?;
        read.candidates = candidates;
        read.state.processing_state = ProcessingState::CandidatesProcessed;
        Ok(())
    }

    /// `copy`/`retrieve` for candidate decode are trivial once decoding has
    /// run entirely on the CPU in `generate`; a GPU `fmi_decode` buffer
    /// would instead stage raw SA indices here and `retrieve` would collect
    /// decoded positions. Modeled as no-ops since [`Self::generate_candidate_decode`]
    /// already produced the final result.
    pub fn copy_candidate_decode(&self, _read: &StepwiseRead) {}

    pub fn retrieve_candidate_decode(&self, _read: &mut StepwiseRead) {}

    // ---- sub-phase 3: candidate verify ---------------------------------

    /// Runs the BPM filter and SWG aligner over every candidate region not
    /// already covered by a verified region. A no-op unless
    /// `CandidatesProcessed`.
    pub fn generate_candidate_verify(&self, read: &mut StepwiseRead) -> Result<(), GemError> {
        if read.state.processing_state != ProcessingState::CandidatesProcessed {
            return Ok(());
        }
        if read.cancel.is_cancelled() {
            return Err(GemError::Timeout);
        }
        let candidates = dedup_against_verified(std::mem::take(&mut read.candidates), &[]);
        let mut mcs = read
            .profile
            .as_ref()
            .map(|p| p.mcs_lower_bound() as u64)
            .unwrap_or(0);

        for mut region in candidates {
            region.status = match self.verify_region(&read.pattern, &region, &read.cancel)? {
                Some(outcome) => {
                    if let Some(trace) = self.align_region(
                        &read.pattern,
                        &region,
                        outcome,
                        read.strand,
                        &read.cancel,
                    )? {
                        mcs += 1;
                        read.matches.add_trace_match(trace);
                        RegionStatus::Accepted
                    } else {
                        RegionStatus::Verified
                    }
                }
                None => RegionStatus::Discarded,
            };
        }
        read.state.max_complete_stratum = mcs;
        read.matches.max_complete_stratum = mcs;
        read.state.processing_state = ProcessingState::CandidatesVerified;
        Ok(())
    }

    /// `copy`/`retrieve` for candidate verify stage the BPM scan onto the
    /// `align_bpm` GPU buffer in production GEM3; since `generate` already
    /// ran the full BPM+SWG pipeline on the CPU for this crate's
    /// [`crate::gpu::NullGpuBackend`], these are no-ops that exist only to
    /// complete the triplet shape the driver loop expects.
    pub fn copy_candidate_verify(&self, _read: &StepwiseRead) {}

    pub fn retrieve_candidate_verify(&self, read: &mut StepwiseRead) {
        if read.state.processing_state == ProcessingState::CandidatesVerified {
            read.state.try_finish();
        }
    }

    fn verify_region(
        &self,
        pattern: &Pattern,
        region: &FilteringRegion,
        cancel: &CancelToken,
    ) -> Result<Option<VerificationOutcome>, GemError> {
        if cancel.is_cancelled() {
            return Err(GemError::Timeout);
        }
        let slack = pattern.max_error as u64 + 4;
        let begin = region.begin_position.saturating_sub(slack);
        let end = (region.end_position + slack).min(self.archive.n());
        if begin >= end {
            return Ok(None);
        }
        let text = self.archive.text(begin, end)?;
        Ok(match verify_tiled(&pattern.bpm_pattern, text, cancel)? {
            VerificationOutcome::Accepted {
                best_score,
                best_column,
            } => Some(VerificationOutcome::Accepted {
                best_score,
                best_column: begin as usize + best_column,
            }),
            VerificationOutcome::Rejected => None,
        })
    }

    fn align_region(
        &self,
        pattern: &Pattern,
        region: &FilteringRegion,
        outcome: VerificationOutcome,
        strand: ArchiveStrand,
        cancel: &CancelToken,
    ) -> Result<Option<TraceMatch>, GemError> {
        if cancel.is_cancelled() {
            return Err(GemError::Timeout);
        }
        let best_column = match outcome {
            VerificationOutcome::Accepted { best_column, .. } => best_column,
            VerificationOutcome::Rejected => return Ok(None),
        };
        let slack = pattern.max_error as u64 + 4;
        let begin = region.begin_position.saturating_sub(slack);
        let end = (region.end_position + slack).min(self.archive.n());
        if begin >= end {
            return Ok(None);
        }
        let text = self.archive.text(begin, end)?;
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
        let location = self.archive.locate_chromosome(text_position)?;
        Ok(Some(TraceMatch {
            sequence_name: location.name,
            strand: match strand {
                ArchiveStrand::Forward => MatchStrand::Forward,
                ArchiveStrand::Reverse => MatchStrand::Reverse,
            },
            text_position: location.local_pos,
            emulated_rc_search: strand == ArchiveStrand::Reverse,
            distance: alignment.edit_distance,
            edit_distance: alignment.edit_distance,
            swg_score: alignment.score,
            mapq_score: 0,
            cigar: alignment.cigar,
            rescued: false,
        }))
    }

    /// Records an exact match directly from the region profile's single
    /// seed, for reads classified [`ProfileClass::Exact`] or handled via
    /// `no_regions` (terminal, Open Question (b)).
    pub fn finish_basic_case(&self, read: &mut StepwiseRead) -> Result<(), GemError> {
        match read.state.processing_state {
            ProcessingState::NoRegions => {
                read.state.try_finish();
                Ok(())
            }
            ProcessingState::ExactMatches => {
                if let Some(profile) = &read.profile {
                    let seed = profile.seeds[0];
                    read.matches.add_interval_match(IntervalMatch {
                        lo: seed.lo,
                        hi: seed.hi,
                        length: read.pattern.len() as u64,
                        distance: 0,
                        emulated_rc_search: read.strand == ArchiveStrand::Reverse,
                    });
                    for sa_index in seed.lo..seed.hi {
                        let position = self.archive.sa(sa_index)?;
                        let location = self.archive.locate_chromosome(position)?;
                        let cigar = rust_htslib::bam::record::CigarString(vec![
                            rust_htslib::bam::record::Cigar::Match(read.pattern.len() as u32),
                        ]);
                        read.matches.add_trace_match(TraceMatch {
                            sequence_name: location.name,
                            strand: match read.strand {
                                ArchiveStrand::Forward => MatchStrand::Forward,
                                ArchiveStrand::Reverse => MatchStrand::Reverse,
                            },
                            text_position: location.local_pos,
                            emulated_rc_search: read.strand == ArchiveStrand::Reverse,
                            distance: 0,
                            edit_distance: 0,
                            swg_score: read.pattern.len() as i32,
                            mapq_score: 0,
                            cigar,
                            rescued: false,
                        });
                    }
                }
                read.state.try_finish();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Drives one read through every sub-phase to completion, calling
    /// `generate`/`copy`/`retrieve` in order for each — equivalent in
    /// result (not in scheduling) to [`crate::search::workspace::search_single_end`]'s
    /// single-strand inner loop. Used by the stepwise-equivalence property
    /// tests.
    pub fn drive_to_completion(&self, read: &mut StepwiseRead) -> Result<(), GemError> {
        if read.state.stage != SearchStage::FilteringAdaptive {
            // read_recovery / neighborhood are degraded fallbacks outside
            // stepwise mode's filtering-adaptive scope;
            // nothing more to do for this strand.
            read.state.stage = SearchStage::End;
            return Ok(());
        }
        let mut search_buffer = self.gpu.new_fmi_search_buffer(64);
        while !read.is_done() {
            self.generate_region_profile(read);
            self.copy_region_profile(read, search_buffer.as_mut());
            self.retrieve_region_profile(read);
            self.finish_basic_case(read)?;
            if read.is_done() {
                break;
            }
            self.generate_candidate_decode(read)?;
            self.copy_candidate_decode(read);
            self.retrieve_candidate_decode(read);
            self.generate_candidate_verify(read)?;
            self.copy_candidate_verify(read);
            self.retrieve_candidate_verify(read);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::InMemoryArchive;
    use crate::gpu::NullGpuBackend;

    #[test]
    fn stepwise_drive_finds_exact_match() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
        let config = SearchConfiguration::default();
        let gpu = NullGpuBackend;
        let driver = StepwiseDriver::new(&archive, &config, &gpu);

        let pattern = Pattern::new(b"ACGTACGT", &[30; 8], 0, 64).unwrap();
        let mut read = StepwiseRead::new(0, pattern, ArchiveStrand::Forward);
        driver.drive_to_completion(&mut read).unwrap();

        assert!(read.is_done());
        assert!(read.matches.is_mapped());
        assert_eq!(read.matches.best_match().unwrap().text_position, 2);
    }

    #[test]
    fn stepwise_drive_finds_one_mismatch_via_filtering() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
        let config = SearchConfiguration::default();
        let gpu = NullGpuBackend;
        let driver = StepwiseDriver::new(&archive, &config, &gpu);

        let pattern = Pattern::new(b"ACGTTCGT", &[30; 8], 1, 64).unwrap();
        let mut read = StepwiseRead::new(0, pattern, ArchiveStrand::Forward);
        driver.drive_to_completion(&mut read).unwrap();

        read.matches.sort_by_distance();
        assert!(read.is_done());
        let best = read.matches.best_match().unwrap();
        assert_eq!(best.text_position, 2);
        assert_eq!(best.edit_distance, 1);
    }

    #[test]
    fn all_n_read_terminates_with_no_regions() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
        let config = SearchConfiguration::default();
        let gpu = NullGpuBackend;
        let driver = StepwiseDriver::new(&archive, &config, &gpu);

        let pattern = Pattern::new(b"NNNNNNNNNNNN", &[0; 12], 2, 64).unwrap();
        let mut read = StepwiseRead::new(0, pattern, ArchiveStrand::Forward);
        // all-N routes through read_recovery (basic_cases), which stepwise
        // mode does not cover; the loop should terminate immediately
        // without looping forever.
        driver.drive_to_completion(&mut read).unwrap();
        assert!(!read.matches.is_mapped());
    }
}
