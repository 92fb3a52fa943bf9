//! Paired-end coordinator.
//!
//! Runs two single-end searches through candidate generation independently,
//! then cross-filters: a candidate region on end1 survives iff some
//! candidate region on end2 lies within the template window and its
//! relative orientation matches one of the configured [`Orientation`]
//! values. Only survivors get verified and aligned.

use itertools::Itertools;

use crate::archive::{Archive, Strand};
use crate::candidates::{FilteringRegion, RegionStatus};
use crate::config::SearchConfiguration;
use crate::errors::GemError;
use crate::matches::{MatchesContainer, Strand as MatchStrand, TraceMatch};
use crate::pattern::Pattern;
use crate::search::{align_region, search_single_end, verify_region, CancelToken};

/// Relative strand arrangement of the two mates, matching the four
/// conventional paired-end library layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Mate1 forward, mate2 reverse, mate1 upstream of mate2.
    ForwardReverse,
    /// Mate1 reverse, mate2 forward, mate2 upstream of mate1.
    ReverseForward,
    /// Both mates on the forward strand.
    ForwardForward,
    /// Both mates on the reverse strand.
    ReverseReverse,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Orientation> {
        match value.to_ascii_uppercase().as_str() {
            "FR" => Some(Orientation::ForwardReverse),
            "RF" => Some(Orientation::ReverseForward),
            "FF" => Some(Orientation::ForwardForward),
            "RR" => Some(Orientation::ReverseReverse),
            _ => None,
        }
    }

    /// Whether `(strand1, upstream)` matches this orientation, where
    /// `upstream` is `true` when mate1's candidate region begins at or
    /// before mate2's.
    fn matches(&self, strand1: Strand, strand2: Strand, mate1_upstream: bool) -> bool {
        match self {
            Orientation::ForwardReverse => {
                strand1 == Strand::Forward && strand2 == Strand::Reverse && mate1_upstream
            }
            Orientation::ReverseForward => {
                strand1 == Strand::Reverse && strand2 == Strand::Forward && !mate1_upstream
            }
            Orientation::ForwardForward => strand1 == Strand::Forward && strand2 == Strand::Forward,
            Orientation::ReverseReverse => strand1 == Strand::Reverse && strand2 == Strand::Reverse,
        }
    }
}

/// The admissible template span, inclusive, and the orientations accepted
/// within it (`pair_min`/`pair_max`/`pair_orientations` in
/// [`crate::config::SearchConfiguration`]).
#[derive(Debug, Clone)]
pub struct TemplateWindow {
    pub min: u64,
    pub max: u64,
    pub orientations: Vec<Orientation>,
}

impl TemplateWindow {
    pub fn new(min: u64, max: u64, orientations: Vec<Orientation>) -> TemplateWindow {
        TemplateWindow {
            min,
            max,
            orientations,
        }
    }

    fn template_length(begin1: u64, end1: u64, begin2: u64, end2: u64) -> u64 {
        let lo = begin1.min(begin2);
        let hi = end1.max(end2);
        hi.saturating_sub(lo)
    }

    /// Whether the pair `(region1, region2)` satisfies this window: its
    /// template span falls in `[min, max]` and the relative strand
    /// arrangement matches one of the configured orientations.
    pub fn accepts(&self, region1: &FilteringRegion, region2: &FilteringRegion) -> bool {
        let length = Self::template_length(
            region1.begin_position,
            region1.end_position,
            region2.begin_position,
            region2.end_position,
        );
        if length < self.min || length > self.max {
            return false;
        }
        let mate1_upstream = region1.begin_position <= region2.begin_position;
        self.orientations
            .iter()
            .any(|o| o.matches(region1.strand, region2.strand, mate1_upstream))
    }

    /// Same test as [`TemplateWindow::accepts`], against a pair of aligned
    /// [`TraceMatch`]es rather than pre-verification candidate regions —
    /// used once both mates have already been searched independently.
    pub fn accepts_matches(&self, m1: &TraceMatch, m2: &TraceMatch) -> bool {
        if m1.sequence_name != m2.sequence_name {
            return false;
        }
        let length = Self::template_length(
            m1.text_position,
            m1.end_position,
            m2.text_position,
            m2.end_position,
        );
        if length < self.min || length > self.max {
            return false;
        }
        let mate1_upstream = m1.text_position <= m2.text_position;
        self.orientations.iter().any(|o| {
            o.matches(
                archive_strand(m1.strand),
                archive_strand(m2.strand),
                mate1_upstream,
            )
        })
    }
}

fn archive_strand(s: MatchStrand) -> Strand {
    match s {
        MatchStrand::Forward => Strand::Forward,
        MatchStrand::Reverse => Strand::Reverse,
    }
}

/// Cross-filters end1's candidate regions against end2's, keeping only
/// those with at least one compatible partner within the template window.
/// Returns the surviving `(end1_region, end2_region)` index pairs.
pub fn cross_filter(
    window: &TemplateWindow,
    end1_regions: &[FilteringRegion],
    end2_regions: &[FilteringRegion],
) -> Vec<(usize, usize)> {
    let mut survivors = Vec::new();
    for (i, r1) in end1_regions.iter().enumerate() {
        for (j, r2) in end2_regions.iter().enumerate() {
            if window.accepts(r1, r2) {
                survivors.push((i, j));
            }
        }
    }
    survivors
}

/// Scans a `[pos - t_max, pos + t_max]` reference window around a confident
/// match with the BPM verifier (and, on acceptance, the SWG aligner) using
/// the unmapped mate's pattern, recovering it without its own independent
/// filtering pass. Returns `None` if no acceptable alignment is found in
/// the window.
pub fn rescue_mate(
    archive: &dyn Archive,
    unmapped_pattern: &Pattern,
    expected_strand: Strand,
    anchor: &TraceMatch,
    window: &TemplateWindow,
    cancel: &CancelToken,
) -> Result<Option<TraceMatch>, GemError> {
    let begin = anchor.text_position.saturating_sub(window.max);
    let end = anchor.text_position + window.max + unmapped_pattern.len() as u64;
    let region = FilteringRegion {
        begin_position: begin,
        end_position: end.min(archive.n()),
        strand: expected_strand,
        status: RegionStatus::Pending,
        errors_committed: 0,
    };
    let max_error = unmapped_pattern.max_error;
    match verify_region(archive, unmapped_pattern, &region, max_error, cancel)? {
        Some(outcome) => {
            let trace =
                align_region(archive, unmapped_pattern, &region, outcome, expected_strand, cancel)?;
            Ok(trace.map(|mut t| {
                t.rescued = true;
                t
            }))
        }
        None => Ok(None),
    }
}

/// A finished template: both mates' traces plus the derived insert size,
/// used to rank candidate pairings.
#[derive(Debug, Clone)]
pub struct PairedTemplate {
    pub end1: TraceMatch,
    pub end2: TraceMatch,
    pub observed_insert: u64,
    pub expected_insert: u64,
}

impl PairedTemplate {
    pub fn joint_edit_distance(&self) -> u64 {
        self.end1.edit_distance + self.end2.edit_distance
    }

    pub fn joint_swg_score(&self) -> i32 {
        self.end1.swg_score + self.end2.swg_score
    }

    fn insert_deviation(&self) -> u64 {
        self.observed_insert.abs_diff(self.expected_insert)
    }
}

/// Sorts templates best-first: highest joint SWG score, then lowest joint
/// edit distance, then smallest deviation from the expected insert size.
pub fn sort_templates(templates: Vec<PairedTemplate>) -> Vec<PairedTemplate> {
    templates
        .into_iter()
        .sorted_by(|a, b| {
            b.joint_swg_score()
                .cmp(&a.joint_swg_score())
                .then(a.joint_edit_distance().cmp(&b.joint_edit_distance()))
                .then(a.insert_deviation().cmp(&b.insert_deviation()))
        })
        .collect()
}

/// Joint mapping quality for a template: bounded to `[0, 60]` like single-end
/// MAPQ, derived from how far the best template's joint score separates
/// from the runner-up's.
pub fn joint_mapq(best: &PairedTemplate, second_best: Option<&PairedTemplate>) -> u8 {
    match second_best {
        None => 60,
        Some(second) => {
            let gap = best.joint_swg_score().saturating_sub(second.joint_swg_score());
            gap.clamp(0, 60) as u8
        }
    }
}

/// The outcome of one [`PairedEndCoordinator::search`] call: every compatible
/// template found, best-first, plus each mate's independently-searched
/// matches, for callers that want the unpaired fallback on a template miss.
#[derive(Debug)]
pub struct PairedSearchResult {
    pub templates: Vec<PairedTemplate>,
    pub end1_matches: MatchesContainer,
    pub end2_matches: MatchesContainer,
}

impl PairedSearchResult {
    /// The best template and, when more than one exists, the runner-up used
    /// to compute [`joint_mapq`].
    pub fn best(&self) -> Option<(&PairedTemplate, u8)> {
        let best = self.templates.first()?;
        let mapq = joint_mapq(best, self.templates.get(1));
        Some((best, mapq))
    }
}

/// Drives one pair of reads end to end: runs both mates' independent
/// pipelines, pairs their matches within the template window, attempts
/// rescue when one mate maps and the other doesn't, and ranks the
/// resulting templates.
pub struct PairedEndCoordinator<'a> {
    archive: &'a dyn Archive,
    config: &'a SearchConfiguration,
    window: TemplateWindow,
}

impl<'a> PairedEndCoordinator<'a> {
    pub fn new(archive: &'a dyn Archive, config: &'a SearchConfiguration) -> PairedEndCoordinator<'a> {
        let window = TemplateWindow::new(
            config.pair_min,
            config.pair_max,
            config.pair_orientations.iter().copied().collect(),
        );
        PairedEndCoordinator {
            archive,
            config,
            window,
        }
    }

    pub fn search(
        &self,
        sequence1: &[u8],
        qualities1: &[u8],
        sequence2: &[u8],
        qualities2: &[u8],
        cancel: &CancelToken,
    ) -> Result<PairedSearchResult, GemError> {
        let mut end1 = search_single_end(self.archive, sequence1, qualities1, self.config, cancel)?;
        let mut end2 = search_single_end(self.archive, sequence2, qualities2, self.config, cancel)?;

        let mut templates = self.build_templates(&end1.matches, &end2.matches);

        if templates.is_empty() {
            if let Some(anchor) = end1.matches.best_match().cloned() {
                if !end2.matches.is_mapped() {
                    if let Some(rescued) = rescue_mate(
                        self.archive,
                        &self.pattern_for(sequence2, qualities2)?,
                        archive_strand(anchor.strand),
                        &anchor,
                        &self.window,
                        cancel,
                    )? {
                        end2.matches.add_trace_match(rescued.clone());
                        templates.push(self.template_for(anchor, rescued));
                    }
                }
            } else if let Some(anchor) = end2.matches.best_match().cloned() {
                if !end1.matches.is_mapped() {
                    if let Some(rescued) = rescue_mate(
                        self.archive,
                        &self.pattern_for(sequence1, qualities1)?,
                        archive_strand(anchor.strand),
                        &anchor,
                        &self.window,
                        cancel,
                    )? {
                        end1.matches.add_trace_match(rescued.clone());
                        templates.push(self.template_for(rescued, anchor));
                    }
                }
            }
        }

        Ok(PairedSearchResult {
            templates: sort_templates(templates),
            end1_matches: end1.matches,
            end2_matches: end2.matches,
        })
    }

    fn pattern_for(&self, sequence: &[u8], qualities: &[u8]) -> Result<Pattern, GemError> {
        let max_error = self.config.max_error.resolve(sequence.len());
        Pattern::new(sequence, qualities, max_error, 64)
    }

    fn build_templates(&self, end1: &MatchesContainer, end2: &MatchesContainer) -> Vec<PairedTemplate> {
        let mut templates = Vec::new();
        for m1 in end1.trace_matches() {
            for m2 in end2.trace_matches() {
                if self.window.accepts_matches(m1, m2) {
                    templates.push(self.template_for(m1.clone(), m2.clone()));
                }
            }
        }
        templates
    }

    fn template_for(&self, end1: TraceMatch, end2: TraceMatch) -> PairedTemplate {
        let observed_insert =
            end1.end_position.max(end2.end_position) - end1.text_position.min(end2.text_position);
        PairedTemplate {
            end1,
            end2,
            observed_insert,
            expected_insert: (self.config.pair_min + self.config.pair_max) / 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::InMemoryArchive;
    use rust_htslib::bam::record::{Cigar, CigarString};

    fn region(begin: u64, end: u64, strand: Strand) -> FilteringRegion {
        FilteringRegion {
            begin_position: begin,
            end_position: end,
            strand,
            status: RegionStatus::Pending,
            errors_committed: 0,
        }
    }

    #[test]
    fn accepts_fr_orientation_within_window() {
        let window = TemplateWindow::new(150, 250, vec![Orientation::ForwardReverse]);
        let r1 = region(1000, 1050, Strand::Forward);
        let r2 = region(1150, 1200, Strand::Reverse);
        assert!(window.accepts(&r1, &r2));
    }

    #[test]
    fn rejects_template_length_outside_window() {
        let window = TemplateWindow::new(150, 250, vec![Orientation::ForwardReverse]);
        let r1 = region(1000, 1050, Strand::Forward);
        let r2 = region(2000, 2050, Strand::Reverse);
        assert!(!window.accepts(&r1, &r2));
    }

    #[test]
    fn rejects_mismatched_orientation() {
        let window = TemplateWindow::new(150, 250, vec![Orientation::ForwardReverse]);
        let r1 = region(1000, 1050, Strand::Reverse);
        let r2 = region(1150, 1200, Strand::Forward);
        assert!(!window.accepts(&r1, &r2));
    }

    #[test]
    fn cross_filter_finds_compatible_pairs() {
        let window = TemplateWindow::new(150, 250, vec![Orientation::ForwardReverse]);
        let end1 = vec![region(1000, 1050, Strand::Forward)];
        let end2 = vec![
            region(1150, 1200, Strand::Reverse),
            region(5000, 5050, Strand::Reverse),
        ];
        let survivors = cross_filter(&window, &end1, &end2);
        assert_eq!(survivors, vec![(0, 0)]);
    }

    fn trace(position: u64, edit_distance: u64, swg_score: i32) -> TraceMatch {
        TraceMatch {
            sequence_name: "chr1".to_string(),
            strand: crate::matches::Strand::Forward,
            text_position: position,
            emulated_rc_search: false,
            distance: edit_distance,
            edit_distance,
            swg_score,
            mapq_score: 0,
            cigar: CigarString(vec![Cigar::Match(8)]),
            rescued: false,
        }
    }

    #[test]
    fn rescue_recovers_mate_in_template_window() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNNNACGTACGTNNNNNNNN")]);
        let anchor = trace(0, 0, 8);
        let window = TemplateWindow::new(0, 20, vec![Orientation::ForwardReverse]);
        let pattern = Pattern::new(b"ACGTACGT", &[30; 8], 0, 64).unwrap();
        let rescued = rescue_mate(
            &archive,
            &pattern,
            Strand::Forward,
            &anchor,
            &window,
            &CancelToken::new(),
        )
        .unwrap()
        .expect("expected a rescued match");
        assert!(rescued.rescued);
        assert_eq!(rescued.edit_distance, 0);
    }

    #[test]
    fn sort_templates_orders_by_joint_score_then_distance() {
        let worse = PairedTemplate {
            end1: trace(100, 1, 80),
            end2: trace(300, 1, 80),
            observed_insert: 200,
            expected_insert: 200,
        };
        let better = PairedTemplate {
            end1: trace(100, 0, 95),
            end2: trace(300, 0, 95),
            observed_insert: 200,
            expected_insert: 200,
        };
        let sorted = sort_templates(vec![worse, better]);
        assert_eq!(sorted[0].joint_edit_distance(), 0);
    }

    #[test]
    fn joint_mapq_is_bounded_and_maximal_with_no_competitor() {
        let template = PairedTemplate {
            end1: trace(100, 0, 95),
            end2: trace(300, 0, 95),
            observed_insert: 200,
            expected_insert: 200,
        };
        assert_eq!(joint_mapq(&template, None), 60);
    }
}
