//! Matches container for accumulated interval and trace matches.
//!
//! Owns both interval and trace matches, the running distance-stratum
//! counters, and begin/end position index tables (`begin_pos_matches` /
//! `end_pos_matches`), implemented with `indexmap::IndexMap` for
//! deterministic iteration order — important for stable tie-breaking
//! among matches with identical scores.

use std::cmp::Ordering;

use indexmap::IndexMap;

use super::{IntervalMatch, MatchesMetrics, TraceMatch};

#[derive(Debug, Default)]
pub struct MatchesContainer {
    pub max_complete_stratum: u64,
    /// `counters[d]` is the number of live matches (interval + trace) at
    /// edit distance `d`.
    counters: Vec<u64>,
    interval_matches: Vec<IntervalMatch>,
    trace_matches: Vec<TraceMatch>,
    begin_pos_index: IndexMap<u64, usize>,
    end_pos_index: IndexMap<u64, usize>,
    pub metrics: MatchesMetrics,
}

/// `true` if `candidate` is at least as good as `incumbent`: lower edit
/// distance wins outright, ties broken by higher SWG score.
fn at_least_as_good(candidate: &TraceMatch, incumbent: &TraceMatch) -> bool {
    match candidate.edit_distance.cmp(&incumbent.edit_distance) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => candidate.swg_score >= incumbent.swg_score,
    }
}

impl MatchesContainer {
    pub fn new() -> MatchesContainer {
        MatchesContainer::default()
    }

    fn bump_counter(&mut self, distance: u64, delta: i64) {
        let d = distance as usize;
        if self.counters.len() <= d {
            self.counters.resize(d + 1, 0);
        }
        if delta >= 0 {
            self.counters[d] += delta as u64;
        } else {
            self.counters[d] = self.counters[d].saturating_sub((-delta) as u64);
        }
    }

    /// `counters[d]`: the number of matches currently recorded at distance `d`.
    pub fn counters(&self) -> &[u64] {
        &self.counters
    }

    pub fn add_interval_match(&mut self, interval: IntervalMatch) {
        self.bump_counter(interval.distance, 1);
        self.interval_matches.push(interval);
    }

    pub fn interval_matches(&self) -> &[IntervalMatch] {
        &self.interval_matches
    }

    /// Deduplicates by looking up both `begin_pos_index[m.begin]` and
    /// `end_pos_index[m.end]`. If an existing match is found and `trace` is
    /// at least as good, the existing entry is replaced in-place and both
    /// indices are repointed; if an existing match is found and is strictly
    /// better, `trace` is discarded. With no existing match, `trace` is
    /// appended and both indices updated. Returns `true` iff `trace` became
    /// (or remains) the stored entry.
    pub fn add_trace_match(&mut self, trace: TraceMatch) -> bool {
        let existing_idx = self
            .begin_pos_index
            .get(&trace.text_position)
            .or_else(|| self.end_pos_index.get(&trace.end_position))
            .copied();

        match existing_idx {
            Some(idx) => {
                if at_least_as_good(&trace, &self.trace_matches[idx]) {
                    let old = &self.trace_matches[idx];
                    self.bump_counter(old.distance, -1);
                    self.begin_pos_index.shift_remove(&old.text_position);
                    self.end_pos_index.shift_remove(&old.end_position);

                    self.bump_counter(trace.distance, 1);
                    self.metrics.update(trace.edit_distance, trace.swg_score);
                    self.begin_pos_index.insert(trace.text_position, idx);
                    self.end_pos_index.insert(trace.end_position, idx);
                    self.trace_matches[idx] = trace;
                    true
                } else {
                    false
                }
            }
            None => {
                self.bump_counter(trace.distance, 1);
                self.metrics.update(trace.edit_distance, trace.swg_score);
                let end_position = trace.end_position;
                let idx = self.trace_matches.len();
                self.begin_pos_index.insert(trace.text_position, idx);
                self.end_pos_index.insert(end_position, idx);
                self.trace_matches.push(trace);
                true
            }
        }
    }

    pub fn trace_matches(&self) -> &[TraceMatch] {
        &self.trace_matches
    }

    pub fn is_mapped(&self) -> bool {
        !self.trace_matches.is_empty()
    }

    pub fn total_matches_count(&self) -> usize {
        self.trace_matches.len() + self.interval_matches.len()
    }

    /// Sorts trace matches best-first: lower edit distance wins, ties broken
    /// by higher SWG score, then by text position for determinism.
    pub fn sort_by_distance(&mut self) {
        self.trace_matches.sort_by(|a, b| {
            a.edit_distance
                .cmp(&b.edit_distance)
                .then(b.swg_score.cmp(&a.swg_score))
                .then(a.text_position.cmp(&b.text_position))
        });
        self.reindex();
    }

    pub fn sort_by_mapq(&mut self) {
        self.trace_matches.sort_by(|a, b| {
            b.mapq_score
                .cmp(&a.mapq_score)
                .then(a.text_position.cmp(&b.text_position))
        });
        self.reindex();
    }

    fn reindex(&mut self) {
        self.begin_pos_index.clear();
        self.end_pos_index.clear();
        for (idx, trace) in self.trace_matches.iter().enumerate() {
            self.begin_pos_index.insert(trace.text_position, idx);
            self.end_pos_index.insert(trace.end_position, idx);
        }
    }

    /// The minimum-distance / maximum-score entry after sorting; callers
    /// should call [`MatchesContainer::sort_by_distance`] first.
    pub fn best_match(&self) -> Option<&TraceMatch> {
        self.trace_matches.first()
    }

    /// The next distinct match after the primary one, by text position.
    pub fn subdominant_match(&self) -> Option<&TraceMatch> {
        let best = self.trace_matches.first()?;
        self.trace_matches
            .iter()
            .find(|m| m.text_position != best.text_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::Strand;
    use rust_htslib::bam::record::CigarString;

    fn trace(position: u64, edit_distance: u64, swg_score: i32) -> TraceMatch {
        TraceMatch {
            sequence_name: "chr1".to_string(),
            strand: Strand::Forward,
            text_position: position,
            emulated_rc_search: false,
            distance: edit_distance,
            edit_distance,
            swg_score,
            mapq_score: 0,
            cigar: CigarString(vec![rust_htslib::bam::record::Cigar::Match(10)]),
            rescued: false,
        }
    }

    #[test]
    fn better_match_at_same_position_replaces_in_place() {
        let mut container = MatchesContainer::new();
        assert!(container.add_trace_match(trace(100, 1, 90)));
        assert!(container.add_trace_match(trace(100, 0, 100)));
        assert_eq!(container.trace_matches.len(), 1);
        assert_eq!(container.trace_matches[0].edit_distance, 0);
        assert_eq!(container.counters, &[1]);
    }

    #[test]
    fn worse_match_at_same_position_is_discarded() {
        let mut container = MatchesContainer::new();
        assert!(container.add_trace_match(trace(100, 0, 100)));
        assert!(!container.add_trace_match(trace(100, 1, 90)));
        assert_eq!(container.trace_matches.len(), 1);
        assert_eq!(container.trace_matches[0].edit_distance, 0);
    }

    #[test]
    fn counters_track_live_distance_strata() {
        let mut container = MatchesContainer::new();
        container.add_trace_match(trace(100, 0, 100));
        container.add_trace_match(trace(200, 1, 90));
        container.add_interval_match(IntervalMatch {
            lo: 0,
            hi: 1,
            length: 8,
            distance: 1,
            emulated_rc_search: false,
        });
        assert_eq!(container.counters, &[1, 2]);
        assert_eq!(
            container.counters.iter().sum::<u64>(),
            container.total_matches_count() as u64
        );
    }

    #[test]
    fn sort_by_distance_orders_best_first() {
        let mut container = MatchesContainer::new();
        container.add_trace_match(trace(200, 2, 80));
        container.add_trace_match(trace(100, 0, 95));
        container.sort_by_distance();
        assert_eq!(container.trace_matches[0].text_position, 100);
    }
}
