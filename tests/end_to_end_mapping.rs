//! End-to-end mapping scenarios and cross-cutting invariants, exercised
//! through the public [`gem3_mapper::search::map_read`] and
//! [`gem3_mapper::paired::PairedEndCoordinator`] entry points against an
//! [`InMemoryArchive`].

use gem3_mapper::archive::InMemoryArchive;
use gem3_mapper::config::SearchConfiguration;
use gem3_mapper::paired::{Orientation, PairedEndCoordinator};
use gem3_mapper::pattern::KmerCountingFilter;
use gem3_mapper::search::{map_read, CancelToken, SearchStatus};

fn config(max_error: u32) -> SearchConfiguration {
    SearchConfiguration {
        max_error: gem3_mapper::config::ErrorBudget::Absolute(max_error),
        ..SearchConfiguration::default()
    }
}

/// Exact match, `max_error=0`, one trace-match at pos 2.
#[test]
fn exact_match_reports_single_trace_at_expected_position() {
    let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
    let cfg = config(0);
    let (matches, status) = map_read(
        &archive,
        b"ACGTACGT",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(status, SearchStatus::Mapped);
    let best = matches.best_match().unwrap();
    assert_eq!(best.text_position, 2);
    assert_eq!(best.edit_distance, 0);
    assert_eq!(best.cigar.to_string(), "8M");
}

/// Single mismatch at offset 4, `max_error=1`.
#[test]
fn single_mismatch_is_recovered_via_filtering() {
    let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
    let cfg = config(1);
    let (mut matches, status) = map_read(
        &archive,
        b"ACGTTCGT",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(status, SearchStatus::Mapped);
    matches.sort_by_distance();
    let best = matches.best_match().unwrap();
    assert_eq!(best.text_position, 2);
    assert_eq!(best.edit_distance, 1);
}

/// Two matches at distances 0 and 1; counters and MCS reflect both.
#[test]
fn two_strata_are_both_reported_with_consistent_counters() {
    let archive =
        InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNNACGTAGGTNN")]);
    let cfg = config(1);
    let (mut matches, status) = map_read(
        &archive,
        b"ACGTACGT",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(status, SearchStatus::Mapped);
    matches.sort_by_distance();
    assert!(matches.trace_matches().len() >= 2);
    let exact = &matches.trace_matches()[0];
    assert_eq!(exact.text_position, 2);
    assert_eq!(exact.edit_distance, 0);
    let approximate = &matches.trace_matches()[1];
    assert_eq!(approximate.edit_distance, 1);
    assert_ne!(approximate.text_position, exact.text_position);
    assert!(matches.counters().len() >= 2);
    assert_eq!(matches.counters()[0], 1);
    assert!(matches.max_complete_stratum >= 2);
}

/// An all-N read is unmapped with no candidates generated.
#[test]
fn all_n_read_is_unmapped() {
    let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
    let cfg = config(1);
    let (matches, status) = map_read(
        &archive,
        b"NNNNNNNN",
        &[0; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(status, SearchStatus::Unmapped);
    assert!(!matches.is_mapped());
    assert_eq!(matches.max_complete_stratum, 0);
}

/// paired-end FR template with a ~180bp insert inside
/// `[150,250]`. Mate1 reads the forward strand; mate2's genomic locus
/// carries `reverse_complement(mate2_read)`, so mate2 only matches via its
/// reverse-complement search (`strand = Reverse`), giving a forward/reverse
/// arrangement with mate1 upstream.
#[test]
fn paired_end_reports_one_joint_zero_distance_template() {
    let mut reference = vec![b'N'; 20];
    reference.extend_from_slice(b"AAAACCCC");
    reference.extend_from_slice(&vec![b'N'; 164]);
    reference.extend_from_slice(b"AAAACCCC"); // reverse_complement("GGGGTTTT")
    reference.extend_from_slice(&vec![b'N'; 20]);

    let archive = InMemoryArchive::from_chromosomes(&[("chr1", &reference)]);
    let mut cfg = config(0);
    cfg.pair_min = 150;
    cfg.pair_max = 250;
    cfg.pair_orientations = std::iter::once(Orientation::ForwardReverse).collect();

    let coordinator = PairedEndCoordinator::new(&archive, &cfg);
    let result = coordinator
        .search(
            b"AAAACCCC",
            &[30; 8],
            b"GGGGTTTT",
            &[30; 8],
            &CancelToken::new(),
        )
        .unwrap();
    let (template, _mapq) = result.best().expect("expected a paired template");
    assert_eq!(template.joint_edit_distance(), 0);
    assert_eq!(template.end1.text_position, 20);
    assert_eq!(template.end2.text_position, 192);
}

/// The k-mer filter's lossiness depends on its granularity. A
/// text that is a reordering of the pattern's bases (same base composition,
/// different local context) has zero deficit under a `K=1` histogram but a
/// full deficit under `K=3`, since none of its 3-mers recur in the pattern.
/// Documents that a tighter `K` can reject a text a looser one would admit.
#[test]
fn kmer_filter_lossiness_depends_on_k() {
    let pattern = b"ACGTACGTACGT";
    let reordered_text = b"TGCATGCATGCA";

    let loose = KmerCountingFilter::new(pattern, 1);
    assert_eq!(loose.mismatching_kmer_count(reordered_text), 0);
    assert!(!loose.reject(reordered_text, 0));

    let tight = KmerCountingFilter::new(pattern, 3);
    assert!(tight.mismatching_kmer_count(reordered_text) > 0);
    assert!(tight.reject(reordered_text, 0));
}

/// Every reported edit distance matches the CIGAR recomputation, and is
/// within the configured budget.
#[test]
fn reported_edit_distance_is_within_budget() {
    let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
    let cfg = config(1);
    let (matches, _status) = map_read(
        &archive,
        b"ACGTTCGT",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    for m in matches.trace_matches() {
        assert!(m.edit_distance <= cfg.max_error.resolve(8) as u64);
    }
}

/// After dedup, no two trace-matches share both begin and end.
#[test]
fn dedup_produces_unique_begin_end_pairs() {
    let archive =
        InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNNACGTAGGTNN")]);
    let cfg = config(1);
    let (matches, _status) = map_read(
        &archive,
        b"ACGTACGT",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    let mut seen = std::collections::HashSet::new();
    for m in matches.trace_matches() {
        let key = (m.text_position, m.end_position);
        assert!(seen.insert(key), "duplicate (begin,end) pair survived dedup");
    }
}

/// `Σ counters[d] == |trace_matches| + |interval_matches|`.
#[test]
fn counters_sum_matches_total_match_count() {
    let archive =
        InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNNACGTAGGTNN")]);
    let cfg = config(1);
    let (matches, _status) = map_read(
        &archive,
        b"ACGTACGT",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    let counter_sum: u64 = matches.counters().iter().sum();
    assert_eq!(counter_sum, matches.total_matches_count() as u64);
}

/// reverse-complement symmetry. Mapping `r` and mapping
/// `reverse_complement(r)` report the same underlying text position, since
/// the second search locates the very same locus via its own internal
/// reverse-strand pass.
#[test]
fn reverse_complement_search_finds_the_same_locus() {
    let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNAAAACCCCNN")]);
    let cfg = config(0);
    let (matches_fwd, _) = map_read(
        &archive,
        b"AAAACCCC",
        &[30; 8],
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();
    let rc = gem3_mapper::pattern::reverse_complement(b"AAAACCCC");
    let (matches_rc, _) = map_read(&archive, &rc, &[30; 8], &cfg, &CancelToken::new()).unwrap();

    let fwd_best = matches_fwd.best_match().unwrap();
    let rc_best = matches_rc.best_match().unwrap();
    assert_eq!(fwd_best.text_position, rc_best.text_position);
    assert_eq!(fwd_best.text_position, 2);
}

/// A watchdog cancelled before search starts reports the read unmapped
/// rather than propagating the cancellation as a hard error.
#[test]
fn cancelled_watchdog_yields_unmapped_not_an_error() {
    let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
    let cfg = config(1);
    let cancel = CancelToken::new();
    cancel.cancel();
    let (matches, status) = map_read(&archive, b"ACGTACGT", &[30; 8], &cfg, &cancel).unwrap();
    assert_eq!(status, SearchStatus::Unmapped);
    assert!(!matches.is_mapped());
}
