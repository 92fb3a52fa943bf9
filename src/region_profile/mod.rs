//! Region profile.
//!
//! Partitions the read into non-overlapping high-quality seeds by scanning
//! left-to-right and opening a new seed whenever the current one's SA
//! interval becomes cheap enough to decode, or a fixed maximum seed length
//! is reached. "Adaptive" profiling additionally terminates a seed early
//! once its interval drops below a decode-cheap threshold; "fixed"
//! profiling falls back to equal-width seeds when adaptive profiling can't
//! produce enough seeds for the required stratum.

use crate::archive::Archive;
use crate::fm_index::seed_search::SearchCursor;
use crate::pattern::Pattern;

/// One seed of the region profile: its extent within the read, its SA
/// interval, and the errors it was allowed to accrue while being extended.
#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub read_start: usize,
    pub read_end: usize,
    pub lo: u64,
    pub hi: u64,
    pub errors_allowed: u32,
}

impl Seed {
    pub fn interval_size(&self) -> u64 {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty_interval(&self) -> bool {
        self.hi <= self.lo
    }

    pub fn len(&self) -> usize {
        self.read_end - self.read_start
    }
}

/// Classification of a read after profiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileClass {
    /// Filter output is empty: no seed yielded a non-empty interval.
    NoRegions,
    /// A single seed covers the whole read with interval size > 0.
    Exact,
    /// Neither of the above: the read was split into multiple seeds.
    Partitioned,
}

#[derive(Debug, Clone)]
pub struct RegionProfile {
    pub seeds: Vec<Seed>,
    pub class: ProfileClass,
    /// Whether fixed (equal-width) partitioning was used, as opposed to
    /// adaptive early-termination seeding.
    pub used_fixed_partitioning: bool,
}

impl RegionProfile {
    pub fn num_regions(&self) -> usize {
        self.seeds.len()
    }

    /// The MCS lower-bound immediately after profiling equals the number of
    /// filtering regions with zero errors.
    pub fn mcs_lower_bound(&self) -> u32 {
        self.seeds
            .iter()
            .filter(|s| s.errors_allowed == 0 && !s.is_empty_interval())
            .count() as u32
    }
}

/// Decode-cheap threshold: a seed is closed once its interval size drops to
/// or below `sampling_rate * max_candidates_per_seed`.
fn decode_cheap_threshold(sampling_rate: f64, max_candidates_per_seed: u64) -> u64 {
    ((sampling_rate * max_candidates_per_seed as f64).ceil() as u64).max(1)
}

/// Adaptive profiling: scan left to right, extending the current seed one
/// base at a time and closing it as soon as its interval is cheap to decode
/// or it reaches `max_seed_length`.
pub fn profile_adaptive(
    archive: &dyn Archive,
    pattern: &Pattern,
    max_seed_length: usize,
    sampling_rate: f64,
    max_candidates_per_seed: u64,
) -> RegionProfile {
    let threshold = decode_cheap_threshold(sampling_rate, max_candidates_per_seed);
    let key = &pattern.key;
    let mut seeds = Vec::new();
    let mut pos = 0usize;

    while pos < key.len() {
        let mut cursor = SearchCursor::full(archive);
        let mut end = pos;
        // Extend the seed backward-search-style, but we scan the read
        // left to right and feed symbols in reverse seed order, the same
        // way `fm_index::backward_search` consumes a whole seed at once.
        let mut extended = Vec::new();
        while end < key.len() && end - pos < max_seed_length {
            extended.push(key[end]);
            let mut c = SearchCursor::full(archive);
            for &base in extended.iter().rev() {
                c = c.extend(archive, base);
                if c.is_empty() {
                    break;
                }
            }
            cursor = c;
            end += 1;
            if cursor.is_empty() || cursor.size() <= threshold {
                break;
            }
        }
        seeds.push(Seed {
            read_start: pos,
            read_end: end,
            lo: cursor.lo,
            hi: cursor.hi,
            errors_allowed: 0,
        });
        pos = end;
    }

    classify(seeds, false)
}

/// Fixed, equal-width partitioning: used when adaptive profiling failed to
/// produce enough seeds for the required stratum, or when the region count
/// blew the configured budget.
pub fn profile_fixed(archive: &dyn Archive, pattern: &Pattern, num_regions: usize) -> RegionProfile {
    let key = &pattern.key;
    let num_regions = num_regions.max(1).min(key.len().max(1));
    let region_len = (key.len() + num_regions - 1) / num_regions;
    let mut seeds = Vec::new();
    let mut pos = 0usize;
    while pos < key.len() {
        let end = (pos + region_len).min(key.len());
        let seed = &key[pos..end];
        let mut cursor = SearchCursor::full(archive);
        for &base in seed.iter().rev() {
            cursor = cursor.extend(archive, base);
            if cursor.is_empty() {
                break;
            }
        }
        seeds.push(Seed {
            read_start: pos,
            read_end: end,
            lo: cursor.lo,
            hi: cursor.hi,
            errors_allowed: 0,
        });
        pos = end;
    }
    classify(seeds, true)
}

fn classify(seeds: Vec<Seed>, used_fixed_partitioning: bool) -> RegionProfile {
    let non_empty: Vec<&Seed> = seeds.iter().filter(|s| !s.is_empty_interval()).collect();
    let class = if non_empty.is_empty() {
        ProfileClass::NoRegions
    } else if seeds.len() == 1 && !seeds[0].is_empty_interval() {
        ProfileClass::Exact
    } else {
        ProfileClass::Partitioned
    };
    RegionProfile {
        seeds,
        class,
        used_fixed_partitioning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::InMemoryArchive;

    #[test]
    fn exact_match_classifies_as_exact() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
        let pattern = Pattern::new(b"ACGTACGT", &[30; 8], 0, 64).unwrap();
        let profile = profile_adaptive(&archive, &pattern, 64, 0.1, 4);
        assert_eq!(profile.class, ProfileClass::Exact);
        assert_eq!(profile.num_regions(), 1);
    }

    #[test]
    fn all_n_read_has_no_regions() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNN")]);
        let pattern = Pattern::new(b"NNNNNNNN", &[0; 8], 0, 64).unwrap();
        let profile = profile_adaptive(&archive, &pattern, 64, 0.1, 4);
        assert_eq!(profile.class, ProfileClass::NoRegions);
    }

    #[test]
    fn fixed_partitioning_splits_into_requested_region_count() {
        let archive = InMemoryArchive::from_chromosomes(&[("chr1", b"NNACGTACGTNNACGTAGGTNN")]);
        let pattern = Pattern::new(b"ACGTACGTACGT", &[30; 12], 2, 64).unwrap();
        let profile = profile_fixed(&archive, &pattern, 3);
        assert_eq!(profile.num_regions(), 3);
        assert!(profile.used_fixed_partitioning);
    }
}
