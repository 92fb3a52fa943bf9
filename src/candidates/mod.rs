//! Candidate generator.
//!
//! Decodes SA intervals cheap enough to enumerate, projects each hit to a
//! candidate read-start position, and clusters nearby positions into
//! filtering regions. Grounded on the clustering pass a candidate-filtering
//! subsystem runs over raw decoded positions to produce filtering regions.

pub mod filtering_region;

pub use filtering_region::{FilteringPosition, FilteringRegion, RegionStatus};

use crate::archive::{Archive, Strand};
use crate::errors::GemError;
use crate::region_profile::RegionProfile;

/// Decodes every SA entry of regions with `hi - lo <= max_candidates_per_seed`,
/// projecting hits to candidate read-start positions.
pub fn decode_positions(
    archive: &dyn Archive,
    profile: &RegionProfile,
    max_candidates_per_seed: u64,
) -> Result<Vec<FilteringPosition>, GemError> {
    let mut positions = Vec::new();
    for seed in &profile.seeds {
        if seed.is_empty_interval() || seed.interval_size() > max_candidates_per_seed {
            continue;
        }
        for i in seed.lo..seed.hi {
            let sa_value = archive.sa(i)?;
            let text_position = sa_value.saturating_sub(seed.read_start as u64);
            positions.push(FilteringPosition {
                text_position,
                seed_read_start: seed.read_start,
                seed_errors_allowed: seed.errors_allowed,
            });
        }
    }
    Ok(positions)
}

/// Clusters positions that fall within `pattern_length + max_error` of each
/// other into filtering regions. Tie-broken deterministically by
/// `(position, seed-offset)` ascending.
pub fn cluster_positions(
    archive: &dyn Archive,
    positions: &mut Vec<FilteringPosition>,
    pattern_length: u64,
    max_error: u32,
    strand: Strand,
) -> Result<Vec<FilteringRegion>, GemError> {
    positions.sort_by_key(|p| (p.text_position, p.seed_read_start));
    let span = pattern_length + max_error as u64;

    let mut regions = Vec::new();
    let mut cluster_start: Option<u64> = None;
    let mut cluster_last: u64 = 0;
    let mut cluster_min_errors = u32::MAX;

    let flush = |regions: &mut Vec<FilteringRegion>,
                 cluster_start: u64,
                 cluster_last: u64,
                 cluster_min_errors: u32| {
        regions.push(FilteringRegion {
            begin_position: cluster_start,
            end_position: cluster_last + pattern_length,
            strand,
            status: RegionStatus::Pending,
            errors_committed: cluster_min_errors,
        });
    };

    for p in positions.iter() {
        match cluster_start {
            None => {
                cluster_start = Some(p.text_position);
                cluster_last = p.text_position;
                cluster_min_errors = p.seed_errors_allowed;
            }
            Some(start) => {
                if p.text_position.saturating_sub(cluster_last) <= span {
                    cluster_last = p.text_position;
                    cluster_min_errors = cluster_min_errors.min(p.seed_errors_allowed);
                } else {
                    flush(&mut regions, start, cluster_last, cluster_min_errors);
                    cluster_start = Some(p.text_position);
                    cluster_last = p.text_position;
                    cluster_min_errors = p.seed_errors_allowed;
                }
            }
        }
    }
    if let Some(start) = cluster_start {
        flush(&mut regions, start, cluster_last, cluster_min_errors);
    }

    let n = archive.n();
    for region in regions.iter_mut() {
        region.end_position = region.end_position.min(n);
    }
    Ok(regions)
}

/// Drops any newly generated region whose span is fully covered by a
/// previously verified region.
pub fn dedup_against_verified(
    candidates: Vec<FilteringRegion>,
    verified: &[FilteringRegion],
) -> Vec<FilteringRegion> {
    candidates
        .into_iter()
        .filter(|c| {
            !verified
                .iter()
                .any(|v| v.fully_covers(c.begin_position, c.end_position))
        })
        .collect()
}
